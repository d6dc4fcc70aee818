//! A virtual layer-2 network endpoint.
//!
//! The crate speaks raw Ethernet, ARP, IPv4 and TCP over a captured link without involving the
//! TCP/IP stack of the host operating system. An application opens a TCP or Telnet session to a
//! remote IPv4 address and port, the peer's hardware address is resolved with our own ARP
//! resolver, bytes are pushed over a small client-side TCP state machine, and Telnet option
//! negotiation is layered on top of that byte stream.
//!
//! ## Table of contents
//!
//! 1. [The wire module](wire/index.html), header codecs
//! 2. [The layers](layer/index.html)
//!    1. [Address resolution](layer/arp/index.html)
//!    1. [Tcp connections](layer/tcp/index.html)
//!    1. [Telnet decoding](layer/telnet/index.html)
//! 3. [Network interfaces](nic/index.html), the link collaborator and adapters
//! 4. [Sessions](session/index.html), the caller facing surface
//! 5. [Configuration](config/index.html)
//!
//! ## Design and relevant core concepts
//!
//! There are two threads of control. The caller opens, reads, writes and closes connections and
//! blocks where the protocol demands it. The transport owns a dispatch thread which hands every
//! captured frame to [`Adapter::dispatch`]; that path never blocks and never sends a frame back
//! synchronously through the link. The crate itself does not spawn any threads.
//!
//! Frames leave through the [`Link`] trait. It is the only thing a transport has to implement,
//! and the [`Loopback`] link records every frame which makes it possible to test the whole stack
//! by playing the remote peer from the test thread.
//!
//! [`Adapter::dispatch`]: nic/struct.Adapter.html#method.dispatch
//! [`Link`]: nic/trait.Link.html
//! [`Loopback`]: nic/struct.Loopback.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;

pub mod config;
pub mod io;
pub mod layer;
pub mod nic;
pub mod session;
pub mod wire;
