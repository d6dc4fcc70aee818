//! Encapsulates a network interface card.
//!
//! The stack does not capture or inject frames itself. A transport implements [`Link`] to send
//! complete Ethernet frames and to report the identity of the interface, and feeds every
//! received frame into [`Adapter::dispatch`] from its own thread. [`Loopback`] is a software
//! link that records what is sent, for tests and embedding.
//!
//! [`Link`]: trait.Link.html
//! [`Adapter::dispatch`]: struct.Adapter.html#method.dispatch
//! [`Loopback`]: struct.Loopback.html
use core::fmt;
use std::net::Ipv4Addr;

use crate::layer::Result;
use crate::wire::EthernetAddress;

mod adapter;
mod loopback;
mod network;

pub use self::adapter::Adapter;
pub use self::loopback::Loopback;
pub use self::network::Network;

/// The addresses a link presents on the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Our own hardware address.
    pub mac: EthernetAddress,
    /// Our own protocol address.
    pub ip: Ipv4Addr,
    /// The VLAN id, outgoing frames are tagged only when it is greater than one.
    pub vlan: u16,
}

impl Identity {
    /// Whether outgoing frames need an 802.1Q tag.
    pub fn is_tagged(&self) -> bool {
        self.vlan > 1
    }
}

/// A transport able to put complete Ethernet frames on the wire.
///
/// Implementations must not deliver frames back into [`Adapter::dispatch`] from within
/// `send_frame`, the layers call it while holding their own locks.
///
/// [`Adapter::dispatch`]: struct.Adapter.html#method.dispatch
pub trait Link: Send + Sync {
    /// Transmit one frame, including the Ethernet header.
    fn send_frame(&self, frame: &[u8]) -> Result<()>;

    /// The addresses of this interface.
    fn identity(&self) -> Identity;

    /// Record a diagnostic message of the protocol layers.
    fn trace(&self, message: fmt::Arguments) {
        net_debug!("{}", message);
    }
}
