/*! Low-level packet access and construction.

# Packet representations

Every protocol module provides a compact, high-level representation of its header (`Repr`) which
can be created by parsing a sequence of octets and emitted back into one. Field offsets are kept
in a private `field` module per protocol, all multi-octet fields are read and written in network
byte order through `byteorder`.

The module is intentionally narrow. It understands exactly the headers a layer-2 client endpoint
needs to talk TCP to a neighbour:

 * Ethernet II, optionally with a single 802.1Q VLAN tag,
 * ARP for Ethernet/IPv4,
 * IPv4 without options,
 * TCP with the maximum segment size and window scale options.

Parsing validates lengths and checksums so that the layers above never see a structurally broken
header. Emitting assumes the buffer was sized with the `buffer_len`/`header_len` methods of the
same representation and panics otherwise, which is a programming error rather than bad input.
*/

// Header fields are self-explanatory, see the respective RFCs.
#![allow(missing_docs)]

mod error;

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod tcp;

pub use self::error::{Error, Result};

pub use self::ethernet::{
    Address as EthernetAddress,
    EtherType as EthernetProtocol,
    Repr as EthernetRepr,
    VlanTag};

pub use self::arp::{
    Operation as ArpOperation,
    Repr as ArpRepr};

pub use self::ipv4::{
    Protocol as IpProtocol,
    Repr as Ipv4Repr};

pub use self::tcp::{
    Flags as TcpFlags,
    Repr as TcpRepr,
    SeqNumber as TcpSeqNumber};

/// IPv4 addresses are represented by the standard library type.
pub use std::net::Ipv4Addr as Ipv4Address;

pub(crate) mod field {
    pub type Field = core::ops::Range<usize>;
}
