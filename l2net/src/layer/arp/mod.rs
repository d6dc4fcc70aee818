//! Receiving and sending ARP messages.
//!
//! Restricted to Ethernet/IPv4. The [`Resolver`] keeps the address cache of one adapter, answers
//! requests for our own address and resolves the hardware address of a peer on demand.
//!
//! [`Resolver`]: struct.Resolver.html
mod resolver;

pub use resolver::Resolver;
