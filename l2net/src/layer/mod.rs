//! The protocol layers above the wire codecs.
//!
//! Each layer is a small piece of shared state plus the two entry points that drive it: the
//! operations called from the caller thread (resolve an address, open a connection, write
//! bytes) and the `process_inbound` handler called from the dispatch thread of the link. The
//! handlers never block; waiting only ever happens on the caller side, on a condition variable
//! paired with the state the handler modifies.
//!
//! * [`arp`]: the address cache and resolver of one adapter.
//! * [`eth`]: building outgoing frames and classifying incoming ones.
//! * [`tcp`]: client connections and the endpoint that owns their ports.
//! * [`telnet`]: a decoder for the Telnet command stream over any byte stream.
//!
//! [`arp`]: arp/index.html
//! [`eth`]: eth/index.html
//! [`tcp`]: tcp/index.html
//! [`telnet`]: telnet/index.html
use core::fmt;
use std::net::Ipv4Addr;

use crate::wire;

pub mod arp;
pub mod eth;
pub mod tcp;
pub mod telnet;

/// The error type for the network layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The hardware address of the remote host could not be resolved in time.
    Unresolved(Ipv4Addr),

    /// The link refused to transmit a frame.
    Transmit,

    /// All ephemeral ports of the adapter are taken.
    Exhausted,

    /// A packet could not be parsed.
    Wire(wire::Error),

    /// A required configuration key was absent.
    MissingKey(&'static str),

    /// A configuration value could not be interpreted, names the key.
    InvalidValue(&'static str),

    /// No adapter with this name is registered with the network.
    UnknownAdapter(String),

    /// No session constructor is registered for this scheme.
    UnknownScheme(String),
}

/// The result type for the network layers.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Unresolved(ip) => write!(f, "unable to resolve MAC address of {}", ip),
            Error::Transmit => write!(f, "link failed to transmit frame"),
            Error::Exhausted => write!(f, "no free local port"),
            Error::Wire(err) => write!(f, "wire error: {}", err),
            Error::MissingKey(key) => write!(f, "missing configuration key `{}`", key),
            Error::InvalidValue(key) => write!(f, "invalid value for configuration key `{}`", key),
            Error::UnknownAdapter(name) => write!(f, "unknown adapter `{}`", name),
            Error::UnknownScheme(name) => write!(f, "unknown session scheme `{}`", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Wire(err) => Some(err),
            _ => None,
        }
    }
}

impl From<wire::Error> for Error {
    fn from(err: wire::Error) -> Self {
        Error::Wire(err)
    }
}
