//! The TCP layer abstraction.
//!
//! Offers client connections on top of the link of an adapter. There is no IP layer in between:
//! each connection builds its complete frames itself, addressed to the hardware address it
//! resolved for its peer.
//!
//! There are a number of simplifying assumptions, all of them fine for talking to a single
//! device on the local segment:
//! * Only active opens. There are no listening sockets, `Listen` and `SynReceived` are never
//!   entered.
//! * Stop and wait. A write sends its data, cut to the window of the peer, and blocks until it
//!   is acknowledged or a timeout elapses. Unacknowledged data is retransmitted at a fixed
//!   interval, there is no congestion control.
//! * No reassembly. Only segments at the expected sequence number are accepted, anything else is
//!   answered with a duplicate acknowledgement so that the peer retransmits.
//!
//! ## Structure
//!
//! The [`Endpoint`] of an adapter stores its connections by [`FourTuple`], allocates their
//! ephemeral ports and routes received segments to them. Observers registered with it learn
//! about connections being established and closed.
//!
//! A [`Connection`] holds the protocol state of one connection. Its [`Profile`] selects between
//! the timing of plain TCP and that of Telnet sessions.
//!
//! [`Endpoint`]: struct.Endpoint.html
//! [`FourTuple`]: struct.FourTuple.html
//! [`Connection`]: struct.Connection.html
//! [`Profile`]: struct.Profile.html
mod connection;
mod endpoint;
mod siphash;
mod state;

pub use connection::{Connection, Options, Profile};
pub use endpoint::{Endpoint, FourTuple, StateChange};
pub use state::State;
