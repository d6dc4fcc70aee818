use core::fmt;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::layer::{eth::Segment, Error, Result};
use super::connection::Connection;
use super::siphash::TupleHasher;
use super::State;

/// The addresses and ports identifying a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FourTuple {
    /// Our own address.
    pub local: Ipv4Addr,
    /// The remote address.
    pub remote: Ipv4Addr,
    /// Our own port.
    pub local_port: u16,
    /// The remote port.
    pub remote_port: u16,
}

impl FourTuple {
    /// The tuple a received segment belongs to, seen from our side.
    pub fn of_inbound(segment: &Segment) -> Self {
        FourTuple {
            local: segment.ip.dst_addr,
            remote: segment.ip.src_addr,
            local_port: segment.tcp.dst_port,
            remote_port: segment.tcp.src_port,
        }
    }

    /// A hash of the tuple that is stable across runs.
    pub fn hash_code(&self) -> u32 {
        TupleHasher::fixed().hash(self) as u32
    }
}

impl fmt::Display for FourTuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{} -> {}:{}", self.local, self.local_port, self.remote, self.remote_port)
    }
}

/// A connection entered `Established` or `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateChange {
    /// The connection that changed.
    pub tuple: FourTuple,
    /// The state it entered.
    pub state: State,
}

type Observer = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// The connections of one adapter.
///
/// Allocates ephemeral ports, routes received segments to their connection and informs
/// observers when connections open and close. Entries are weak, a connection is removed when
/// its last handle is dropped.
pub struct Endpoint {
    table: Mutex<Table>,
    observers: Mutex<Vec<Observer>>,
}

struct Table {
    connections: HashMap<FourTuple, Weak<Connection>>,
    next_port: u16,
}

impl Endpoint {
    /// The range of local ports handed out to connections.
    pub const EPHEMERAL_PORTS: RangeInclusive<u16> = 49152..=65535;

    /// An endpoint without connections.
    pub fn new() -> Self {
        Endpoint {
            table: Mutex::new(Table {
                connections: HashMap::new(),
                next_port: *Self::EPHEMERAL_PORTS.start(),
            }),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Allocate a free local port and register the connection built for it.
    ///
    /// `build` is called with the chosen port while the table is locked, so no other
    /// connection can claim the same port.
    pub(crate) fn register<F>(&self, build: F) -> Result<Arc<Connection>>
        where F: FnOnce(u16) -> Arc<Connection>
    {
        let mut table = self.table.lock();
        let port = table.allocate_port().ok_or(Error::Exhausted)?;
        let connection = build(port);
        table.connections.insert(connection.four_tuple(), Arc::downgrade(&connection));
        Ok(connection)
    }

    /// Forget a dropped connection.
    ///
    /// The port may already have been handed to a new connection, its entry is kept.
    pub(crate) fn remove(&self, tuple: &FourTuple) {
        let mut table = self.table.lock();
        let dead = table.connections
            .get(tuple)
            .map_or(false, |connection| connection.strong_count() == 0);
        if dead {
            table.connections.remove(tuple);
        }
    }

    /// Find the connection of a tuple, if it is still alive.
    pub fn connection(&self, tuple: &FourTuple) -> Option<Arc<Connection>> {
        self.table.lock()
            .connections
            .get(tuple)
            .and_then(Weak::upgrade)
    }

    /// All live connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.table.lock()
            .connections
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// The number of connections currently established.
    pub fn established(&self) -> usize {
        // Collected first, querying the state takes the lock of each connection.
        self.connections()
            .iter()
            .filter(|connection| connection.is_open())
            .count()
    }

    /// Register a callback for connections entering `Established` or `Closed`.
    ///
    /// Called on the thread that caused the change, with no connection locked.
    pub fn on_state_change<F>(&self, observer: F)
        where F: Fn(&StateChange) + Send + Sync + 'static
    {
        self.observers.lock().push(Arc::new(observer));
    }

    /// Hand a received segment to its connection.
    ///
    /// Segments for unknown tuples are dropped.
    pub fn dispatch(&self, segment: &Segment) {
        let tuple = FourTuple::of_inbound(segment);
        match self.connection(&tuple) {
            Some(connection) => connection.process_inbound(segment),
            None => net_trace!("no connection for {}, dropping segment", tuple),
        }
    }

    pub(crate) fn state_changed(&self, tuple: FourTuple, state: State) {
        let observers = self.observers.lock().clone();
        let change = StateChange { tuple, state };
        for observer in observers.iter() {
            observer(&change);
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new()
    }
}

impl Table {
    fn allocate_port(&mut self) -> Option<u16> {
        let (first, last) = Endpoint::EPHEMERAL_PORTS.into_inner();
        let count = usize::from(last - first) + 1;
        for _ in 0..count {
            let port = self.next_port;
            self.next_port = if port == last { first } else { port + 1 };
            if !self.in_use(port) {
                return Some(port);
            }
        }
        None
    }

    fn in_use(&self, port: u16) -> bool {
        self.connections
            .iter()
            .any(|(tuple, connection)| tuple.local_port == port && connection.strong_count() > 0)
    }
}
