use core::{fmt, ops};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::layer::{arp::Resolver, eth, Error, Result};
use crate::nic::{Adapter, Link};
use crate::wire::{EthernetAddress, IpProtocol, Ipv4Repr, TcpFlags, TcpRepr, TcpSeqNumber};
use super::endpoint::{Endpoint, FourTuple};
use super::State;

/// Behaviour that differs between plain TCP and Telnet connections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Profile {
    /// How long each handshake attempt waits for the answer of the peer.
    pub open_attempt_timeout: Duration,
    /// Whether `open` broadcasts our own binding before resolving the peer.
    pub announce_on_open: bool,
}

impl Profile {
    /// Plain TCP connections.
    pub const TCP: Profile = Profile {
        open_attempt_timeout: Duration::from_millis(1000),
        announce_on_open: false,
    };

    /// Connections carrying a Telnet session.
    pub const TELNET: Profile = Profile {
        open_attempt_timeout: Duration::from_millis(5000),
        announce_on_open: true,
    };
}

/// Settings of a connection, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    /// Timeouts and behaviour of `open`.
    pub profile: Profile,
    /// A statically configured hardware address of the peer.
    ///
    /// It is entered into the address cache so that resolving the peer succeeds without a probe.
    pub remote_mac: Option<EthernetAddress>,
    /// Send a gratuitous ARP when reads find no data for a while.
    pub idle_probe: bool,
    /// How long a write waits for its acknowledgement.
    pub write_timeout: Duration,
}

impl Options {
    /// Default options for a profile.
    pub fn new(profile: Profile) -> Self {
        Options {
            profile,
            remote_mac: None,
            idle_probe: true,
            write_timeout: Connection::DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new(Profile::TCP)
    }
}

/// A client TCP connection over one adapter.
///
/// The connection is driven from two sides. The caller opens, writes, reads and closes it and
/// blocks where the protocol requires waiting for the peer. The dispatch thread of the link
/// feeds received segments into [`process_inbound`], which never waits on the caller.
///
/// The protocol control block, the receive queue and the acknowledgement flag are guarded
/// separately. Whenever two of them are held the control block was locked first.
///
/// [`process_inbound`]: #method.process_inbound
pub struct Connection {
    link: Arc<dyn Link>,
    resolver: Arc<Resolver>,
    endpoint: Arc<Endpoint>,
    tuple: FourTuple,
    options: Options,
    write_timeout: Mutex<Duration>,
    control: Mutex<Control>,
    /// Signalled on every state change.
    changed: Condvar,
    input: Mutex<Input>,
    acked: Mutex<bool>,
    /// Signalled when the outstanding write was acknowledged.
    ack_signal: Condvar,
}

struct Control {
    state: State,
    remote_mac: EthernetAddress,
    ip_ident: u16,
    /// The send sequence.
    seq: TcpSeqNumber,
    /// The acknowledgement that covers everything sent so far.
    next_ack: TcpSeqNumber,
    /// The last acknowledgement we sent, also the next sequence expected from the peer.
    last_ack: TcpSeqNumber,
    remote_window: u16,
}

struct Input {
    queue: VecDeque<u8>,
    last_available: Instant,
}

/// What `process_inbound` leaves to do after releasing the control block.
struct Followup {
    time_wait: bool,
    entered: Option<State>,
}

impl Connection {
    /// Overall time `open` keeps retrying the handshake.
    pub const CONNECTION_TIMEOUT: Duration = Duration::from_millis(20_000);
    /// How long `close` waits for the connection to be closed.
    pub const DISCONNECT_TIMEOUT: Duration = Duration::from_millis(2000);
    /// Period after which a read without data sends a gratuitous ARP.
    pub const IDLE_PROBE_PERIOD: Duration = Duration::from_millis(500);
    /// Interval between retransmissions of an unacknowledged write.
    pub const WRITE_RETRY_INTERVAL: Duration = Duration::from_millis(500);
    /// Linger in `TimeWait` before the connection is closed.
    pub const TIME_WAIT: Duration = Duration::from_millis(500);
    /// Default for `Options::write_timeout`.
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
    /// Time to live of outgoing datagrams.
    pub const TTL: u8 = 128;
    /// Maximum segment size announced in the SYN.
    pub const MAX_SEGMENT_SIZE: u16 = 1460;
    /// Window scale announced in the SYN.
    pub const WINDOW_SCALE: u8 = 8;
    /// Our receive window, never changes.
    pub const LOCAL_WINDOW: u16 = 65535;
    /// The identification of the first outgoing datagram.
    pub const INITIAL_IP_IDENT: u16 = 30000;

    /// Create a closed connection to `remote:remote_port` and register it with the adapter.
    ///
    /// A local port is allocated immediately and stays reserved until the last handle to the
    /// connection is dropped.
    pub fn new(adapter: &Adapter, remote: Ipv4Addr, remote_port: u16, options: Options)
        -> Result<Arc<Self>>
    {
        let link = Arc::clone(adapter.link());
        let resolver = Arc::clone(adapter.resolver());
        let endpoint = Arc::clone(adapter.endpoint());
        let local = link.identity().ip;

        let connection = adapter.endpoint().register(|local_port| {
            Arc::new(Connection {
                link,
                resolver,
                endpoint,
                tuple: FourTuple { local, remote, local_port, remote_port },
                options,
                write_timeout: Mutex::new(options.write_timeout),
                control: Mutex::new(Control {
                    state: State::Closed,
                    remote_mac: options.remote_mac.unwrap_or(EthernetAddress::UNSPECIFIED),
                    ip_ident: Self::INITIAL_IP_IDENT,
                    seq: TcpSeqNumber(0),
                    next_ack: TcpSeqNumber(0),
                    last_ack: TcpSeqNumber(0),
                    remote_window: 0,
                }),
                changed: Condvar::new(),
                input: Mutex::new(Input {
                    queue: VecDeque::new(),
                    last_available: Instant::now(),
                }),
                acked: Mutex::new(true),
                ack_signal: Condvar::new(),
            })
        })?;

        if let Some(mac) = options.remote_mac {
            connection.resolver.add(remote, mac);
        }

        Ok(connection)
    }

    /// `"<remote ip>:<remote port>"`.
    pub fn name(&self) -> String {
        format!("{}:{}", self.tuple.remote, self.tuple.remote_port)
    }

    /// The local port allocated to the connection.
    pub fn local_port(&self) -> u16 {
        self.tuple.local_port
    }

    /// The addresses and ports of the connection.
    pub fn four_tuple(&self) -> FourTuple {
        self.tuple
    }

    /// A hash of the four tuple that is stable across runs.
    pub fn hash_code(&self) -> u32 {
        self.tuple.hash_code()
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.control.lock().state
    }

    /// Whether the connection is established.
    pub fn is_open(&self) -> bool {
        self.state() == State::Established
    }

    /// The options the connection was created with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Change how long writes wait for their acknowledgement.
    pub fn set_write_timeout(&self, timeout: Duration) {
        *self.write_timeout.lock() = timeout;
    }

    /// Open the connection with an active handshake.
    ///
    /// Fails only when the hardware address of the peer can not be resolved. A peer that does
    /// not answer the handshake leaves the connection closed, check `is_open` afterwards.
    pub fn open(&self) -> Result<()> {
        let remote = self.tuple.remote;

        if self.options.profile.announce_on_open {
            if let Err(err) = self.resolver.send_gratuitous() {
                net_debug!("announcement before opening {} not sent: {}", self.name(), err);
            }
        }

        let mac = self.resolver.resolve(remote).ok_or(Error::Unresolved(remote))?;
        self.control.lock().remote_mac = mac;

        let start = Instant::now();
        while !self.is_open() && start.elapsed() < Self::CONNECTION_TIMEOUT {
            self.open_attempt();
        }

        Ok(())
    }

    fn open_attempt(&self) {
        let (remote, port) = (self.tuple.remote, self.tuple.remote_port);
        self.trace(format_args!("TCP OPEN: {} {}", remote, port));

        let established = {
            let mut control = self.control.lock();
            self.input.lock().queue.clear();
            control.state = State::SynSent;
            self.send_control(&mut control, TcpSeqNumber(0), TcpFlags::SYN, true);
            self.changed.wait_while_for(
                &mut control,
                |control| control.state == State::SynSent,
                self.options.profile.open_attempt_timeout);
            control.state == State::Established
        };

        if established {
            self.trace(format_args!("TCP OPEN: {} {} - SUCCESSFUL", remote, port));
        } else {
            self.trace(format_args!("TCP OPEN: {} {} - FAILED", remote, port));
        }
    }

    /// Close an established connection gracefully.
    ///
    /// Waits a bounded time for the peer to complete the teardown. The outcome is only traced.
    pub fn close(&self) {
        if !self.is_open() {
            return;
        }

        let (remote, port) = (self.tuple.remote, self.tuple.remote_port);
        self.trace(format_args!("TCP CLOSE: {} {}", remote, port));

        let closed = {
            let mut control = self.control.lock();
            if control.state != State::Established {
                return;
            }
            let last_ack = control.last_ack;
            self.send_control(&mut control, last_ack, TcpFlags::FIN | TcpFlags::ACK, false);
            control.state = State::FinWait1;
            self.changed.wait_while_for(
                &mut control,
                |control| control.state != State::Closed,
                Self::DISCONNECT_TIMEOUT);
            control.state == State::Closed
        };

        if closed {
            self.trace(format_args!("TCP CLOSE: {} {} - SUCCESSFUL", remote, port));
        } else {
            self.trace(format_args!("TCP CLOSE: {} {} - FAILED", remote, port));
        }
    }

    /// Take one received byte, without blocking.
    ///
    /// When nothing was received for a while on an open connection an idle probe, a gratuitous
    /// ARP, is sent so that the peer and switches keep our binding.
    pub fn read_byte(&self) -> Option<u8> {
        let open = self.is_open();
        let mut input = self.input.lock();

        if let Some(byte) = input.queue.pop_front() {
            input.last_available = Instant::now();
            return Some(byte);
        }

        if self.options.idle_probe && open
            && input.last_available.elapsed() >= Self::IDLE_PROBE_PERIOD
        {
            input.last_available = Instant::now();
            drop(input);
            if let Err(err) = self.resolver.send_gratuitous() {
                net_debug!("idle probe of {} not sent: {}", self.name(), err);
            }
        }

        None
    }

    /// Send data and wait for its acknowledgement.
    ///
    /// Ignored when the connection is not open. The data is retransmitted until the peer
    /// acknowledges it or the write timeout elapses, which is logged but not reported.
    pub fn write(&self, data: &[u8]) {
        if !self.is_open() {
            return;
        }

        *self.acked.lock() = false;
        let timeout = *self.write_timeout.lock();
        let start = Instant::now();
        let deadline = start + timeout;

        self.send_data(data);
        let mut last_send = Instant::now();

        let mut acked = self.acked.lock();
        while !*acked {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let retry_at = last_send + Self::WRITE_RETRY_INTERVAL;
            self.ack_signal.wait_until(&mut acked, retry_at.min(deadline));

            let now = Instant::now();
            if !*acked && now >= retry_at && now < deadline {
                last_send = now;
                MutexGuard::unlocked(&mut acked, || self.send_data(data));
            }
        }

        if *acked {
            return;
        }
        drop(acked);

        if self.state() == State::Closed {
            net_warn!("{}: connection closed by remote host", self.name());
        } else {
            net_warn!("{}: no ack from remote host", self.name());
        }
    }

    /// Handle a received segment, from the dispatch thread.
    ///
    /// Segments not belonging to this connection are ignored.
    pub fn process_inbound(&self, segment: &eth::Segment) {
        if FourTuple::of_inbound(segment) != self.tuple {
            return;
        }

        let followup = {
            let mut control = self.control.lock();
            self.transition(&mut control, &segment.tcp, segment.payload)
        };

        let mut entered = followup.entered;
        if followup.time_wait {
            thread::sleep(Self::TIME_WAIT);
            let mut control = self.control.lock();
            if control.state == State::TimeWait {
                control.state = State::Closed;
                self.changed.notify_all();
                entered = Some(State::Closed);
            }
        }

        if let Some(state) = entered {
            self.endpoint.state_changed(self.tuple, state);
        }
    }

    fn transition(&self, control: &mut Control, tcp: &TcpRepr, payload: &[u8]) -> Followup {
        let flags = tcp.flags;
        let before = control.state;
        control.remote_window = tcp.window_len;

        if control.state == State::Closed {
            self.send_control(control, tcp.seq_number + 1, TcpFlags::RST | TcpFlags::ACK, false);
        } else if control.state == State::SynSent && flags.syn() && flags.ack() {
            self.send_control(control, tcp.seq_number + 1, TcpFlags::ACK, false);
            control.state = State::Established;
        } else if flags.fin() {
            match control.state {
                State::Established => control.state = State::CloseWait,
                State::FinWait1 if flags.ack() => control.state = State::TimeWait,
                State::FinWait1 => control.state = State::Closing,
                State::FinWait2 => control.state = State::TimeWait,
                _ => (),
            }
            self.send_control(control, tcp.seq_number + 1, TcpFlags::ACK, false);
        } else if control.state == State::FinWait1 && flags.ack() {
            control.state = State::FinWait2;
        } else if control.state == State::Closing && flags.ack() {
            control.state = State::TimeWait;
        } else if control.state == State::LastAck && flags.ack() {
            control.state = State::Closed;
        } else if control.state == State::Established && flags.rst() {
            control.state = State::Closed;
        } else if flags.psh() || (flags.ack() && !payload.is_empty()) {
            self.acknowledge(control, tcp);

            if tcp.seq_number == control.last_ack {
                // Lock order: control before input.
                self.input.lock().queue.extend(payload.iter().copied());
                let next = tcp.seq_number + payload.len();
                self.send_control(control, next, TcpFlags::ACK, false);
            } else {
                // Out of order, tell the peer what we expect next.
                let last_ack = control.last_ack;
                self.send_control(control, last_ack, TcpFlags::ACK, false);
            }
        } else if flags.ack() && control.state == State::Established {
            self.acknowledge(control, tcp);
        }

        if control.state == State::CloseWait {
            let last_ack = control.last_ack;
            self.send_control(control, last_ack, TcpFlags::FIN | TcpFlags::ACK, false);
            control.state = State::LastAck;
        }

        if control.state != before {
            self.changed.notify_all();
        }

        Followup {
            time_wait: control.state == State::TimeWait,
            entered: match control.state {
                State::Established | State::Closed if control.state != before => Some(control.state),
                _ => None,
            },
        }
    }

    /// Keep-alive answers and acknowledgement of our outstanding data.
    fn acknowledge(&self, control: &mut Control, tcp: &TcpRepr) {
        if !tcp.flags.ack() {
            return;
        }

        if tcp.seq_number == control.last_ack - 1 {
            // Keep-alive probe, repeat our acknowledgement.
            let last_ack = control.last_ack;
            self.send_control(control, last_ack, TcpFlags::ACK, false);
        } else if tcp.ack_number >= control.next_ack {
            control.seq = control.next_ack;
            // Lock order: control before acked.
            *self.acked.lock() = true;
            self.ack_signal.notify_all();
        }
    }

    /// Send a segment without data.
    ///
    /// Anything but a bare ACK consumes one sequence number.
    fn send_control(&self, control: &mut Control, ack: TcpSeqNumber, flags: TcpFlags, handshake_options: bool) {
        control.last_ack = ack;
        let tcp = TcpRepr {
            src_port: self.tuple.local_port,
            dst_port: self.tuple.remote_port,
            seq_number: control.seq,
            ack_number: control.last_ack,
            flags,
            window_len: Self::LOCAL_WINDOW,
            max_seg_size: if handshake_options { Some(Self::MAX_SEGMENT_SIZE) } else { None },
            window_scale: if handshake_options { Some(Self::WINDOW_SCALE) } else { None },
        };
        self.transmit(control, &tcp, &[]);

        if !flags.is_bare_ack() {
            control.seq += 1;
            control.next_ack = control.seq;
        }
    }

    /// Send data segments, cut to the window of the peer and to datagram size.
    ///
    /// The send sequence only advances once the peer acknowledges the data.
    fn send_data(&self, data: &[u8]) {
        let mut control = self.control.lock();
        let base = control.seq;
        let window = usize::from(control.remote_window);

        for chunk in segments(data.len(), window) {
            for range in datagrams(chunk) {
                control.next_ack = base + range.end;
                let tcp = TcpRepr {
                    src_port: self.tuple.local_port,
                    dst_port: self.tuple.remote_port,
                    seq_number: base + range.start,
                    ack_number: control.last_ack,
                    flags: TcpFlags::PSH | TcpFlags::ACK,
                    window_len: Self::LOCAL_WINDOW,
                    max_seg_size: None,
                    window_scale: None,
                };
                self.transmit(&mut control, &tcp, &data[range]);
            }
        }
    }

    fn transmit(&self, control: &mut Control, tcp: &TcpRepr, payload: &[u8]) {
        let identity = self.link.identity();
        let ip = Ipv4Repr {
            src_addr: identity.ip,
            dst_addr: self.tuple.remote,
            protocol: IpProtocol::Tcp,
            ident: control.ip_ident,
            ttl: Self::TTL,
            dont_fragment: true,
            payload_len: 0,
        };
        control.ip_ident = control.ip_ident.wrapping_add(1);

        let frame = eth::tcp_frame(&identity, control.remote_mac, ip, tcp, payload);
        if let Err(err) = self.link.send_frame(&frame) {
            net_debug!("{}: segment not sent: {}", self.tuple, err);
        }
    }

    fn trace(&self, message: fmt::Arguments) {
        self.link.trace(message)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.endpoint.remove(&self.tuple);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Connection")
            .field("tuple", &self.tuple)
            .field("state", &self.state())
            .finish()
    }
}

/// The largest payload of a segment without options that fits one IPv4 datagram.
pub(crate) const MAX_DATAGRAM_PAYLOAD: usize =
    u16::MAX as usize - Ipv4Repr::HEADER_LEN - TcpRepr::HEADER_LEN;

/// Split a chunk further so that every piece fits a datagram. An empty chunk stays whole.
pub(crate) fn datagrams(chunk: ops::Range<usize>) -> Vec<ops::Range<usize>> {
    let mut pieces = Vec::new();
    let mut start = chunk.start;
    loop {
        let end = chunk.end.min(start + MAX_DATAGRAM_PAYLOAD);
        pieces.push(start..end);
        if end >= chunk.end {
            return pieces;
        }
        start = end;
    }
}

/// Cut a payload of `len` bytes into chunks for a peer window of `window` bytes.
///
/// Payloads that fit are sent whole. Otherwise the remaining count after each chunk is
/// `len - offset - 1`, so the final byte of a chunked payload is never covered.
pub(crate) fn segments(len: usize, window: usize) -> Vec<ops::Range<usize>> {
    if len <= window {
        return vec![0..len];
    }

    let mut chunks = Vec::new();
    let mut offset = 0;
    let mut remaining = len;
    while remaining > 0 {
        let size = if remaining > window && window > 0 { window } else { remaining };
        chunks.push(offset..offset + size);
        offset += size;
        remaining = (len - offset).saturating_sub(1);
    }
    chunks
}
