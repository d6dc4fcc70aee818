//! The caller facing session surface.
//!
//! A [`Session`] is what an application holds: a connection it can open, read, write and close,
//! plus the transcript of what it read. Two kinds exist, selected by the scheme of a connection
//! string:
//!
//! * `L2Tcp`, a [`TcpSession`] that reads the raw byte stream.
//! * `L2Telnet`, a [`TelnetSession`] that decodes Telnet commands.
//!
//! [`Schemes`] maps scheme names to constructors. Parsing connection strings is left to the
//! caller, constructors take the [`Network`] to find the adapter in and a parsed [`Config`].
//!
//! [`Session`]: trait.Session.html
//! [`TcpSession`]: struct.TcpSession.html
//! [`TelnetSession`]: ../layer/telnet/struct.TelnetSession.html
//! [`Schemes`]: struct.Schemes.html
//! [`Network`]: ../nic/struct.Network.html
//! [`Config`]: ../config/struct.Config.html
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, Settings};
use crate::io::{self, Transcript};
use crate::layer::{tcp, telnet::TelnetSession, Error, Result};
use crate::nic::{Adapter, Network};

/// An open-able connection to a remote service.
pub trait Session: Send + Sync {
    /// `"<remote ip>:<remote port>"`.
    fn name(&self) -> String;

    /// Connect, fails only when the peer can not be resolved.
    fn open(&self) -> Result<()>;

    /// Disconnect gracefully.
    fn close(&self);

    /// Whether the session is connected.
    fn is_open(&self) -> bool;

    /// Take one raw received byte, without blocking.
    fn read_byte(&self) -> Option<u8>;

    /// Send data and wait for it to be acknowledged.
    fn write(&self, data: &[u8]);

    /// Read until no data is available or the text read ends with `marker`.
    fn read_until(&self, marker: &str) -> String;

    /// Writes are acknowledged before they return, there is nothing to flush.
    fn flush(&self) {}

    /// Everything read with `read_until`.
    fn transcript(&self) -> &Transcript;
}

/// A session on the raw byte stream of a TCP connection.
pub struct TcpSession {
    connection: Arc<tcp::Connection>,
    transcript: Transcript,
}

impl TcpSession {
    /// Wrap a connection.
    pub fn new(connection: Arc<tcp::Connection>) -> Self {
        TcpSession {
            connection,
            transcript: Transcript::new(),
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<tcp::Connection> {
        &self.connection
    }
}

impl Session for TcpSession {
    fn name(&self) -> String {
        self.connection.name()
    }

    fn open(&self) -> Result<()> {
        self.connection.open()
    }

    fn close(&self) {
        self.connection.close()
    }

    fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    fn read_byte(&self) -> Option<u8> {
        self.connection.read_byte()
    }

    fn write(&self, data: &[u8]) {
        self.connection.write(data)
    }

    fn read_until(&self, marker: &str) -> String {
        let marker = io::string_to_latin1(marker).unwrap_or_default();
        let data = io::read_until(&marker, |output| match self.connection.read_byte() {
            Some(byte) => {
                output.push(byte);
                true
            },
            None => false,
        });

        self.transcript.append(&data);
        io::latin1_to_string(&data)
    }

    fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}

impl Session for TelnetSession<Arc<tcp::Connection>> {
    fn name(&self) -> String {
        self.stream().name()
    }

    fn open(&self) -> Result<()> {
        self.stream().open()
    }

    fn close(&self) {
        self.stream().close()
    }

    fn is_open(&self) -> bool {
        self.stream().is_open()
    }

    fn read_byte(&self) -> Option<u8> {
        self.stream().read_byte()
    }

    fn write(&self, data: &[u8]) {
        self.stream().write(data)
    }

    fn read_until(&self, marker: &str) -> String {
        TelnetSession::read_until(self, marker)
    }

    fn transcript(&self) -> &Transcript {
        TelnetSession::transcript(self)
    }
}

/// Builds a session from the network and its configuration.
pub type Factory = fn(&Network, &Config) -> Result<Box<dyn Session>>;

/// The session constructors, by scheme name.
#[derive(Clone)]
pub struct Schemes {
    factories: HashMap<String, Factory>,
}

impl Schemes {
    /// The scheme of raw TCP sessions.
    pub const TCP: &'static str = "L2Tcp";
    /// The scheme of Telnet sessions.
    pub const TELNET: &'static str = "L2Telnet";

    /// A registry without any schemes.
    pub fn empty() -> Self {
        Schemes {
            factories: HashMap::new(),
        }
    }

    /// The registry of the sessions of this crate.
    pub fn builtin() -> Self {
        let mut schemes = Schemes::empty();
        schemes.register(Self::TCP, tcp_session);
        schemes.register(Self::TELNET, telnet_session);
        schemes
    }

    /// Add a scheme, replacing any previous constructor of the same name.
    pub fn register(&mut self, scheme: &str, factory: Factory) {
        self.factories.insert(scheme.to_string(), factory);
    }

    /// Whether a scheme is known.
    pub fn contains(&self, scheme: &str) -> bool {
        self.factories.contains_key(scheme)
    }

    /// Build a session of the given scheme.
    pub fn build(&self, scheme: &str, network: &Network, config: &Config) -> Result<Box<dyn Session>> {
        let factory = self.factories
            .get(scheme)
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))?;
        factory(network, config)
    }
}

impl Default for Schemes {
    fn default() -> Self {
        Schemes::builtin()
    }
}

/// Announce ourselves and create the connection a session runs on.
fn connect(network: &Network, settings: &Settings, profile: tcp::Profile)
    -> Result<Arc<tcp::Connection>>
{
    let adapter: &Adapter = network.adapter(&settings.adapter)?;

    if let Err(err) = adapter.announce() {
        net_debug!("adapter {} could not announce itself: {}", adapter.name(), err);
    }

    let options = tcp::Options {
        remote_mac: settings.mac,
        idle_probe: settings.send_gratuitous,
        ..tcp::Options::new(profile)
    };

    tcp::Connection::new(adapter, settings.ip, settings.port, options)
}

fn tcp_session(network: &Network, config: &Config) -> Result<Box<dyn Session>> {
    let settings = Settings::from_config(config)?;
    let connection = connect(network, &settings, tcp::Profile::TCP)?;
    Ok(Box::new(TcpSession::new(connection)))
}

fn telnet_session(network: &Network, config: &Config) -> Result<Box<dyn Session>> {
    let settings = Settings::from_config(config)?;
    let connection = connect(network, &settings, tcp::Profile::TELNET)?;
    Ok(Box::new(TelnetSession::new(connection, settings.respond_telnet)))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::layer::eth;
    use crate::nic::{Identity, Loopback};
    use crate::wire::{EthernetAddress, IpProtocol, Ipv4Repr, TcpFlags, TcpRepr, TcpSeqNumber};

    const MAC_ADDR_HOST: EthernetAddress = EthernetAddress([0, 1, 2, 3, 4, 5]);
    const IP_ADDR_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
    const MAC_ADDR_PEER: EthernetAddress = EthernetAddress([6, 5, 4, 3, 2, 1]);
    const IP_ADDR_PEER: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

    fn network() -> (Arc<Loopback>, Network) {
        let link = Arc::new(Loopback::new(Identity {
            mac: MAC_ADDR_HOST,
            ip: IP_ADDR_HOST,
            vlan: 0,
        }));
        let mut network = Network::new();
        network.add("SOCKET_1", link.clone());
        (link, network)
    }

    fn config(extra: &[(&str, &str)]) -> Config {
        let mut config: Config = [("Adapter", "SOCKET_1"), ("IP", "192.168.1.1"), ("Port", "23")]
            .iter()
            .copied()
            .collect();
        for &(key, value) in extra {
            config.set(key, value);
        }
        config
    }

    /// Feed a data segment from the peer into an established session.
    fn peer_data(network: &Network, connection: &tcp::Connection, seq: TcpSeqNumber, data: &[u8]) {
        let identity = Identity { mac: MAC_ADDR_PEER, ip: IP_ADDR_PEER, vlan: 0 };
        let ip = Ipv4Repr {
            src_addr: IP_ADDR_PEER,
            dst_addr: IP_ADDR_HOST,
            protocol: IpProtocol::Tcp,
            ident: 7,
            ttl: 64,
            dont_fragment: true,
            payload_len: 0,
        };
        let tcp = TcpRepr {
            src_port: 23,
            dst_port: connection.local_port(),
            seq_number: seq,
            ack_number: TcpSeqNumber(1),
            flags: TcpFlags::PSH | TcpFlags::ACK,
            window_len: 65535,
            max_seg_size: None,
            window_scale: None,
        };
        let adapter = network.adapter("SOCKET_1").unwrap();
        adapter.dispatch(&eth::tcp_frame(&identity, MAC_ADDR_HOST, ip, &tcp, data));
    }

    /// Complete the handshake of a session, answering its SYN from this thread.
    fn establish(link: &Loopback, network: &Network, session: &Arc<dyn Session>,
                 connection: &tcp::Connection)
    {
        let opener = {
            let session = Arc::clone(session);
            thread::spawn(move || session.open())
        };

        loop {
            let frame = link.wait_sent(Duration::from_secs(3)).expect("no SYN sent");
            if let Ok(eth::Inbound::Tcp(segment)) = eth::classify(&frame) {
                assert!(segment.tcp.flags.syn());
                break;
            }
        }

        let identity = Identity { mac: MAC_ADDR_PEER, ip: IP_ADDR_PEER, vlan: 0 };
        let ip = Ipv4Repr {
            src_addr: IP_ADDR_PEER,
            dst_addr: IP_ADDR_HOST,
            protocol: IpProtocol::Tcp,
            ident: 1,
            ttl: 64,
            dont_fragment: true,
            payload_len: 0,
        };
        let tcp = TcpRepr {
            src_port: 23,
            dst_port: connection.local_port(),
            seq_number: TcpSeqNumber(100),
            ack_number: TcpSeqNumber(1),
            flags: TcpFlags::SYN | TcpFlags::ACK,
            window_len: 65535,
            max_seg_size: None,
            window_scale: None,
        };
        let adapter = network.adapter("SOCKET_1").unwrap();
        adapter.dispatch(&eth::tcp_frame(&identity, MAC_ADDR_HOST, ip, &tcp, &[]));

        assert_eq!(opener.join().unwrap(), Ok(()));
        assert!(session.is_open());
        link.clear_sent();
    }

    #[test]
    fn builtin_schemes() {
        let schemes = Schemes::builtin();
        assert!(schemes.contains("L2Tcp"));
        assert!(schemes.contains("L2Telnet"));
        assert!(!schemes.contains("l2tcp"));
    }

    #[test]
    fn unknown_scheme() {
        let (_, network) = network();
        match Schemes::builtin().build("Serial", &network, &config(&[])) {
            Err(Error::UnknownScheme(name)) => assert_eq!(name, "Serial"),
            _ => panic!("expected an unknown scheme"),
        }
    }

    #[test]
    fn unknown_adapter() {
        let (_, network) = network();
        let config = config(&[("Adapter", "SOCKET_9")]);
        match Schemes::builtin().build("L2Tcp", &network, &config) {
            Err(Error::UnknownAdapter(name)) => assert_eq!(name, "SOCKET_9"),
            _ => panic!("expected an unknown adapter"),
        }
    }

    #[test]
    fn configuration_errors_propagate() {
        let (link, network) = network();
        let config = config(&[("Port", "telnet")]);
        match Schemes::builtin().build("L2Telnet", &network, &config) {
            Err(Error::InvalidValue(key)) => assert_eq!(key, "Port"),
            _ => panic!("expected an invalid port"),
        }
        // Nothing was announced for a session that was never built.
        assert_eq!(link.sent_count(), 0);
    }

    #[test]
    fn construction_announces() {
        let (link, network) = network();
        let session = Schemes::builtin().build("L2Tcp", &network, &config(&[])).unwrap();
        assert_eq!(session.name(), "192.168.1.1:23");
        assert!(!session.is_open());

        let frame = link.pop_sent().unwrap();
        match eth::classify(&frame) {
            Ok(eth::Inbound::Arp(arp)) => assert_eq!(arp.target_protocol_addr, IP_ADDR_HOST),
            _ => panic!("expected a gratuitous ARP"),
        }
        assert!(link.pop_sent().is_none());
    }

    #[test]
    fn static_mac_is_cached() {
        let (_, network) = network();
        let config = config(&[("MAC", "06:05:04:03:02:01")]);
        let _session = Schemes::builtin().build("L2Telnet", &network, &config).unwrap();
        let adapter = network.adapter("SOCKET_1").unwrap();
        assert_eq!(adapter.resolver().lookup(IP_ADDR_PEER), Some(MAC_ADDR_PEER));
    }

    #[test]
    fn tcp_read_until_is_raw() {
        let (link, network) = network();
        let adapter = network.adapter("SOCKET_1").unwrap();
        let connection = tcp::Connection::new(adapter, IP_ADDR_PEER, 23, tcp::Options {
            remote_mac: Some(MAC_ADDR_PEER),
            idle_probe: false,
            ..tcp::Options::default()
        }).unwrap();
        let session: Arc<dyn Session> = Arc::new(TcpSession::new(Arc::clone(&connection)));

        establish(&link, &network, &session, &connection);
        peer_data(&network, &connection, TcpSeqNumber(101), &[b'o', b'k', 0xFF, 0xFB, 3, b'\n', b'x']);

        let read = session.read_until("\n");
        assert_eq!(read, "ok\u{ff}\u{fb}\u{3}\n");
        assert_eq!(session.read_byte(), Some(b'x'));
        assert_eq!(session.transcript().global(), read.chars().map(|ch| ch as u8).collect::<Vec<_>>());
    }

    #[test]
    fn telnet_session_negotiates() {
        let (link, network) = network();
        let config = config(&[("MAC", "06:05:04:03:02:01"), ("SEND_GRATUITUS", "false")]);
        let session = Schemes::builtin().build("L2Telnet", &network, &config).unwrap();
        let session: Arc<dyn Session> = Arc::from(session);
        let adapter = network.adapter("SOCKET_1").unwrap();
        let connection = adapter.endpoint().connections().pop().unwrap();

        establish(&link, &network, &session, &connection);
        peer_data(&network, &connection, TcpSeqNumber(101), &[b'>', 0xFF, 0xFE, 1, b' ']);
        // The acknowledgement of the data.
        let _ = link.pop_sent();

        assert_eq!(session.read_until("> "), "> ");
        // DONT needs no answer.
        assert!(link.pop_sent().is_none());
        session.flush();
    }
}
