//! Building outgoing frames and classifying incoming ones.
//!
//! Outgoing frames carry an 802.1Q tag when the identity of the link has a VLAN id greater than
//! one. Address resolution is sent with best effort priority, TCP with background priority.
use crate::nic::Identity;
use crate::wire::{
    ArpRepr,
    EthernetAddress,
    EthernetProtocol,
    EthernetRepr,
    IpProtocol,
    Ipv4Repr,
    TcpRepr,
    VlanTag,
    Result,
};

/// 802.1Q priority code point for best effort traffic.
pub const PRIORITY_BEST_EFFORT: u8 = 0;

/// 802.1Q priority code point for background traffic.
pub const PRIORITY_BACKGROUND: u8 = 1;

/// A TCP segment received in an IPv4 datagram.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    /// The IPv4 header.
    pub ip: Ipv4Repr,
    /// The TCP header.
    pub tcp: TcpRepr,
    /// The segment data.
    pub payload: &'a [u8],
}

/// What a received frame carries, as far as the layers are concerned.
#[derive(Debug, Clone, Copy)]
pub enum Inbound<'a> {
    /// An Ethernet/IPv4 address resolution packet.
    Arp(ArpRepr),
    /// A TCP segment.
    Tcp(Segment<'a>),
    /// Anything else, no layer is interested.
    Other,
}

fn ethernet(identity: &Identity, dst_addr: EthernetAddress, priority: u8, ethertype: EthernetProtocol)
    -> EthernetRepr
{
    let vlan = if identity.is_tagged() {
        Some(VlanTag { priority, vlan_id: identity.vlan })
    } else {
        None
    };

    EthernetRepr {
        dst_addr,
        src_addr: identity.mac,
        vlan,
        ethertype,
    }
}

/// Build a complete frame carrying an ARP packet.
pub fn arp_frame(identity: &Identity, dst_addr: EthernetAddress, arp: &ArpRepr) -> Vec<u8> {
    let eth = ethernet(identity, dst_addr, PRIORITY_BEST_EFFORT, EthernetProtocol::Arp);
    let header_len = eth.header_len();
    let mut frame = vec![0; header_len + arp.buffer_len()];
    eth.emit(&mut frame);
    arp.emit(&mut frame[header_len..]);
    frame
}

/// Build a complete frame carrying a TCP segment.
///
/// The payload length and protocol of `ip` are overwritten to match the segment.
pub fn tcp_frame(
    identity: &Identity,
    dst_addr: EthernetAddress,
    ip: Ipv4Repr,
    tcp: &TcpRepr,
    payload: &[u8],
) -> Vec<u8> {
    let eth = ethernet(identity, dst_addr, PRIORITY_BACKGROUND, EthernetProtocol::Ipv4);
    let ip = Ipv4Repr {
        protocol: IpProtocol::Tcp,
        payload_len: tcp.header_len() + payload.len(),
        ..ip
    };

    let eth_len = eth.header_len();
    let ip_len = ip.buffer_len();
    let mut frame = vec![0; eth_len + ip_len + ip.payload_len];
    eth.emit(&mut frame);
    ip.emit(&mut frame[eth_len..]);
    tcp.emit(&mut frame[eth_len + ip_len..], ip.src_addr, ip.dst_addr, payload);
    frame
}

/// Determine what a frame carries, looking through one VLAN tag.
pub fn classify(frame: &[u8]) -> Result<Inbound> {
    let eth = EthernetRepr::parse(frame)?;
    let payload = &frame[eth.header_len()..];

    match eth.ethertype {
        EthernetProtocol::Arp => Ok(Inbound::Arp(ArpRepr::parse(payload)?)),
        EthernetProtocol::Ipv4 => {
            let (ip, range) = Ipv4Repr::parse(payload)?;
            if ip.protocol != IpProtocol::Tcp {
                return Ok(Inbound::Other);
            }
            let datagram = &payload[range];
            let (tcp, range) = TcpRepr::parse(datagram, ip.src_addr, ip.dst_addr)?;
            Ok(Inbound::Tcp(Segment {
                ip,
                tcp,
                payload: &datagram[range],
            }))
        },
        _ => Ok(Inbound::Other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{ArpOperation, Error, TcpFlags, TcpSeqNumber};

    const MAC_A: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 0x0a]);
    const MAC_B: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 0x0b]);

    fn identity(vlan: u16) -> Identity {
        Identity {
            mac: MAC_A,
            ip: "10.0.0.1".parse().unwrap(),
            vlan,
        }
    }

    fn probe() -> ArpRepr {
        ArpRepr {
            operation: ArpOperation::Request,
            source_hardware_addr: MAC_A,
            source_protocol_addr: "10.0.0.1".parse().unwrap(),
            target_hardware_addr: EthernetAddress::BROADCAST,
            target_protocol_addr: "10.0.0.2".parse().unwrap(),
        }
    }

    fn segment_frame(vlan: u16, payload: &[u8]) -> Vec<u8> {
        let ip = Ipv4Repr {
            src_addr: "10.0.0.1".parse().unwrap(),
            dst_addr: "10.0.0.2".parse().unwrap(),
            protocol: IpProtocol::Tcp,
            ident: 30000,
            ttl: 128,
            dont_fragment: true,
            payload_len: 0,
        };
        let tcp = TcpRepr {
            src_port: 49152,
            dst_port: 23,
            seq_number: TcpSeqNumber(1),
            ack_number: TcpSeqNumber(1),
            flags: TcpFlags::PSH | TcpFlags::ACK,
            window_len: 65535,
            max_seg_size: None,
            window_scale: None,
        };
        tcp_frame(&identity(vlan), MAC_B, ip, &tcp, payload)
    }

    #[test]
    fn untagged_arp() {
        let frame = arp_frame(&identity(1), EthernetAddress::BROADCAST, &probe());
        assert_eq!(frame.len(), 14 + 28);
        assert_eq!(&frame[12..14], &[0x08, 0x06]);
        match classify(&frame) {
            Ok(Inbound::Arp(arp)) => assert_eq!(arp, probe()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn tagged_arp_best_effort() {
        let frame = arp_frame(&identity(10), EthernetAddress::BROADCAST, &probe());
        assert_eq!(frame.len(), 18 + 28);
        assert_eq!(&frame[12..18], &[0x81, 0x00, 0x00, 0x0a, 0x08, 0x06]);
        assert!(matches!(classify(&frame), Ok(Inbound::Arp(_))));
    }

    #[test]
    fn tagged_tcp_background() {
        let frame = segment_frame(10, b"abc");
        assert_eq!(&frame[12..16], &[0x81, 0x00, 0x20, 0x0a]);

        let eth = EthernetRepr::parse(&frame).unwrap();
        assert_eq!(eth.dst_addr, MAC_B);
        assert_eq!(eth.src_addr, MAC_A);

        match classify(&frame) {
            Ok(Inbound::Tcp(segment)) => {
                assert_eq!(segment.ip.ttl, 128);
                assert!(segment.ip.dont_fragment);
                assert_eq!(segment.tcp.dst_port, 23);
                assert_eq!(segment.payload, b"abc");
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn corrupted_segment() {
        let mut frame = segment_frame(0, b"abc");
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(matches!(classify(&frame), Err(Error::WrongChecksum)));
    }

    #[test]
    fn other_ethertype() {
        let mut frame = segment_frame(0, b"");
        frame[12] = 0x86;
        frame[13] = 0xdd;
        assert!(matches!(classify(&frame), Ok(Inbound::Other)));
    }
}
