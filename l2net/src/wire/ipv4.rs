use core::{fmt, ops};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::Ipv4Address as Address;

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        Icmp = 0x01,
        Tcp  = 0x06,
        Udp  = 0x11,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Icmp => write!(f, "ICMP"),
            Protocol::Tcp  => write!(f, "TCP"),
            Protocol::Udp  => write!(f, "UDP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const DSCP_ECN: usize = 1;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

const FLAG_DONT_FRAG: u16 = 0x4000;
const FLAG_MORE_FRAGS: u16 = 0x2000;
const FRAG_OFFSET_MASK: u16 = 0x1fff;

/// A high-level representation of an Internet Protocol version 4 packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source of the packet.
    pub src_addr:      Address,
    /// The destination of the packet.
    pub dst_addr:      Address,
    /// The encapsulated protocol identifier.
    pub protocol:      Protocol,
    /// The identification field.
    pub ident:         u16,
    /// The remaining hop limit of the packet.
    pub ttl:           u8,
    /// Whether the don't-fragment flag is set.
    pub dont_fragment: bool,
    /// The length of the payload.
    pub payload_len:   usize,
}

impl Repr {
    /// Length of a header without options, the only kind we emit.
    pub const HEADER_LEN: usize = field::DST_ADDR.end;

    /// Parse an IPv4 packet, returning the header and the range of the payload in `buffer`.
    ///
    /// Trailing bytes after the total length (Ethernet padding) are not part of the payload.
    pub fn parse(buffer: &[u8]) -> Result<(Repr, ops::Range<usize>)> {
        if buffer.len() < Self::HEADER_LEN {
            return Err(Error::Truncated);
        }

        // Version 4 is expected.
        if buffer[field::VER_IHL] >> 4 != 4 {
            return Err(Error::Malformed);
        }

        let header_len = usize::from(buffer[field::VER_IHL] & 0x0f) * 4;
        let total_len = usize::from(NetworkEndian::read_u16(&buffer[field::LENGTH]));
        if header_len < Self::HEADER_LEN || header_len > total_len {
            return Err(Error::Malformed);
        }
        if buffer.len() < total_len {
            return Err(Error::Truncated);
        }

        if checksum::data(&buffer[..header_len]) != !0 {
            return Err(Error::WrongChecksum);
        }

        let flags = NetworkEndian::read_u16(&buffer[field::FLG_OFF]);
        // We do not reassemble fragments.
        if flags & FLAG_MORE_FRAGS != 0 || flags & FRAG_OFFSET_MASK != 0 {
            return Err(Error::Unrecognized);
        }

        let repr = Repr {
            src_addr: super::arp::read_ipv4(&buffer[field::SRC_ADDR]),
            dst_addr: super::arp::read_ipv4(&buffer[field::DST_ADDR]),
            protocol: Protocol::from(buffer[field::PROTOCOL]),
            ident: NetworkEndian::read_u16(&buffer[field::IDENT]),
            ttl: buffer[field::TTL],
            dont_fragment: flags & FLAG_DONT_FRAG != 0,
            payload_len: total_len - header_len,
        };

        Ok((repr, header_len..total_len))
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        // We never emit any options.
        Self::HEADER_LEN
    }

    /// Emit the header into the start of `buffer`, filling in the checksum.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than `buffer_len`.
    pub fn emit(&self, buffer: &mut [u8]) {
        buffer[field::VER_IHL] = 0x40 | (Self::HEADER_LEN / 4) as u8;
        buffer[field::DSCP_ECN] = 0;
        let total_len = (Self::HEADER_LEN + self.payload_len) as u16;
        NetworkEndian::write_u16(&mut buffer[field::LENGTH], total_len);
        NetworkEndian::write_u16(&mut buffer[field::IDENT], self.ident);
        let flags = if self.dont_fragment { FLAG_DONT_FRAG } else { 0 };
        NetworkEndian::write_u16(&mut buffer[field::FLG_OFF], flags);
        buffer[field::TTL] = self.ttl;
        buffer[field::PROTOCOL] = self.protocol.into();
        buffer[field::SRC_ADDR].copy_from_slice(&self.src_addr.octets());
        buffer[field::DST_ADDR].copy_from_slice(&self.dst_addr.octets());

        NetworkEndian::write_u16(&mut buffer[field::CHECKSUM], 0);
        let checksum = !checksum::data(&buffer[..Self::HEADER_LEN]);
        NetworkEndian::write_u16(&mut buffer[field::CHECKSUM], checksum);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv4 src={} dst={} proto={} id={} ttl={}",
               self.src_addr, self.dst_addr, self.protocol, self.ident, self.ttl)
    }
}

pub(crate) mod checksum {
    use byteorder::{ByteOrder, NetworkEndian};

    use super::{Address, Protocol};

    fn propagate_carries(word: u32) -> u16 {
        let sum = (word >> 16) + (word & 0xffff);
        ((sum >> 16) as u16) + (sum as u16)
    }

    /// Compute an RFC 1071 compliant checksum (without the final complement).
    pub(crate) fn data(mut data: &[u8]) -> u16 {
        let mut accum = 0;

        while data.len() >= 2 {
            accum += NetworkEndian::read_u16(data) as u32;
            data = &data[2..];
        }

        // Add the last remaining odd byte, if any.
        if let Some(&value) = data.first() {
            accum += (value as u32) << 8;
        }

        propagate_carries(accum)
    }

    /// Combine several RFC 1071 compliant checksums.
    pub(crate) fn combine(checksums: &[u16]) -> u16 {
        let mut accum: u32 = 0;
        for &word in checksums {
            accum += word as u32;
        }
        propagate_carries(accum)
    }

    /// Compute an IPv4 pseudo header checksum.
    pub(crate) fn pseudo_header(src_addr: &Address, dst_addr: &Address,
                                protocol: Protocol, length: u32) -> u16 {
        let mut proto_len = [0u8; 4];
        proto_len[1] = protocol.into();
        NetworkEndian::write_u16(&mut proto_len[2..4], length as u16);

        combine(&[
            data(&src_addr.octets()),
            data(&dst_addr.octets()),
            data(&proto_len[..])
        ])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static PACKET_BYTES: [u8; 30] = [
        0x45, 0x00, 0x00, 0x1e,
        0x01, 0x02, 0x40, 0x00,
        0x1a, 0x01, 0xf8, 0x73,
        0x11, 0x12, 0x13, 0x14,
        0x21, 0x22, 0x23, 0x24,
        0xaa, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x00, 0xff,
    ];

    fn packet_repr() -> Repr {
        Repr {
            src_addr: Address::new(0x11, 0x12, 0x13, 0x14),
            dst_addr: Address::new(0x21, 0x22, 0x23, 0x24),
            protocol: Protocol::Icmp,
            ident: 0x0102,
            ttl: 0x1a,
            dont_fragment: true,
            payload_len: 10,
        }
    }

    #[test]
    fn test_emit_then_checksum_verifies() {
        let mut bytes = [0u8; 20];
        packet_repr().emit(&mut bytes);
        assert_eq!(checksum::data(&bytes), !0);
        assert_eq!(&bytes[..10], &PACKET_BYTES[..10]);
        assert_eq!(&bytes[12..], &PACKET_BYTES[12..20]);
    }

    #[test]
    fn test_parse() {
        let mut bytes = PACKET_BYTES;
        packet_repr().emit(&mut bytes[..20]);
        let (repr, payload) = Repr::parse(&bytes).unwrap();
        assert_eq!(repr, packet_repr());
        assert_eq!(payload, 20..30);
    }

    #[test]
    fn test_parse_ignores_padding() {
        let mut bytes = [0u8; 40];
        bytes[..30].copy_from_slice(&PACKET_BYTES);
        packet_repr().emit(&mut bytes[..20]);
        let (_, payload) = Repr::parse(&bytes).unwrap();
        assert_eq!(payload, 20..30);
    }

    #[test]
    fn test_parse_bad_checksum() {
        let mut bytes = PACKET_BYTES;
        packet_repr().emit(&mut bytes[..20]);
        bytes[field::TTL] ^= 0xff;
        assert_eq!(Repr::parse(&bytes), Err(Error::WrongChecksum));
    }

    #[test]
    fn test_parse_truncated() {
        let mut bytes = PACKET_BYTES;
        packet_repr().emit(&mut bytes[..20]);
        assert_eq!(Repr::parse(&bytes[..25]), Err(Error::Truncated));
        assert_eq!(Repr::parse(&bytes[..12]), Err(Error::Truncated));
    }
}
