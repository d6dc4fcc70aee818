use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::{EthernetAddress, EthernetProtocol, Ipv4Address};

enum_with_unknown! {
    /// ARP hardware type.
    pub enum Hardware(u16) {
        Ethernet = 1
    }
}

enum_with_unknown! {
    /// ARP operation type.
    pub enum Operation(u16) {
        Request = 1,
        Reply = 2
    }
}

mod field {
    #![allow(non_snake_case)]

    use crate::wire::field::Field;

    pub const HTYPE: Field = 0..2;
    pub const PTYPE: Field = 2..4;
    pub const HLEN:  usize = 4;
    pub const PLEN:  usize = 5;
    pub const OPER:  Field = 6..8;

    pub const SHA: Field = 8..14;
    pub const SPA: Field = 14..18;
    pub const THA: Field = 18..24;
    pub const TPA: Field = 24..28;
}

/// A high-level representation of an Ethernet/IPv4 ARP packet.
///
/// Other hardware or protocol combinations are rejected when parsing, there is nothing this
/// endpoint could do with them.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub operation: Operation,
    pub source_hardware_addr: EthernetAddress,
    pub source_protocol_addr: Ipv4Address,
    pub target_hardware_addr: EthernetAddress,
    pub target_protocol_addr: Ipv4Address,
}

impl Repr {
    /// The length of an Ethernet/IPv4 ARP packet.
    pub const LEN: usize = field::TPA.end;

    /// Parse an Ethernet/IPv4 ARP packet.
    pub fn parse(buffer: &[u8]) -> Result<Repr> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }

        let hardware = Hardware::from(NetworkEndian::read_u16(&buffer[field::HTYPE]));
        let protocol = EthernetProtocol::from(NetworkEndian::read_u16(&buffer[field::PTYPE]));
        match (hardware, protocol, buffer[field::HLEN], buffer[field::PLEN]) {
            (Hardware::Ethernet, EthernetProtocol::Ipv4, 6, 4) => (),
            _ => return Err(Error::Unrecognized),
        }

        Ok(Repr {
            operation: Operation::from(NetworkEndian::read_u16(&buffer[field::OPER])),
            source_hardware_addr: EthernetAddress::from_bytes(&buffer[field::SHA]),
            source_protocol_addr: read_ipv4(&buffer[field::SPA]),
            target_hardware_addr: EthernetAddress::from_bytes(&buffer[field::THA]),
            target_protocol_addr: read_ipv4(&buffer[field::TPA]),
        })
    }

    /// Return the length of a packet that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        Self::LEN
    }

    /// Emit a high-level representation into an Address Resolution Protocol packet.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than `buffer_len`.
    pub fn emit(&self, buffer: &mut [u8]) {
        NetworkEndian::write_u16(&mut buffer[field::HTYPE], Hardware::Ethernet.into());
        NetworkEndian::write_u16(&mut buffer[field::PTYPE], EthernetProtocol::Ipv4.into());
        buffer[field::HLEN] = 6;
        buffer[field::PLEN] = 4;
        NetworkEndian::write_u16(&mut buffer[field::OPER], self.operation.into());
        buffer[field::SHA].copy_from_slice(self.source_hardware_addr.as_bytes());
        buffer[field::SPA].copy_from_slice(&self.source_protocol_addr.octets());
        buffer[field::THA].copy_from_slice(self.target_hardware_addr.as_bytes());
        buffer[field::TPA].copy_from_slice(&self.target_protocol_addr.octets());
    }
}

pub(crate) fn read_ipv4(bytes: &[u8]) -> Ipv4Address {
    Ipv4Address::new(bytes[0], bytes[1], bytes[2], bytes[3])
}

#[cfg(test)]
mod test {
    use super::*;

    static PACKET_BYTES: [u8; 28] = [
        0x00, 0x01,
        0x08, 0x00,
        0x06,
        0x04,
        0x00, 0x01,
        0x11, 0x12, 0x13, 0x14, 0x15, 0x16,
        0x21, 0x22, 0x23, 0x24,
        0x31, 0x32, 0x33, 0x34, 0x35, 0x36,
        0x41, 0x42, 0x43, 0x44,
    ];

    fn packet_repr() -> Repr {
        Repr {
            operation: Operation::Request,
            source_hardware_addr:
                EthernetAddress::from_bytes(&[0x11, 0x12, 0x13, 0x14, 0x15, 0x16]),
            source_protocol_addr:
                Ipv4Address::new(0x21, 0x22, 0x23, 0x24),
            target_hardware_addr:
                EthernetAddress::from_bytes(&[0x31, 0x32, 0x33, 0x34, 0x35, 0x36]),
            target_protocol_addr:
                Ipv4Address::new(0x41, 0x42, 0x43, 0x44),
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(Repr::parse(&PACKET_BYTES), Ok(packet_repr()));
    }

    #[test]
    fn test_emit() {
        let mut bytes = [0xa5u8; 28];
        packet_repr().emit(&mut bytes);
        assert_eq!(&bytes[..], &PACKET_BYTES[..]);
    }

    #[test]
    fn test_reject_foreign() {
        let mut bytes = PACKET_BYTES;
        bytes[5] = 16;
        assert_eq!(Repr::parse(&bytes), Err(Error::Unrecognized));
        assert_eq!(Repr::parse(&PACKET_BYTES[..27]), Err(Error::Truncated));
    }
}
