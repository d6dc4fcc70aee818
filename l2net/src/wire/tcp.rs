use core::{cmp, fmt, ops};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::{IpProtocol, Ipv4Address};
use super::ipv4::checksum;

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>.
/// Sequence numbers do not have a discontiguity when compared pairwise across a signed overflow.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub i32);

impl SeqNumber {
    /// Convert from the unsigned wire value.
    pub fn from_wire(raw: u32) -> Self {
        SeqNumber(raw as i32)
    }

    /// The unsigned wire value.
    pub fn to_wire(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0 as u32)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        SeqNumber(self.0.wrapping_add(rhs as i32))
    }
}

impl ops::Sub<usize> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: usize) -> SeqNumber {
        SeqNumber(self.0.wrapping_sub(rhs as i32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.0.wrapping_sub(other.0).partial_cmp(&0)
    }
}

/// The control bits of a TCP header.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u16);

impl Flags {
    /// No more data from the sender.
    pub const FIN: Flags = Flags(0x001);
    /// Synchronize sequence numbers.
    pub const SYN: Flags = Flags(0x002);
    /// Reset the connection.
    pub const RST: Flags = Flags(0x004);
    /// Push buffered data to the application.
    pub const PSH: Flags = Flags(0x008);
    /// The acknowledgement field is significant.
    pub const ACK: Flags = Flags(0x010);
    /// The urgent pointer is significant.
    pub const URG: Flags = Flags(0x020);

    const MASK: u16 = 0x1ff;

    /// Whether the FIN bit is set.
    pub fn fin(self) -> bool { self.contains(Flags::FIN) }
    /// Whether the SYN bit is set.
    pub fn syn(self) -> bool { self.contains(Flags::SYN) }
    /// Whether the RST bit is set.
    pub fn rst(self) -> bool { self.contains(Flags::RST) }
    /// Whether the PSH bit is set.
    pub fn psh(self) -> bool { self.contains(Flags::PSH) }
    /// Whether the ACK bit is set.
    pub fn ack(self) -> bool { self.contains(Flags::ACK) }

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Only the acknowledgement bit is set.
    pub fn is_bare_ack(self) -> bool {
        self == Flags::ACK
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [(Flags, &str); 6] = [
            (Flags::SYN, "SYN"), (Flags::FIN, "FIN"), (Flags::RST, "RST"),
            (Flags::PSH, "PSH"), (Flags::URG, "URG"), (Flags::ACK, "ACK"),
        ];
        let mut first = true;
        for (flag, name) in NAMES.iter() {
            if self.contains(*flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

mod field {
    #![allow(non_snake_case)]

    use crate::wire::field::Field;

    pub const SRC_PORT: Field = 0..2;
    pub const DST_PORT: Field = 2..4;
    pub const SEQ_NUM:  Field = 4..8;
    pub const ACK_NUM:  Field = 8..12;
    pub const FLAGS:    Field = 12..14;
    pub const WIN_SIZE: Field = 14..16;
    pub const CHECKSUM: Field = 16..18;
    pub const URGENT:   Field = 18..20;

    pub const OPT_END: u8 = 0x00;
    pub const OPT_NOP: u8 = 0x01;
    pub const OPT_MSS: u8 = 0x02;
    pub const OPT_WS:  u8 = 0x03;
}

/// A high-level representation of a TCP segment header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq_number: SeqNumber,
    pub ack_number: SeqNumber,
    pub flags: Flags,
    pub window_len: u16,
    pub max_seg_size: Option<u16>,
    pub window_scale: Option<u8>,
}

impl Repr {
    /// Length of a header without options.
    pub const HEADER_LEN: usize = field::URGENT.end;

    /// Parse a TCP segment, verifying its checksum against the IPv4 pseudo header.
    ///
    /// Returns the header and the range of the payload within `buffer`.
    pub fn parse(buffer: &[u8], src_addr: Ipv4Address, dst_addr: Ipv4Address)
        -> Result<(Repr, ops::Range<usize>)>
    {
        if buffer.len() < Self::HEADER_LEN {
            return Err(Error::Truncated);
        }

        let offset_flags = NetworkEndian::read_u16(&buffer[field::FLAGS]);
        let header_len = usize::from(offset_flags >> 12) * 4;
        if header_len < Self::HEADER_LEN {
            return Err(Error::Malformed);
        }
        if header_len > buffer.len() {
            return Err(Error::Truncated);
        }

        let pseudo = checksum::pseudo_header(&src_addr, &dst_addr,
                                             IpProtocol::Tcp, buffer.len() as u32);
        if checksum::combine(&[pseudo, checksum::data(buffer)]) != !0 {
            return Err(Error::WrongChecksum);
        }

        let mut repr = Repr {
            src_port: NetworkEndian::read_u16(&buffer[field::SRC_PORT]),
            dst_port: NetworkEndian::read_u16(&buffer[field::DST_PORT]),
            seq_number: SeqNumber::from_wire(NetworkEndian::read_u32(&buffer[field::SEQ_NUM])),
            ack_number: SeqNumber::from_wire(NetworkEndian::read_u32(&buffer[field::ACK_NUM])),
            flags: Flags(offset_flags & Flags::MASK),
            window_len: NetworkEndian::read_u16(&buffer[field::WIN_SIZE]),
            max_seg_size: None,
            window_scale: None,
        };

        let mut options = &buffer[Self::HEADER_LEN..header_len];
        while let Some(&kind) = options.first() {
            match kind {
                field::OPT_END => break,
                field::OPT_NOP => {
                    options = &options[1..];
                    continue;
                },
                _ => (),
            }

            let len = match options.get(1) {
                Some(&len) if len >= 2 && usize::from(len) <= options.len() => usize::from(len),
                _ => return Err(Error::Malformed),
            };

            match (kind, len) {
                (field::OPT_MSS, 4) => {
                    repr.max_seg_size = Some(NetworkEndian::read_u16(&options[2..4]));
                },
                (field::OPT_WS, 3) => {
                    repr.window_scale = Some(options[2]);
                },
                (field::OPT_MSS, _) | (field::OPT_WS, _) => return Err(Error::Malformed),
                // Timestamps, SACK and friends are not negotiated by us.
                _ => (),
            }

            options = &options[len..];
        }

        Ok((repr, header_len..buffer.len()))
    }

    fn options_len(&self) -> usize {
        let mut len = 0;
        if self.max_seg_size.is_some() {
            len += 4;
        }
        if self.window_scale.is_some() {
            // Preceded by a NOP to keep the header word aligned.
            len += 4;
        }
        len
    }

    /// The length of the header this representation emits.
    pub fn header_len(&self) -> usize {
        Self::HEADER_LEN + self.options_len()
    }

    /// Emit the header followed by `payload` into `buffer`, filling in the checksum.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than `header_len() + payload.len()`.
    pub fn emit(&self, buffer: &mut [u8], src_addr: Ipv4Address, dst_addr: Ipv4Address,
                payload: &[u8])
    {
        let header_len = self.header_len();
        let total_len = header_len + payload.len();
        let buffer = &mut buffer[..total_len];

        NetworkEndian::write_u16(&mut buffer[field::SRC_PORT], self.src_port);
        NetworkEndian::write_u16(&mut buffer[field::DST_PORT], self.dst_port);
        NetworkEndian::write_u32(&mut buffer[field::SEQ_NUM], self.seq_number.to_wire());
        NetworkEndian::write_u32(&mut buffer[field::ACK_NUM], self.ack_number.to_wire());
        let offset_flags = ((header_len / 4) as u16) << 12 | (self.flags.0 & Flags::MASK);
        NetworkEndian::write_u16(&mut buffer[field::FLAGS], offset_flags);
        NetworkEndian::write_u16(&mut buffer[field::WIN_SIZE], self.window_len);
        NetworkEndian::write_u16(&mut buffer[field::CHECKSUM], 0);
        NetworkEndian::write_u16(&mut buffer[field::URGENT], 0);

        let mut at = Self::HEADER_LEN;
        if let Some(mss) = self.max_seg_size {
            buffer[at] = field::OPT_MSS;
            buffer[at + 1] = 4;
            NetworkEndian::write_u16(&mut buffer[at + 2..at + 4], mss);
            at += 4;
        }
        if let Some(shift) = self.window_scale {
            buffer[at..at + 4].copy_from_slice(&[field::OPT_NOP, field::OPT_WS, 3, shift]);
        }

        buffer[header_len..].copy_from_slice(payload);

        let pseudo = checksum::pseudo_header(&src_addr, &dst_addr,
                                             IpProtocol::Tcp, total_len as u32);
        let sum = !checksum::combine(&[pseudo, checksum::data(buffer)]);
        NetworkEndian::write_u16(&mut buffer[field::CHECKSUM], sum);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={} [{}] seq={} ack={} win={}",
               self.src_port, self.dst_port, self.flags,
               self.seq_number, self.ack_number, self.window_len)?;
        if let Some(mss) = self.max_seg_size {
            write!(f, " mss={}", mss)?;
        }
        if let Some(ws) = self.window_scale {
            write!(f, " ws={}", ws)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SRC_ADDR: Ipv4Address = Ipv4Address::new(192, 168, 1, 1);
    const DST_ADDR: Ipv4Address = Ipv4Address::new(192, 168, 1, 2);

    fn syn_repr() -> Repr {
        Repr {
            src_port: 49152,
            dst_port: 23,
            seq_number: SeqNumber(0),
            ack_number: SeqNumber(0),
            flags: Flags::SYN,
            window_len: 65535,
            max_seg_size: Some(1460),
            window_scale: Some(8),
        }
    }

    #[test]
    fn seq_number_ordering_wraps() {
        let before = SeqNumber::from_wire(u32::max_value() - 1);
        let after = before + 4;
        assert_eq!(after.to_wire(), 2);
        assert!(before < after);
        assert!(after > before);
        assert_eq!(after - 4, before);
    }

    #[test]
    fn syn_options_layout() {
        let repr = syn_repr();
        assert_eq!(repr.header_len(), 28);

        let mut bytes = [0u8; 28];
        repr.emit(&mut bytes, SRC_ADDR, DST_ADDR, &[]);
        assert_eq!(bytes[12], 0x70);
        assert_eq!(bytes[13], 0x02);
        assert_eq!(&bytes[20..], &[0x02, 0x04, 0x05, 0xb4, 0x01, 0x03, 0x03, 0x08]);

        let (parsed, payload) = Repr::parse(&bytes, SRC_ADDR, DST_ADDR).unwrap();
        assert_eq!(parsed, repr);
        assert!(payload.is_empty());
    }

    #[test]
    fn payload_and_checksum() {
        let repr = Repr {
            flags: Flags::PSH | Flags::ACK,
            max_seg_size: None,
            window_scale: None,
            ..syn_repr()
        };
        let mut bytes = [0u8; 25];
        repr.emit(&mut bytes, SRC_ADDR, DST_ADDR, b"hello");

        let (parsed, payload) = Repr::parse(&bytes, SRC_ADDR, DST_ADDR).unwrap();
        assert_eq!(parsed.flags, Flags::PSH | Flags::ACK);
        assert_eq!(&bytes[payload], b"hello");

        // Verified against the pseudo header, so another destination fails.
        let elsewhere = Ipv4Address::new(192, 168, 1, 3);
        assert_eq!(Repr::parse(&bytes, SRC_ADDR, elsewhere), Err(Error::WrongChecksum));
    }

    #[test]
    fn malformed_offset() {
        let mut bytes = [0u8; 20];
        bytes[12] = 0x40;
        assert_eq!(Repr::parse(&bytes, SRC_ADDR, DST_ADDR), Err(Error::Malformed));
        bytes[12] = 0xf0;
        assert_eq!(Repr::parse(&bytes, SRC_ADDR, DST_ADDR), Err(Error::Truncated));
    }

    #[test]
    fn flags_display() {
        assert_eq!((Flags::SYN | Flags::ACK).to_string(), "SYN|ACK");
        assert_eq!(Flags::default().to_string(), "-");
        assert!(Flags::ACK.is_bare_ack());
        assert!(!(Flags::FIN | Flags::ACK).is_bare_ack());
    }
}
