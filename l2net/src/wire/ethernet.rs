use core::{fmt, str::FromStr};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};

enum_with_unknown! {
    /// Ethernet protocol type.
    pub enum EtherType(u16) {
        Ipv4 = 0x0800,
        Arp  = 0x0806,
        Vlan = 0x8100,
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EtherType::Ipv4 => write!(f, "IPv4"),
            EtherType::Arp  => write!(f, "ARP"),
            EtherType::Vlan => write!(f, "802.1Q"),
            EtherType::Unknown(id) => write!(f, "0x{:04x}", id)
        }
    }
}

/// A six-octet Ethernet II address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 6]);

impl Address {
    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 6]);

    /// The all-zero address, used for unknown hardware addresses.
    pub const UNSPECIFIED: Address = Address([0; 6]);

    /// Construct an Ethernet address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not six octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 6];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an Ethernet address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_broadcast() ||
          self.is_multicast())
    }

    /// Query whether this address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the "multicast" bit in the OUI is set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

/// Error returned when a string is not a valid Ethernet address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseAddressError {
    kind: ParseAddressErrorKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseAddressErrorKind {
    ComponentError,
    SeparatorError,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
               bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5])
    }
}

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self.kind {
            ParseAddressErrorKind::ComponentError => "invalid ethernet component",
            ParseAddressErrorKind::SeparatorError => "unexpected number of ethernet address components (should be 6)",
        })
    }
}

impl std::error::Error for ParseAddressError {}

/// Parses `00:11:22:33:44:55`, the dash separated form is accepted as well.
impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(src: &str) -> core::result::Result<Self, ParseAddressError> {
        let separator = if src.contains('-') { '-' } else { ':' };
        let mut parsed = [0; 6];
        let mut components = src.split(separator);
        for c in parsed.iter_mut() {
            let part = components
                .next()
                .ok_or(ParseAddressError {
                    kind: ParseAddressErrorKind::SeparatorError,
                })?;
            if part.len() != 2 {
                return Err(ParseAddressError {
                    kind: ParseAddressErrorKind::ComponentError,
                });
            }
            *c = u8::from_str_radix(part, 16)
                .map_err(|_| ParseAddressError {
                    kind: ParseAddressErrorKind::ComponentError,
                })?;
        }

        if components.next().is_some() {
            return Err(ParseAddressError {
                kind: ParseAddressErrorKind::SeparatorError,
            });
        }

        Ok(Address(parsed))
    }
}

/// The tag control information of an 802.1Q header.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Default)]
pub struct VlanTag {
    /// Priority code point, the three top bits.
    pub priority: u8,
    /// The twelve bit VLAN identifier.
    pub vlan_id: u16,
}

impl VlanTag {
    fn from_tci(tci: u16) -> Self {
        VlanTag {
            priority: (tci >> 13) as u8,
            vlan_id: tci & 0x0fff,
        }
    }

    fn tci(&self) -> u16 {
        (u16::from(self.priority & 0x7) << 13) | (self.vlan_id & 0x0fff)
    }
}

mod field {
    use crate::wire::field::Field;

    pub const DESTINATION: Field = 0..6;
    pub const SOURCE: Field = 6..12;
    pub const ETHERTYPE: Field = 12..14;
    pub const TCI: Field = 14..16;
    pub const INNER_ETHERTYPE: Field = 16..18;
}

/// A high-level representation of an Ethernet II header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The destination hardware address.
    pub dst_addr: Address,
    /// The source hardware address.
    pub src_addr: Address,
    /// An optional 802.1Q tag between the addresses and the ethertype.
    pub vlan: Option<VlanTag>,
    /// The ethertype of the payload, never `Vlan` for a parsed header.
    pub ethertype: EtherType,
}

impl Repr {
    /// Length of the untagged header.
    pub const HEADER_LEN: usize = field::ETHERTYPE.end;

    /// Length of the header when a VLAN tag is present.
    pub const TAGGED_HEADER_LEN: usize = field::INNER_ETHERTYPE.end;

    /// Parse the header of an Ethernet frame, looking through one VLAN tag.
    pub fn parse(buffer: &[u8]) -> Result<Repr> {
        if buffer.len() < Self::HEADER_LEN {
            return Err(Error::Truncated);
        }

        let dst_addr = Address::from_bytes(&buffer[field::DESTINATION]);
        let src_addr = Address::from_bytes(&buffer[field::SOURCE]);
        let outer = EtherType::from(NetworkEndian::read_u16(&buffer[field::ETHERTYPE]));

        let (vlan, ethertype) = match outer {
            EtherType::Vlan => {
                if buffer.len() < Self::TAGGED_HEADER_LEN {
                    return Err(Error::Truncated);
                }
                let tag = VlanTag::from_tci(NetworkEndian::read_u16(&buffer[field::TCI]));
                let inner = NetworkEndian::read_u16(&buffer[field::INNER_ETHERTYPE]);
                (Some(tag), EtherType::from(inner))
            },
            other => (None, other),
        };

        if let EtherType::Vlan = ethertype {
            // Stacked tags (QinQ) are not something we would ever be addressed with.
            return Err(Error::Unrecognized);
        }

        Ok(Repr { dst_addr, src_addr, vlan, ethertype })
    }

    /// The length of the header this representation emits.
    pub fn header_len(&self) -> usize {
        match self.vlan {
            Some(_) => Self::TAGGED_HEADER_LEN,
            None => Self::HEADER_LEN,
        }
    }

    /// Emit the header into the start of `buffer`.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than `header_len`.
    pub fn emit(&self, buffer: &mut [u8]) {
        buffer[field::DESTINATION].copy_from_slice(self.dst_addr.as_bytes());
        buffer[field::SOURCE].copy_from_slice(self.src_addr.as_bytes());
        match self.vlan {
            Some(tag) => {
                NetworkEndian::write_u16(&mut buffer[field::ETHERTYPE], EtherType::Vlan.into());
                NetworkEndian::write_u16(&mut buffer[field::TCI], tag.tci());
                NetworkEndian::write_u16(&mut buffer[field::INNER_ETHERTYPE], self.ethertype.into());
            },
            None => {
                NetworkEndian::write_u16(&mut buffer[field::ETHERTYPE], self.ethertype.into());
            },
        }
    }
}
