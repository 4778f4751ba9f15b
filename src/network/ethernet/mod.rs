use crate::error::{Error, Result};

pub mod vlan;

use vlan::{VlanId, VLAN_ID_MASK, VLAN_TAG_LEN, VLAN_TPID};

/// A data link physical address
pub type MacAddress = [u8; 6];

/// Destination and source addresses; a tag, when present, sits right after them.
pub const MAC_PREFIX_LEN: usize = 12;

/// Smallest decodable untagged header (addresses + EtherType).
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Creates a MAC address from a u64
#[macro_export]
macro_rules! mac_addr {
    ($num:expr) => {{
        let num = $num as u64;
        [
            (((num >> 40) & 0xff) as u8 & 0xFE), // Clear the least significant bit to avoid multicast
            ((num >> 32) & 0xff) as u8,
            ((num >> 24) & 0xff) as u8,
            ((num >> 16) & 0xff) as u8,
            ((num >> 8) & 0xff) as u8,
            (num & 0xff) as u8,
        ]
    }};
}

/// Broadcast MAC address
#[macro_export]
macro_rules! mac_broadcast_addr {
    () => {
        [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
    };
}

/// Returns true if the address is a multicast or broadcast address
#[macro_export]
macro_rules! is_mac_multicast_or_broadcast {
    ($address:expr) => {
        $address[0] & 0x01 == 0x01 || $address == $crate::mac_broadcast_addr!()
    };
}

/// Formats a MAC address as `aa:bb:cc:dd:ee:ff`.
pub fn format_mac(address: &MacAddress) -> String {
    address
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// The decoded fixed part of an Ethernet frame.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct EthernetHeader {
    pub destination_address: MacAddress,
    pub source_address: MacAddress,
    pub ether_type: u16,
    pub vlan_id: Option<VlanId>, // None if the frame is untagged
}

impl EthernetHeader {
    /// Length of the header on the wire, including the tag if present.
    pub fn len(&self) -> usize {
        match self.vlan_id {
            Some(_) => ETHERNET_HEADER_LEN + VLAN_TAG_LEN,
            None => ETHERNET_HEADER_LEN,
        }
    }
}

/// Reads the addresses, the optional VLAN tag and the EtherType.
///
/// The priority and DEI bits of a tag are ignored; only the low 12 bits are kept as the VLAN id.
pub fn parse_header(bytes: &[u8]) -> Result<EthernetHeader> {
    if bytes.len() < ETHERNET_HEADER_LEN {
        return Err(Error::Truncated {
            kind: "Ethernet header",
            len: bytes.len(),
            min: ETHERNET_HEADER_LEN,
        });
    }

    let destination_address = [
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5],
    ];
    let source_address = [
        bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11],
    ];

    let ether_type_or_tpid = u16::from_be_bytes([bytes[12], bytes[13]]);
    if ether_type_or_tpid != VLAN_TPID {
        return Ok(EthernetHeader {
            destination_address,
            source_address,
            ether_type: ether_type_or_tpid,
            vlan_id: None,
        });
    }

    let tagged_len = ETHERNET_HEADER_LEN + VLAN_TAG_LEN;
    if bytes.len() < tagged_len {
        return Err(Error::Truncated {
            kind: "tagged Ethernet header",
            len: bytes.len(),
            min: tagged_len,
        });
    }

    let tci = u16::from_be_bytes([bytes[14], bytes[15]]);
    let ether_type = u16::from_be_bytes([bytes[16], bytes[17]]);

    Ok(EthernetHeader {
        destination_address,
        source_address,
        ether_type,
        vlan_id: Some(tci & VLAN_ID_MASK),
    })
}

/// An Ethernet II frame as seen on the wire, carrying at most one VLAN tag.
///
/// The raw bytes are kept as received so that frames forwarded unchanged leave the switch bit for bit.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EthernetFrame {
    header: EthernetHeader,
    bytes: Vec<u8>,
}

impl EthernetFrame {
    /// Builds an untagged frame.
    pub fn new(
        destination_address: MacAddress,
        source_address: MacAddress,
        ether_type: u16,
        data: &[u8],
    ) -> EthernetFrame {
        let mut bytes = Vec::with_capacity(ETHERNET_HEADER_LEN + data.len());
        bytes.extend_from_slice(&destination_address);
        bytes.extend_from_slice(&source_address);
        bytes.extend_from_slice(&ether_type.to_be_bytes());
        bytes.extend_from_slice(data);

        EthernetFrame {
            header: EthernetHeader {
                destination_address,
                source_address,
                ether_type,
                vlan_id: None,
            },
            bytes,
        }
    }

    pub fn destination_address(&self) -> MacAddress {
        self.header.destination_address
    }

    pub fn source_address(&self) -> MacAddress {
        self.header.source_address
    }

    pub fn ether_type(&self) -> u16 {
        self.header.ether_type
    }

    pub fn vlan_id(&self) -> Option<VlanId> {
        self.header.vlan_id
    }

    pub fn is_tagged(&self) -> bool {
        self.header.vlan_id.is_some()
    }

    /// Everything after the header.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.header.len()..]
    }

    /// Total length on the wire.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns a copy of the frame with a tag inserted after the MAC addresses; the frame grows by 4 bytes.
    ///
    /// Only one tag is supported, so an already tagged frame is refused.
    pub fn insert_tag(&self, vlan_id: VlanId) -> Result<EthernetFrame> {
        if self.is_tagged() {
            return Err(Error::AlreadyTagged);
        }
        vlan::validate(vlan_id)?;

        let mut bytes = Vec::with_capacity(self.bytes.len() + VLAN_TAG_LEN);
        bytes.extend_from_slice(&self.bytes[..MAC_PREFIX_LEN]);
        bytes.extend_from_slice(&vlan::encode_tag(vlan_id));
        bytes.extend_from_slice(&self.bytes[MAC_PREFIX_LEN..]);

        Ok(EthernetFrame {
            header: EthernetHeader {
                vlan_id: Some(vlan_id),
                ..self.header
            },
            bytes,
        })
    }

    /// Returns a copy of the frame with its tag removed; the frame shrinks by 4 bytes.
    pub fn strip_tag(&self) -> Result<EthernetFrame> {
        if !self.is_tagged() {
            return Err(Error::Untagged);
        }

        let mut bytes = Vec::with_capacity(self.bytes.len() - VLAN_TAG_LEN);
        bytes.extend_from_slice(&self.bytes[..MAC_PREFIX_LEN]);
        bytes.extend_from_slice(&self.bytes[MAC_PREFIX_LEN + VLAN_TAG_LEN..]);

        Ok(EthernetFrame {
            header: EthernetHeader {
                vlan_id: None,
                ..self.header
            },
            bytes,
        })
    }
}

impl ByteSerializable for EthernetFrame {
    fn from_bytes(bytes: &[u8]) -> Result<EthernetFrame> {
        let header = parse_header(bytes)?;
        Ok(EthernetFrame {
            header,
            bytes: bytes.to_vec(),
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

pub trait ByteSerializable {
    // Convert a byte array to a struct
    fn from_bytes(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;

    // Convert the struct to a byte array
    fn to_bytes(&self) -> Vec<u8>;
}
