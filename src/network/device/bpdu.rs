use crate::{
    error::{Error, Result},
    network::ethernet::{ByteSerializable, MacAddress},
};

/// BPDU MAC address for Spanning Tree Protocol
#[macro_export]
macro_rules! mac_bpdu_addr {
    () => {
        [0x01, 0x80, 0xC2, 0x00, 0x00, 0x00]
    };
}

/// Value of the 802.3 length field in every BPDU we emit.
const BPDU_LENGTH_FIELD: u16 = 38;
const LLC_HEADER: [u8; 3] = [0x42, 0x42, 0x03]; // DSAP, SSAP, control

/// Bytes needed to read everything up to and including the sender port id.
pub const BPDU_MIN_LEN: usize = 43;
/// Bytes needed to also read the four timer fields.
const BPDU_TIMERS_END: usize = 51;
/// Emitted frames carry one byte of zero padding after the timers.
pub const BPDU_FRAME_LEN: usize = 52;

pub const DEFAULT_MESSAGE_AGE: u16 = 1;
pub const DEFAULT_MAX_AGE: u16 = 20;
pub const DEFAULT_HELLO_TIME: u16 = 2;
pub const DEFAULT_FORWARD_DELAY: u16 = 15;

/// A configuration BPDU.
///
/// Field order and widths are fixed; peers read the ids and cost at absolute offsets.
/// The timer fields are carried but never interpreted.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BpduFrame {
    pub source_address: MacAddress,
    pub root_id: u64,
    pub root_path_cost: u32,
    pub sender_bridge_id: u64,
    pub sender_port_id: u16,
    pub message_age: u16,
    pub max_age: u16,
    pub hello_time: u16,
    pub forward_delay: u16,
}

impl BpduFrame {
    /// A BPDU with the default timer constants.
    pub fn hello(
        source_address: MacAddress,
        root_id: u64,
        root_path_cost: u32,
        sender_bridge_id: u64,
        sender_port_id: u16,
    ) -> BpduFrame {
        BpduFrame {
            source_address,
            root_id,
            root_path_cost,
            sender_bridge_id,
            sender_port_id,
            message_age: DEFAULT_MESSAGE_AGE,
            max_age: DEFAULT_MAX_AGE,
            hello_time: DEFAULT_HELLO_TIME,
            forward_delay: DEFAULT_FORWARD_DELAY,
        }
    }

    /// True if frames sent to this address belong to the spanning tree.
    pub fn is_bpdu_address(address: &MacAddress) -> bool {
        *address == crate::mac_bpdu_addr!()
    }
}

impl ByteSerializable for BpduFrame {
    /// Reads the fields at their fixed offsets. Nothing beyond length is validated.
    fn from_bytes(bytes: &[u8]) -> Result<BpduFrame> {
        if bytes.len() < BPDU_MIN_LEN {
            return Err(Error::Truncated {
                kind: "BPDU",
                len: bytes.len(),
                min: BPDU_MIN_LEN,
            });
        }

        let u16_at = |offset: usize| u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        let u32_at = |offset: usize| {
            u32::from_be_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };
        let u64_at = |offset: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[offset..offset + 8]);
            u64::from_be_bytes(word)
        };

        let source_address = [
            bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11],
        ];

        let (message_age, max_age, hello_time, forward_delay) = if bytes.len() >= BPDU_TIMERS_END {
            (u16_at(43), u16_at(45), u16_at(47), u16_at(49))
        } else {
            (
                DEFAULT_MESSAGE_AGE,
                DEFAULT_MAX_AGE,
                DEFAULT_HELLO_TIME,
                DEFAULT_FORWARD_DELAY,
            )
        };

        Ok(BpduFrame {
            source_address,
            root_id: u64_at(21),
            root_path_cost: u32_at(29),
            sender_bridge_id: u64_at(33),
            sender_port_id: u16_at(41),
            message_age,
            max_age,
            hello_time,
            forward_delay,
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BPDU_FRAME_LEN);

        bytes.extend_from_slice(&crate::mac_bpdu_addr!());
        bytes.extend_from_slice(&self.source_address);
        bytes.extend_from_slice(&BPDU_LENGTH_FIELD.to_be_bytes());
        bytes.extend_from_slice(&LLC_HEADER);
        bytes.extend_from_slice(&0u16.to_be_bytes()); // protocol id
        bytes.extend_from_slice(&0u16.to_be_bytes()); // version, type
        bytes.extend_from_slice(&self.root_id.to_be_bytes());
        bytes.extend_from_slice(&self.root_path_cost.to_be_bytes());
        bytes.extend_from_slice(&self.sender_bridge_id.to_be_bytes());
        bytes.extend_from_slice(&self.sender_port_id.to_be_bytes());
        bytes.extend_from_slice(&self.message_age.to_be_bytes());
        bytes.extend_from_slice(&self.max_age.to_be_bytes());
        bytes.extend_from_slice(&self.hello_time.to_be_bytes());
        bytes.extend_from_slice(&self.forward_delay.to_be_bytes());
        bytes.push(0);

        bytes
    }
}
