use crate::error::{Error, Result};

/// A 12-bit VLAN identifier
pub type VlanId = u16;

/// Tag protocol identifier. Peers on this network tag with 0x8200 rather than the IEEE 0x8100.
pub const VLAN_TPID: u16 = 0x8200;

/// Largest assignable VLAN id (4095 is reserved)
pub const MAX_VLAN_ID: VlanId = 4094;

/// Size of a tag on the wire: 2 bytes TPID + 2 bytes TCI
pub const VLAN_TAG_LEN: usize = 4;

pub const VLAN_ID_MASK: u16 = 0x0FFF;

pub fn validate(vlan_id: VlanId) -> Result<VlanId> {
    if vlan_id > MAX_VLAN_ID {
        return Err(Error::InvalidVlan(vlan_id));
    }
    Ok(vlan_id)
}

/// Encodes a tag. Priority and DEI bits are always emitted as zero.
pub fn encode_tag(vlan_id: VlanId) -> [u8; VLAN_TAG_LEN] {
    let tpid = VLAN_TPID.to_be_bytes();
    let tci = (vlan_id & VLAN_ID_MASK).to_be_bytes();
    [tpid[0], tpid[1], tci[0], tci[1]]
}
