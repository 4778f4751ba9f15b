use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::{
    config::SwitchConfig,
    error::{Error, Result},
    is_mac_multicast_or_broadcast,
    network::ethernet::{format_mac, vlan::VlanId, ByteSerializable, EthernetFrame, MacAddress},
    tick::Tickable,
};

use super::{
    bpdu::BpduFrame,
    cable::Link,
    stp::{PortState, SpanningTree, StpSnapshot},
};

/// How a port treats VLANs.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VlanMode {
    Access(VlanId), // Untagged frames, bound to one VLAN
    Trunk,          // Tagged frames for any VLAN; takes part in the spanning tree
}

/// A configured switch port. Ids are the port's position on the switch.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SwitchPort {
    pub id: usize,
    pub name: String,
    pub mode: VlanMode,
}

/// What to do with a frame on its way from one port to another.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EgressAction {
    Forward,     // Send unchanged
    Tag(VlanId), // Insert a tag, then send
    Untag,       // Strip the tag, then send
    Drop,
}

/// The per-pair forwarding rule between an ingress and a (different) egress port.
///
/// * `frame_vlan` - The VLAN id carried in the frame's tag, if any.
/// * `egress_state` - Spanning tree state of the egress port; access ports are always `Listening`.
pub fn egress_action(
    ingress: VlanMode,
    frame_vlan: Option<VlanId>,
    egress: VlanMode,
    egress_state: PortState,
) -> EgressAction {
    match (ingress, egress) {
        (VlanMode::Trunk, VlanMode::Trunk) => match egress_state {
            PortState::Listening => EgressAction::Forward,
            PortState::Blocking => EgressAction::Drop,
        },
        (VlanMode::Trunk, VlanMode::Access(vlan)) => {
            if frame_vlan == Some(vlan) {
                EgressAction::Untag
            } else {
                EgressAction::Drop
            }
        }
        (VlanMode::Access(vlan), VlanMode::Trunk) => match egress_state {
            PortState::Listening => EgressAction::Tag(vlan),
            PortState::Blocking => EgressAction::Drop,
        },
        (VlanMode::Access(ingress_vlan), VlanMode::Access(egress_vlan)) => {
            if ingress_vlan == egress_vlan {
                EgressAction::Forward
            } else {
                EgressAction::Drop
            }
        }
    }
}

/// A VLAN-aware layer two switch; learns where addresses live and forwards Ethernet frames accordingly.
///
/// Trunk ports run a simplified spanning tree to keep redundant links from looping.
/// Learned addresses are never aged out.
pub struct Switch<L: Link> {
    ports: Vec<SwitchPort>,
    table: HashMap<MacAddress, usize>, // maps an address to the port it was last seen on
    stp: SpanningTree,
    mac_address: MacAddress,
    link: L,
}

impl<L: Link> Switch<L> {
    /// Creates a switch that starts out as its own root bridge.
    /// * `bridge_id` - Spanning tree identity; lower wins the root election.
    /// * `mac_address` - Source address of BPDUs this switch originates.
    /// * `ports` - Must be listed in id order, starting from 0.
    /// * `link` - Where outgoing frames go.
    pub fn new(
        bridge_id: u64,
        mac_address: MacAddress,
        ports: Vec<SwitchPort>,
        link: L,
    ) -> Result<Switch<L>> {
        if let Some((_, port)) = ports.iter().enumerate().find(|(i, p)| p.id != *i) {
            return Err(Error::UnknownPort(port.id));
        }

        Ok(Switch::assemble(bridge_id, mac_address, ports, link))
    }

    /// Creates a switch from a loaded configuration; port ids follow the configuration's order.
    pub fn from_config(config: &SwitchConfig, mac_address: MacAddress, link: L) -> Switch<L> {
        let ports = config
            .ports
            .iter()
            .enumerate()
            .map(|(id, p)| SwitchPort {
                id,
                name: p.name.clone(),
                mode: p.mode,
            })
            .collect();

        Switch::assemble(config.bridge_id, mac_address, ports, link)
    }

    fn assemble(
        bridge_id: u64,
        mac_address: MacAddress,
        ports: Vec<SwitchPort>,
        link: L,
    ) -> Switch<L> {
        let trunks = ports
            .iter()
            .filter(|p| p.mode == VlanMode::Trunk)
            .map(|p| p.id);

        Switch {
            stp: SpanningTree::new(bridge_id, trunks),
            ports,
            table: HashMap::new(),
            mac_address,
            link,
        }
    }

    pub fn bridge_id(&self) -> u64 {
        self.stp.own_id()
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac_address
    }

    pub fn ports(&self) -> &[SwitchPort] {
        &self.ports
    }

    pub fn interface_name(&self, port: usize) -> Option<&str> {
        self.ports.get(port).map(|p| p.name.as_str())
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn snapshot(&self) -> StpSnapshot {
        self.stp.snapshot()
    }

    pub fn is_root_bridge(&self) -> bool {
        self.stp.is_root()
    }

    /// Spanning tree state of a port. Access ports are always `Listening`.
    pub fn port_state(&self, port: usize) -> PortState {
        self.stp.port_state(port).unwrap_or(PortState::Listening)
    }

    /// Records that `address` was last seen on `port`. The last writer wins.
    pub fn learn(&mut self, address: MacAddress, port: usize) {
        if self.table.insert(address, port) != Some(port) {
            trace!(address = %format_mac(&address), port, "Learned address");
        }
    }

    pub fn lookup(&self, address: &MacAddress) -> Option<usize> {
        self.table.get(address).copied()
    }

    /// Handles raw bytes received on a port.
    ///
    /// Spanning tree frames go to the state machine; everything else is forwarded.
    /// Frames that cannot be decoded are dropped.
    pub fn receive(&mut self, port: usize, bytes: Vec<u8>) {
        let Some(mode) = self.ports.get(port).map(|p| p.mode) else {
            warn!(port, "Frame on unknown port dropped");
            return;
        };

        let frame = match EthernetFrame::from_bytes(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(port, error = %e, "Malformed frame dropped");
                return;
            }
        };

        if BpduFrame::is_bpdu_address(&frame.destination_address()) {
            if mode != VlanMode::Trunk {
                debug!(port, "BPDU on access port dropped");
                return;
            }

            match BpduFrame::from_bytes(frame.as_bytes()) {
                Ok(bpdu) => self.apply_bpdu(port, &bpdu),
                Err(e) => debug!(port, error = %e, "Malformed BPDU dropped"),
            }
            return;
        }

        if let Err(e) = self.forward(&frame, port) {
            debug!(port, error = %e, "Frame dropped");
        }
    }

    /// Learns the source, then forwards the frame to its known port or floods it.
    ///
    /// Nothing happens if the ingress port is blocked.
    pub fn forward(&mut self, frame: &EthernetFrame, ingress: usize) -> Result<()> {
        if ingress >= self.ports.len() {
            return Err(Error::UnknownPort(ingress));
        }

        if self.port_state(ingress) == PortState::Blocking {
            trace!(port = ingress, "Ingress blocked");
            return Ok(());
        }

        let source = frame.source_address();
        if !is_mac_multicast_or_broadcast!(source) {
            self.learn(source, ingress);
        }

        let destination = frame.destination_address();
        if !is_mac_multicast_or_broadcast!(destination) {
            if let Some(egress) = self.lookup(&destination) {
                if egress != ingress {
                    self.send_to(frame, ingress, egress);
                }
                return Ok(());
            }
        }

        // Broadcast, multicast or unknown destination
        for egress in 0..self.ports.len() {
            if egress != ingress {
                self.send_to(frame, ingress, egress);
            }
        }

        Ok(())
    }

    fn send_to(&mut self, frame: &EthernetFrame, ingress: usize, egress: usize) {
        let action = egress_action(
            self.ports[ingress].mode,
            frame.vlan_id(),
            self.ports[egress].mode,
            self.port_state(egress),
        );

        let outgoing = match action {
            EgressAction::Forward => Ok(frame.clone()),
            EgressAction::Tag(vlan) => frame.insert_tag(vlan),
            EgressAction::Untag => frame.strip_tag(),
            EgressAction::Drop => return,
        };

        match outgoing {
            Ok(f) => self.link.send(egress, f.into_bytes()),
            Err(e) => debug!(ingress, egress, error = %e, "Frame not forwarded"),
        }
    }

    /// Runs a received BPDU through the spanning tree and relays it if a better root was adopted.
    pub fn apply_bpdu(&mut self, port: usize, bpdu: &BpduFrame) {
        let Some(relay) = self.stp.apply_bpdu(port, bpdu) else {
            return;
        };

        let bytes = relay.to_bytes();
        let trunks: Vec<usize> = self.stp.trunk_ports().collect();
        for trunk in trunks {
            self.link.send(trunk, bytes.clone());
        }
    }

    /// Sends a BPDU claiming root with cost 0 out of every trunk port. Only the root bridge originates.
    pub fn announce(&mut self) {
        if !self.stp.is_root() {
            return;
        }

        let own_id = self.stp.own_id();
        let trunks: Vec<usize> = self.stp.trunk_ports().collect();
        trace!(bridge_id = own_id, ports = trunks.len(), "Announcing root");

        for trunk in trunks {
            let Ok(port_id) = u16::try_from(trunk) else {
                warn!(port = trunk, "Port id does not fit a BPDU; not announcing on it");
                continue;
            };
            let bpdu = BpduFrame::hello(self.mac_address, own_id, 0, own_id, port_id);
            self.link.send(trunk, bpdu.to_bytes());
        }
    }
}

impl<L: Link> Tickable for Switch<L> {
    fn tick(&mut self) {
        self.announce();
    }
}
