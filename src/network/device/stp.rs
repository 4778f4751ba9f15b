use std::collections::BTreeMap;

use tracing::{debug, info};

use super::bpdu::BpduFrame;

/// Flat cost of every hop toward the root, regardless of link speed.
pub const LINK_COST: u32 = 10;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PortState {
    Blocking,  // Frames are dropped in both directions
    Listening, // Frames are forwarded
}

/// A point-in-time copy of the spanning tree state.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StpSnapshot {
    pub own_id: u64,
    pub root_id: u64,
    pub root_path_cost: u32,
    pub root_port: Option<usize>,
    pub port_states: BTreeMap<usize, PortState>, // trunk ports only
}

impl StpSnapshot {
    pub fn is_root(&self) -> bool {
        self.root_id == self.own_id
    }

    pub fn blocking_ports(&self) -> Vec<usize> {
        self.ports_in(PortState::Blocking)
    }

    pub fn listening_ports(&self) -> Vec<usize> {
        self.ports_in(PortState::Listening)
    }

    fn ports_in(&self, state: PortState) -> Vec<usize> {
        self.port_states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(port, _)| *port)
            .collect()
    }
}

/// Simplified spanning tree state for one bridge.
///
/// Only trunk ports take part. Lower bridge ids win the root election; ties between equal-cost
/// paths are not broken by bridge or port id. A root claim never ages out.
#[derive(Debug)]
pub struct SpanningTree {
    own_id: u64,
    root_id: u64,
    root_path_cost: u32,
    root_port: Option<usize>, // None while this bridge is the root
    ports: BTreeMap<usize, PortState>,
}

impl SpanningTree {
    /// Starts as its own root, so every trunk port is listening.
    pub fn new(own_id: u64, trunk_ports: impl IntoIterator<Item = usize>) -> SpanningTree {
        SpanningTree {
            own_id,
            root_id: own_id,
            root_path_cost: 0,
            root_port: None,
            ports: trunk_ports
                .into_iter()
                .map(|port| (port, PortState::Listening))
                .collect(),
        }
    }

    pub fn own_id(&self) -> u64 {
        self.own_id
    }

    pub fn root_id(&self) -> u64 {
        self.root_id
    }

    pub fn root_path_cost(&self) -> u32 {
        self.root_path_cost
    }

    pub fn root_port(&self) -> Option<usize> {
        self.root_port
    }

    pub fn is_root(&self) -> bool {
        self.root_id == self.own_id
    }

    /// None if the port is not a trunk port.
    pub fn port_state(&self, port: usize) -> Option<PortState> {
        self.ports.get(&port).copied()
    }

    pub fn trunk_ports(&self) -> impl Iterator<Item = usize> + '_ {
        self.ports.keys().copied()
    }

    pub fn snapshot(&self) -> StpSnapshot {
        StpSnapshot {
            own_id: self.own_id,
            root_id: self.root_id,
            root_path_cost: self.root_path_cost,
            root_port: self.root_port,
            port_states: self.ports.clone(),
        }
    }

    /// Processes a BPDU received on a trunk port.
    ///
    /// Returns the BPDU to relay out of every trunk port when a better root was adopted.
    pub fn apply_bpdu(&mut self, port: usize, bpdu: &BpduFrame) -> Option<BpduFrame> {
        if !self.ports.contains_key(&port) {
            debug!(port, "BPDU on a non-trunk port ignored");
            return None;
        }

        let was_root = self.is_root();
        let mut relay = None;

        if bpdu.root_id < self.root_id {
            info!(
                own_id = self.own_id,
                root_id = bpdu.root_id,
                port,
                "Adopting better root"
            );
            self.root_id = bpdu.root_id;
            self.root_path_cost = bpdu.root_path_cost.saturating_add(LINK_COST);
            self.root_port = Some(port);

            // Losing the root role revokes designated status everywhere else
            if was_root {
                for (other, state) in self.ports.iter_mut() {
                    if *other != port {
                        *state = PortState::Blocking;
                    }
                }
            }

            self.set_state(port, PortState::Listening);

            relay = Some(BpduFrame {
                sender_bridge_id: self.own_id,
                root_path_cost: self.root_path_cost,
                ..bpdu.clone()
            });
        } else if bpdu.root_id == self.root_id {
            let offered_cost = bpdu.root_path_cost.saturating_add(LINK_COST);

            if self.root_port == Some(port) && offered_cost < self.root_path_cost {
                debug!(port, cost = offered_cost, "Better path to root");
                self.root_path_cost = offered_cost;
            } else if self.root_port == Some(port) && bpdu.root_path_cost > self.root_path_cost {
                // Cost-only comparison; no bridge or port id tie-break.
                self.set_state(port, PortState::Listening);
            }
        } else if bpdu.sender_bridge_id == self.own_id {
            // The root port stays listening even when it sees our own BPDU
            if self.root_port != Some(port) {
                info!(port, "Own BPDU looped back; blocking port");
                self.set_state(port, PortState::Blocking);
            }
        }

        // A root bridge never blocks
        if self.is_root() {
            for state in self.ports.values_mut() {
                *state = PortState::Listening;
            }
        }

        relay
    }

    fn set_state(&mut self, port: usize, state: PortState) {
        if let Some(current) = self.ports.get_mut(&port) {
            if *current != state {
                debug!(port, ?state, "Port state change");
                *current = state;
            }
        }
    }
}
