#![allow(non_snake_case)]

use rand::Rng;

use crate::network::device::bpdu::BpduFrame;
use crate::network::device::cable::Delivery;
use crate::network::device::stp::PortState;
use crate::network::device::switch::{egress_action, EgressAction, Switch, SwitchPort, VlanMode};
use crate::network::ethernet::{ByteSerializable, EthernetFrame, MacAddress};
use crate::tick::Tickable;
use crate::{mac_addr, mac_broadcast_addr};

const ACCESS_10: VlanMode = VlanMode::Access(10);
const ACCESS_20: VlanMode = VlanMode::Access(20);
const TRUNK: VlanMode = VlanMode::Trunk;

fn switch(modes: &[VlanMode]) -> Switch<Vec<Delivery>> {
    let ports = modes
        .iter()
        .enumerate()
        .map(|(id, mode)| SwitchPort {
            id,
            name: format!("eth{}", id),
            mode: *mode,
        })
        .collect();

    Switch::new(5, mac_addr!(0x50), ports, vec![]).unwrap()
}

/// Ports: 0 access 10, 1 access 10, 2 access 20, 3 trunk (root port), 4 trunk (blocking)
fn mixed_switch() -> Switch<Vec<Delivery>> {
    let mut switch = switch(&[ACCESS_10, ACCESS_10, ACCESS_20, TRUNK, TRUNK]);
    switch.apply_bpdu(3, &BpduFrame::hello(mac_addr!(1), 1, 0, 1, 0));
    switch.link_mut().clear();
    switch
}

fn frame(destination: MacAddress, source: MacAddress) -> EthernetFrame {
    EthernetFrame::new(destination, source, 0x0800, &[1; 46])
}

fn sent(switch: &mut Switch<Vec<Delivery>>) -> Vec<Delivery> {
    std::mem::take(switch.link_mut())
}

#[test]
fn EgressAction_EveryModeAndStateCombination_MatchesTable() {
    use EgressAction::*;
    use PortState::*;

    let cases = [
        (TRUNK, Some(10), TRUNK, Listening, Forward),
        (TRUNK, Some(10), TRUNK, Blocking, Drop),
        (TRUNK, Some(10), ACCESS_10, Listening, Untag),
        (TRUNK, Some(20), ACCESS_10, Listening, Drop),
        (TRUNK, None, ACCESS_10, Listening, Drop),
        (ACCESS_10, None, TRUNK, Listening, Tag(10)),
        (ACCESS_10, None, TRUNK, Blocking, Drop),
        (ACCESS_10, None, ACCESS_10, Listening, Forward),
        (ACCESS_10, None, ACCESS_20, Listening, Drop),
    ];

    for (ingress, frame_vlan, egress, state, expected) in cases {
        assert_eq!(
            egress_action(ingress, frame_vlan, egress, state),
            expected,
            "{:?} ({:?}) -> {:?} {:?}",
            ingress,
            frame_vlan,
            egress,
            state
        );
    }
}

#[test]
fn New_PortIdsOutOfOrder_IsRefused() {
    // Arrange
    let ports = vec![SwitchPort {
        id: 3,
        name: "eth3".to_string(),
        mode: TRUNK,
    }];

    // Act
    let result = Switch::new(1, mac_addr!(1), ports, Vec::<Delivery>::new());

    // Assert
    assert!(result.is_err());
}

#[test]
fn Receive_AccessBroadcast_ReachesSameVlanAndListeningTrunksOnly() {
    // Arrange
    let mut switch = mixed_switch();
    let f = frame(mac_broadcast_addr!(), mac_addr!(0xA));

    // Act
    switch.receive(0, f.to_bytes());

    // Assert
    let sent = sent(&mut switch);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], (1, f.to_bytes()));
    assert_eq!(sent[1].0, 3);
    let tagged = EthernetFrame::from_bytes(&sent[1].1).unwrap();
    assert_eq!(tagged.vlan_id(), Some(10));
    assert_eq!(tagged.strip_tag().unwrap(), f);
}

#[test]
fn Receive_TrunkBroadcast_UntagsTowardMatchingAccessPorts() {
    // Arrange
    let mut switch = mixed_switch();
    let f = frame(mac_broadcast_addr!(), mac_addr!(0xA));
    let tagged = f.insert_tag(10).unwrap();

    // Act
    switch.receive(3, tagged.to_bytes());

    // Assert
    let sent = sent(&mut switch);
    assert_eq!(sent, vec![(0, f.to_bytes()), (1, f.to_bytes())]);
}

#[test]
fn Receive_TrunkToListeningTrunk_ForwardsUnchanged() {
    // Arrange
    let mut switch = switch(&[TRUNK, TRUNK, ACCESS_20]);
    let mut bytes = frame(mac_broadcast_addr!(), mac_addr!(0xA))
        .insert_tag(10)
        .unwrap()
        .to_bytes();
    bytes[14] |= 0xE0; // priority bits must survive untouched

    // Act
    switch.receive(0, bytes.clone());

    // Assert
    assert_eq!(sent(&mut switch), vec![(1, bytes)]);
}

#[test]
fn Receive_OnBlockingTrunk_DropsWithoutLearning() {
    // Arrange
    let mut switch = mixed_switch();
    let f = frame(mac_broadcast_addr!(), mac_addr!(0xB));

    // Act
    switch.receive(4, f.insert_tag(10).unwrap().to_bytes());

    // Assert
    assert!(sent(&mut switch).is_empty());
    assert_eq!(switch.lookup(&mac_addr!(0xB)), None);
}

#[test]
fn Receive_KnownUnicast_ForwardsOnlyToLearnedPort() {
    // Arrange
    let mut switch = mixed_switch();
    switch.receive(0, frame(mac_addr!(0xB), mac_addr!(0xA)).to_bytes()); // flood, learn A on 0
    sent(&mut switch);

    // Act
    let reply = frame(mac_addr!(0xA), mac_addr!(0xB));
    switch.receive(1, reply.to_bytes());

    // Assert
    assert_eq!(sent(&mut switch), vec![(0, reply.to_bytes())]);
    assert_eq!(switch.lookup(&mac_addr!(0xB)), Some(1));
}

#[test]
fn Receive_KnownUnicastAcrossVlans_IsDropped() {
    // Arrange
    let mut switch = mixed_switch();
    switch.receive(2, frame(mac_broadcast_addr!(), mac_addr!(0xC)).to_bytes()); // C lives on VLAN 20
    sent(&mut switch);

    // Act
    switch.receive(0, frame(mac_addr!(0xC), mac_addr!(0xA)).to_bytes());

    // Assert
    assert!(sent(&mut switch).is_empty());
}

#[test]
fn Receive_KnownUnicastOnIngressPort_IsDropped() {
    // Arrange
    let mut switch = mixed_switch();
    switch.receive(0, frame(mac_broadcast_addr!(), mac_addr!(0xA)).to_bytes());
    sent(&mut switch);

    // Act
    switch.receive(0, frame(mac_addr!(0xA), mac_addr!(0xD)).to_bytes());

    // Assert
    assert!(sent(&mut switch).is_empty());
}

#[test]
fn Receive_UnknownUnicast_Floods() {
    // Arrange
    let mut switch = mixed_switch();
    let f = frame(mac_addr!(0xE), mac_addr!(0xA));

    // Act
    switch.receive(1, f.to_bytes());

    // Assert
    let ports: Vec<usize> = sent(&mut switch).into_iter().map(|(p, _)| p).collect();
    assert_eq!(ports, vec![0, 3]);
}

#[test]
fn Receive_MulticastDestination_Floods() {
    // Arrange
    let mut switch = switch(&[ACCESS_10, ACCESS_10, ACCESS_10]);
    let multicast = [0x01, 0x00, 0x5E, 0x00, 0x00, 0x01];
    switch.receive(2, frame(mac_addr!(0xA), multicast).to_bytes());
    sent(&mut switch);

    // Act
    switch.receive(0, frame(multicast, mac_addr!(0xB)).to_bytes());

    // Assert
    let ports: Vec<usize> = sent(&mut switch).into_iter().map(|(p, _)| p).collect();
    assert_eq!(ports, vec![1, 2]);
}

#[test]
fn Receive_MulticastSource_IsNotLearned() {
    // Arrange
    let mut switch = switch(&[ACCESS_10, ACCESS_10]);
    let multicast = [0x01, 0x00, 0x5E, 0x00, 0x00, 0x01];

    // Act
    switch.receive(0, frame(mac_broadcast_addr!(), multicast).to_bytes());

    // Assert
    assert_eq!(switch.lookup(&multicast), None);
    assert_eq!(sent(&mut switch).len(), 1);
}

#[test]
fn Receive_TaggedFrameOnAccessPort_IsNotTaggedTwice() {
    // Arrange
    let mut switch = mixed_switch();
    let tagged = frame(mac_broadcast_addr!(), mac_addr!(0xA))
        .insert_tag(30)
        .unwrap();

    // Act
    switch.receive(0, tagged.to_bytes());

    // Assert
    assert_eq!(sent(&mut switch), vec![(1, tagged.to_bytes())]);
}

#[test]
fn Receive_RuntFrame_IsDropped() {
    // Arrange
    let mut switch = mixed_switch();

    // Act
    switch.receive(0, vec![0xFF; 10]);

    // Assert
    assert!(sent(&mut switch).is_empty());
}

#[test]
fn Receive_UnknownPort_IsDropped() {
    // Arrange
    let mut switch = mixed_switch();

    // Act
    switch.receive(9, frame(mac_broadcast_addr!(), mac_addr!(0xA)).to_bytes());

    // Assert
    assert!(sent(&mut switch).is_empty());
    assert_eq!(switch.lookup(&mac_addr!(0xA)), None);
}

#[test]
fn Receive_SameSourceFromAnotherPort_OverwritesLearnedPort() {
    let mut rng = rand::thread_rng();
    let mut switch = switch(&[ACCESS_10, ACCESS_10, ACCESS_10, TRUNK]);

    for _ in 0..100 {
        // Arrange
        let source = mac_addr!(rng.gen::<u64>());
        let first = rng.gen_range(0..4);
        let second = (first + rng.gen_range(1..4)) % 4;
        let untagged = frame(mac_broadcast_addr!(), source);
        let bytes_for = |port: usize| {
            if port == 3 {
                untagged.insert_tag(10).unwrap().to_bytes()
            } else {
                untagged.to_bytes()
            }
        };

        // Act
        switch.receive(first, bytes_for(first));
        let learned_first = switch.lookup(&source);
        switch.receive(second, bytes_for(second));
        let learned_second = switch.lookup(&source);

        // Assert
        assert_eq!(learned_first, Some(first));
        assert_eq!(learned_second, Some(second));
    }
}

#[test]
fn Receive_BpduOnTrunk_UpdatesTreeAndRelaysOnEveryTrunk() {
    // Arrange
    let mut switch = switch(&[ACCESS_10, TRUNK, TRUNK]);
    let bpdu = BpduFrame::hello(mac_addr!(1), 1, 0, 1, 0);

    // Act
    switch.receive(1, bpdu.to_bytes());

    // Assert
    let snapshot = switch.snapshot();
    assert_eq!(snapshot.root_id, 1);
    assert_eq!(snapshot.root_port, Some(1));
    assert_eq!(switch.port_state(2), PortState::Blocking);

    let sent = sent(&mut switch);
    let ports: Vec<usize> = sent.iter().map(|(p, _)| *p).collect();
    assert_eq!(ports, vec![1, 2]);
    let relay = BpduFrame::from_bytes(&sent[0].1).unwrap();
    assert_eq!(relay.sender_bridge_id, 5);
    assert_eq!(relay.root_path_cost, 10);
    assert_eq!(switch.lookup(&mac_addr!(1)), None);
}

#[test]
fn Receive_BpduOnAccessPort_IsDropped() {
    // Arrange
    let mut switch = switch(&[ACCESS_10, TRUNK]);
    let bpdu = BpduFrame::hello(mac_addr!(1), 1, 0, 1, 0);

    // Act
    switch.receive(0, bpdu.to_bytes());

    // Assert
    assert!(switch.is_root_bridge());
    assert!(sent(&mut switch).is_empty());
}

#[test]
fn Tick_RootBridge_AnnouncesOnEveryTrunk() {
    // Arrange
    let mut switch = switch(&[TRUNK, ACCESS_10, TRUNK]);

    // Act
    switch.tick();

    // Assert
    let sent = sent(&mut switch);
    assert_eq!(sent.len(), 2);
    for (expected_port, (port, bytes)) in [0, 2].into_iter().zip(sent) {
        let bpdu = BpduFrame::from_bytes(&bytes).unwrap();
        assert_eq!(port, expected_port);
        assert_eq!(bpdu.root_id, 5);
        assert_eq!(bpdu.root_path_cost, 0);
        assert_eq!(bpdu.sender_bridge_id, 5);
        assert_eq!(bpdu.sender_port_id as usize, expected_port);
        assert_eq!(bpdu.source_address, mac_addr!(0x50));
    }
}

#[test]
fn Tick_NonRootBridge_StaysQuiet() {
    // Arrange
    let mut switch = mixed_switch();

    // Act
    switch.tick();

    // Assert
    assert!(sent(&mut switch).is_empty());
}

#[test]
fn Switch_InterfaceName_KnownPort_ReturnsConfiguredName() {
    // Arrange
    let switch = switch(&[ACCESS_10, TRUNK]);

    // Act
    let name = switch.interface_name(1);

    // Assert
    assert_eq!(name, Some("eth1"));
}

#[test]
fn Switch_InterfaceName_OutOfRangePort_ReturnsNone() {
    // Arrange
    let switch = switch(&[ACCESS_10, TRUNK]);

    // Act
    let name = switch.interface_name(2);

    // Assert
    assert_eq!(name, None);
}

#[test]
fn Switch_MacAddress_IsSourceOfAnnouncements() {
    // Arrange
    let mut switch = switch(&[TRUNK]);

    // Act
    switch.tick();

    // Assert
    let (_, bytes) = sent(&mut switch).remove(0);
    let bpdu = BpduFrame::from_bytes(&bytes).unwrap();
    assert_eq!(switch.mac_address(), mac_addr!(0x50));
    assert_eq!(bpdu.source_address, switch.mac_address());
}
