//! End-to-end decision scenarios over small multi-switch topologies.

use bytes::Bytes;
use std::sync::Arc;

use vlan_tenancy_common::{
    command::{Action, Command, Match, OutPort, PacketIn, FORWARDING_PRIORITY},
    frame,
    types::{BufferId, Mac, PortNo, SwitchId, VlanId, VlanMatch},
};
use vlan_tenancy_engine::{Branch, Engine, MacLearningTable, Regime, Terminal, VlanDirectory};

const IPV4: u16 = 0x0800;

fn aa() -> Mac {
    "00:00:00:00:00:aa".parse().unwrap()
}

fn bb() -> Mac {
    "00:00:00:00:00:bb".parse().unwrap()
}

fn cc() -> Mac {
    "00:00:00:00:00:cc".parse().unwrap()
}

fn vid(v: u16) -> VlanId {
    VlanId::new(v).unwrap()
}

fn engine(hosts: &[(Mac, u16)], trunks: &[(u64, &[u32])]) -> Engine {
    let directory = VlanDirectory::new(
        hosts.iter().map(|(mac, v)| (*mac, vid(*v))),
        trunks
            .iter()
            .map(|(s, ports)| (SwitchId(*s), ports.iter().copied().map(PortNo))),
    )
    .unwrap();
    Engine::new(Arc::new(directory), Arc::new(MacLearningTable::new()))
}

fn packet_in(switch: u64, port: u32, src: Mac, dst: Mac, tag: Option<u16>) -> PacketIn {
    let data = frame::build(dst, src, tag.map(VlanMatch::tagged_raw), IPV4, b"payload");
    PacketIn::new(SwitchId(switch), PortNo(port), data)
}

/// Apply an action list to a frame the way a switch would, returning the
/// frame leaving on the output port.
fn apply(frame_bytes: &Bytes, actions: &[Action]) -> Bytes {
    let mut current = frame_bytes.clone();
    for action in actions {
        current = match action {
            Action::PushVlan { .. } => frame::push_vlan(&current, VlanMatch::tagged_raw(0)).unwrap(),
            Action::SetVlanVid(tag) => {
                let untagged = frame::pop_vlan(&current).unwrap();
                frame::push_vlan(&untagged, *tag).unwrap()
            }
            Action::PopVlan => frame::pop_vlan(&current).unwrap(),
            Action::Output(_) => current,
        };
    }
    current
}

#[test]
fn access_switch_installs_rule_for_learned_destination() {
    let e = engine(&[(aa(), 10), (bb(), 10)], &[]);
    e.table().learn(SwitchId(1), aa(), PortNo(3));

    // Frames reach a plain access switch already tagged by the trunk switch.
    let v = e.handle_packet_in(&packet_in(1, 5, bb(), aa(), Some(10)));

    assert_eq!(v.branch, Branch::Unicast(Regime::AccessSwitch));
    let flow = v.flow_mod().unwrap();
    assert_eq!(flow.priority, FORWARDING_PRIORITY);
    assert_eq!(
        flow.r#match,
        Match {
            eth_dst: Some(aa()),
            vlan_vid: Some(VlanMatch::tagged(vid(10))),
            ..Match::default()
        }
    );
    assert_eq!(flow.actions, vec![Action::Output(OutPort::Physical(PortNo(3)))]);
}

#[test]
fn untagged_frame_on_access_switch_is_flooded() {
    let e = engine(&[(aa(), 10), (bb(), 10)], &[]);
    e.table().learn(SwitchId(1), aa(), PortNo(3));

    let v = e.handle_packet_in(&packet_in(1, 5, bb(), aa(), None));
    assert_eq!(v.branch, Branch::FloodAccessSwitch);
    assert_eq!(v.terminal(), Terminal::OneShotForwarded);
    assert_eq!(v.actions(), &[Action::Output(OutPort::Flood)]);
}

#[test]
fn trunk_ingress_pops_tag_for_learned_destination() {
    let e = engine(&[(aa(), 10), (bb(), 10)], &[(1, &[1])]);
    e.table().learn(SwitchId(1), aa(), PortNo(2));

    let v = e.handle_packet_in(&packet_in(1, 1, bb(), aa(), Some(10)));

    assert_eq!(v.branch, Branch::Unicast(Regime::TrunkIngress));
    let flow = v.flow_mod().unwrap();
    assert_eq!(flow.priority, 1);
    assert_eq!(
        flow.r#match,
        Match {
            vlan_vid: Some(VlanMatch::tagged(vid(10))),
            eth_dst: Some(aa()),
            ..Match::default()
        }
    );
    assert!(flow.r#match.vlan_vid.unwrap().is_present());
    assert_eq!(
        flow.actions,
        vec![Action::PopVlan, Action::Output(OutPort::Physical(PortNo(2)))]
    );
}

#[test]
fn access_port_floods_tagged_for_unlearned_destination() {
    let e = engine(&[(aa(), 10), (bb(), 10)], &[(1, &[1])]);

    let v = e.handle_packet_in(&packet_in(1, 4, bb(), aa(), None));

    assert_eq!(v.branch, Branch::Flood(Regime::TrunkAccess));
    assert_eq!(v.terminal(), Terminal::OneShotForwarded);
    assert!(v.flow_mod().is_none());
    assert_eq!(
        v.actions(),
        &[
            Action::push_vlan(),
            Action::SetVlanVid(VlanMatch::tagged(vid(10))),
            Action::Output(OutPort::Flood),
        ]
    );
    // The source was learned even though nothing was installed.
    assert_eq!(e.table().lookup(SwitchId(1), &bb()), Some(PortNo(4)));
}

#[test]
fn access_port_rule_matches_ingress_port_and_destination() {
    let e = engine(&[(aa(), 10), (bb(), 10)], &[(1, &[1])]);
    e.table().learn(SwitchId(1), aa(), PortNo(1));

    let v = e.handle_packet_in(&packet_in(1, 4, bb(), aa(), None));

    let flow = v.flow_mod().unwrap();
    assert_eq!(
        flow.r#match,
        Match {
            in_port: Some(PortNo(4)),
            eth_dst: Some(aa()),
            ..Match::default()
        }
    );
    assert_eq!(
        flow.actions,
        vec![
            Action::push_vlan(),
            Action::SetVlanVid(VlanMatch::tagged(vid(10))),
            Action::Output(OutPort::Physical(PortNo(1))),
        ]
    );
}

#[test]
fn discovery_frames_emit_nothing_anywhere() {
    let e = engine(&[(aa(), 10)], &[(1, &[1])]);
    for (switch, port) in [(1, 1), (1, 4), (2, 1)] {
        let lldp = frame::build(Mac::BROADCAST, aa(), None, 0x88cc, b"");
        let v = e.handle_packet_in(&PacketIn::new(SwitchId(switch), PortNo(port), lldp));
        assert_eq!(v.branch, Branch::Control);
        assert!(v.commands.is_empty());
    }
    assert!(e.table().is_empty());
}

#[test]
fn cross_tenant_frames_are_always_dropped() {
    // Every regime, learned or not, buffered or not.
    let cases: &[(&[(u64, &[u32])], u32, Option<u16>)] = &[
        (&[], 5, Some(10)),
        (&[(1, &[1])], 1, Some(20)),
        (&[(1, &[1])], 4, None),
        (&[(1, &[1])], 4, Some(10)),
    ];

    for (trunks, port, tag) in cases {
        for learned in [false, true] {
            for buffered in [false, true] {
                let e = engine(&[(aa(), 10), (bb(), 20)], trunks);
                if learned {
                    e.table().learn(SwitchId(1), aa(), PortNo(9));
                }
                let mut ev = packet_in(1, *port, bb(), aa(), *tag);
                if buffered {
                    ev = ev.with_buffer(BufferId(1));
                }

                let v = e.handle_packet_in(&ev);
                assert_eq!(v.branch, Branch::TenantMismatch, "{trunks:?} port {port}");
                assert!(v.commands.iter().all(|c| c.actions().is_empty()));
                assert!(v.flow_mod().is_none());
            }
        }
    }
}

#[test]
fn same_tenant_learned_destination_is_never_dropped() {
    let cases: &[(&[(u64, &[u32])], u32, Option<u16>)] = &[
        (&[], 5, Some(10)),
        (&[], 5, None),
        (&[(1, &[1])], 1, Some(10)),
        (&[(1, &[1])], 1, None),
        (&[(1, &[1])], 4, None),
        (&[(1, &[1])], 4, Some(10)),
    ];

    for (trunks, port, tag) in cases {
        let e = engine(&[(aa(), 10), (bb(), 10)], trunks);
        e.table().learn(SwitchId(1), aa(), PortNo(7));
        let v = e.handle_packet_in(&packet_in(1, *port, bb(), aa(), *tag));
        assert!(!v.actions().is_empty(), "{trunks:?} port {port} tag {tag:?}");
        assert_ne!(v.terminal(), Terminal::Discarded);
    }
}

#[test]
fn unknown_hosts_are_isolated_from_everyone() {
    let e = engine(&[(aa(), 10)], &[(1, &[1])]);
    e.table().learn(SwitchId(1), aa(), PortNo(2));

    // Tagged frame from a host with no tenant VLAN.
    let v = e.handle_packet_in(&packet_in(1, 1, cc(), aa(), Some(10)));
    assert_eq!(v.branch, Branch::TenantMismatch);

    // Neither side assigned.
    let v = e.handle_packet_in(&packet_in(1, 1, cc(), bb(), Some(10)));
    assert_eq!(v.branch, Branch::TenantMismatch);
    assert!(v.actions().is_empty());
}

#[test]
fn trunk_encapsulation_round_trips() {
    // aa on s1 port 3, bb on s2 port 2; s1 and s2 joined by trunk port 1.
    let e = engine(&[(aa(), 30), (bb(), 30)], &[(1, &[1]), (2, &[1])]);
    e.table().learn(SwitchId(1), bb(), PortNo(1));
    e.table().learn(SwitchId(2), bb(), PortNo(2));

    let egress = packet_in(1, 3, aa(), bb(), None);
    let original = egress.data.clone();
    let v1 = e.handle_packet_in(&egress);
    assert_eq!(v1.branch, Branch::Unicast(Regime::TrunkAccess));
    let on_trunk = apply(&original, v1.actions());
    assert_eq!(on_trunk.len(), original.len() + frame::VLAN_TAG_LEN);

    let ingress = PacketIn::new(SwitchId(2), PortNo(1), on_trunk);
    let v2 = e.handle_packet_in(&ingress);
    assert_eq!(v2.branch, Branch::Unicast(Regime::TrunkIngress));
    assert_eq!(v2.actions()[0], Action::PopVlan);
    assert_eq!(apply(&ingress.data, v2.actions()), original);
}

#[test]
fn unbuffered_unicast_forwards_the_payload_once() {
    let e = engine(&[(aa(), 10), (bb(), 10)], &[(1, &[1])]);
    e.table().learn(SwitchId(1), aa(), PortNo(2));
    let ev = packet_in(1, 1, bb(), aa(), Some(10));

    let v = e.handle_packet_in(&ev);
    assert_eq!(v.commands.len(), 2);
    match &v.commands[1] {
        Command::PacketOut(out) => {
            assert_eq!(out.in_port, PortNo(1));
            assert_eq!(out.data.as_ref(), Some(&ev.data));
            assert!(out.buffer_id.is_none());
        }
        other => panic!("expected a packet-out, got {other:?}"),
    }

    let v = e.handle_packet_in(&ev.clone().with_buffer(BufferId(5)));
    assert_eq!(v.commands.len(), 1);
    assert_eq!(v.flow_mod().unwrap().buffer_id, Some(BufferId(5)));
}

#[test]
fn truncated_capture_is_still_decided() {
    let e = engine(&[(aa(), 10), (bb(), 10)], &[(1, &[1])]);
    let ev = packet_in(1, 4, bb(), aa(), None).with_total_len(1500);

    let v = e.handle_packet_in(&ev);
    assert_eq!(v.branch, Branch::Flood(Regime::TrunkAccess));
    assert!(v.frame.unwrap().truncated);
}

#[test]
fn decision_commands_serialize() {
    let e = engine(&[(aa(), 10), (bb(), 10)], &[(1, &[1])]);
    e.table().learn(SwitchId(1), aa(), PortNo(2));
    let v = e.handle_packet_in(&packet_in(1, 1, bb(), aa(), Some(10)));

    let json = serde_json::to_value(&v.commands[0]).unwrap();
    assert_eq!(json["type"], "flow_mod");
    assert_eq!(json["match"]["eth_dst"], "00:00:00:00:00:aa");
    assert_eq!(json["match"]["vlan_vid"], 0x100a);
    assert_eq!(json["actions"][0], "pop_vlan");
}
