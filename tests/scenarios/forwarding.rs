//! Reactive forwarding: classifier and decision engine end to end

use super::fabric::{self, Fabric, ROUTER_MAC, VIRTUAL_IP, VIRTUAL_MAC};
use std::net::Ipv4Addr;
use vrouter::dataplane::{Direction, IgnoreReason, PacketOutcome, REACTIVE_PRIORITY};
use vrouter::platform::ConnectPoint;
use vrouter::protocol::arp::ArpPacket;
use vrouter::protocol::{EtherType, MacAddr};

const KNOWN_HOST_MAC: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
const PEER_MAC: MacAddr = MacAddr([0x5a, 0x00, 0x00, 0x00, 0x00, 0x02]);

/// Packet to a known host arriving at deviceY/2 is steered to deviceX/1
#[test]
fn test_known_host_inbound() {
    let mut fabric = Fabric::configured(&[]);
    fabric.add_host([172, 30, 1, 2], KNOWN_HOST_MAC, ConnectPoint::new("deviceX", 1));

    let (outcome, handled) =
        fabric.send_ipv4([8, 8, 8, 8], [172, 30, 1, 2], ConnectPoint::new("deviceY", 2));

    assert!(matches!(
        outcome,
        PacketOutcome::Installed {
            direction: Direction::Inbound,
            ..
        }
    ));
    assert!(handled);

    let rules: Vec<_> = fabric.router.installed().iter().collect();
    assert_eq!(rules.len(), 1);
    let (_, rule) = rules[0];
    assert_eq!(rule.ingress, ConnectPoint::new("deviceY", 2));
    assert_eq!(rule.egress, ConnectPoint::new("deviceX", 1));
    assert_eq!(rule.treatment.eth_src, Some(VIRTUAL_MAC));
    assert_eq!(rule.treatment.eth_dst, Some(KNOWN_HOST_MAC));
    assert_eq!(rule.selector.eth_type, EtherType::Ipv4);
    assert_eq!(rule.selector.ip_dst.to_string(), "172.30.1.2/32");
    assert_eq!(rule.selector.ip_src, None);
    assert_eq!(rule.priority, REACTIVE_PRIORITY);
}

/// A destination that is a known host and also covered by a route is
/// delivered to the host
#[test]
fn test_inbound_wins_over_route() {
    let mut fabric = Fabric::configured(&[]);
    fabric.add_host([172, 30, 1, 2], KNOWN_HOST_MAC, ConnectPoint::new("deviceX", 1));
    fabric.add_host([10, 0, 0, 2], PEER_MAC, fabric::peer1_point());
    fabric.add_route("172.30.0.0/16", [10, 0, 0, 2]);

    fabric.send_ipv4([8, 8, 8, 8], [172, 30, 1, 2], ConnectPoint::new("deviceY", 2));

    let (_, rule) = fabric.router.installed().iter().next().unwrap();
    assert_eq!(rule.egress, ConnectPoint::new("deviceX", 1));
    assert_eq!(rule.treatment.eth_dst, Some(KNOWN_HOST_MAC));
}

/// Routed destination: rewritten to the router MAC towards the next hop
#[test]
fn test_outbound_via_learned_route() {
    let mut fabric = Fabric::configured(&[]);
    fabric.add_host([10, 0, 1, 2], PEER_MAC, fabric::peer2_point());
    fabric.add_route("172.17.0.0/16", [10, 0, 1, 2]);

    let at = ConnectPoint::new("of:edge", 7);
    let (outcome, handled) = fabric.send_ipv4([172, 30, 1, 2], [172, 17, 9, 9], at.clone());

    assert!(matches!(
        outcome,
        PacketOutcome::Installed {
            direction: Direction::Outbound,
            ..
        }
    ));
    assert!(handled);

    let (_, rule) = fabric.router.installed().iter().next().unwrap();
    assert_eq!(rule.treatment.eth_src, Some(ROUTER_MAC));
    assert_eq!(rule.treatment.eth_dst, Some(PEER_MAC));
    assert_eq!(rule.ingress, at);
    assert_eq!(rule.egress, fabric::peer2_point());
    assert_eq!(
        rule.selector.ip_src.map(|p| p.to_string()),
        Some("172.30.1.2/32".to_string())
    );
    assert_eq!(rule.selector.ip_dst.to_string(), "172.17.9.9/32");
}

/// Neither host nor route: nothing installed, packet left alone
#[test]
fn test_unknown_destination_ignored() {
    let mut fabric = Fabric::configured(&[]);

    let (outcome, handled) =
        fabric.send_ipv4([172, 30, 1, 2], [198, 51, 100, 1], ConnectPoint::new("deviceY", 2));

    assert_eq!(
        outcome,
        PacketOutcome::Ignored(IgnoreReason::NoRoute {
            dst: Ipv4Addr::new(198, 51, 100, 1)
        })
    );
    assert!(!handled);
    assert!(fabric.router.installed().is_empty());
    assert!(fabric.platform.intents.journal().is_empty());
}

/// The next hop is ignored until its MAC is learned, then the flow installs
#[test]
fn test_next_hop_learned_later() {
    let mut fabric = Fabric::configured(&[]);
    fabric.add_route("172.17.0.0/16", [10, 0, 0, 2]);
    let at = ConnectPoint::new("of:edge", 7);

    let (outcome, handled) = fabric.send_ipv4([172, 30, 1, 2], [172, 17, 9, 9], at.clone());
    assert_eq!(
        outcome,
        PacketOutcome::Ignored(IgnoreReason::NextHopUnresolved {
            next_hop: Ipv4Addr::new(10, 0, 0, 2)
        })
    );
    assert!(!handled);

    fabric.add_host([10, 0, 0, 2], PEER_MAC, fabric::peer1_point());
    let (outcome, handled) = fabric.send_ipv4([172, 30, 1, 2], [172, 17, 9, 9], at);
    assert!(matches!(outcome, PacketOutcome::Installed { .. }));
    assert!(handled);
}

/// Frames that are not IPv4 never produce a forwarding decision
#[test]
fn test_non_ipv4_short_circuits() {
    let mut fabric = Fabric::configured(&[]);
    fabric.add_host([172, 30, 1, 2], KNOWN_HOST_MAC, ConnectPoint::new("deviceX", 1));
    let at = ConnectPoint::new("deviceY", 2);

    // ARP for a host, not for the virtual gateway
    let arp = ArpPacket::request(MacAddr([2, 0, 0, 0, 0, 9]), Ipv4Addr::new(172, 30, 1, 9), Ipv4Addr::new(172, 30, 1, 2));
    let mut context = fabric::raw_context(EtherType::Arp as u16, &arp.to_bytes(), at.clone());
    assert_eq!(fabric.router.process(&mut context), PacketOutcome::NotIpv4);
    assert!(!context.is_handled());

    // IPv6 EtherType carrying an IPv4-looking payload
    let ipv4 = fabric::ipv4_context([8, 8, 8, 8], [172, 30, 1, 2], at.clone());
    let payload = &ipv4.inbound().data[14..];
    let mut context = fabric::raw_context(0x86DD, payload, at.clone());
    assert_eq!(fabric.router.process(&mut context), PacketOutcome::NotIpv4);

    // Truncated frame
    let mut context = fabric::raw_context(EtherType::Ipv4 as u16, &[0x45], at);
    assert_eq!(fabric.router.process(&mut context), PacketOutcome::NotIpv4);

    assert!(fabric.router.installed().is_empty());
    assert!(fabric.platform.intents.journal().is_empty());
    assert!(fabric.platform.packets.emitted().is_empty());
}

/// Hosts resolving their gateway get the virtual MAC
#[test]
fn test_virtual_gateway_arp() {
    let mut fabric = Fabric::configured(&[]);
    let at = ConnectPoint::new("deviceY", 2);

    let arp = ArpPacket::request(MacAddr([2, 0, 0, 0, 0, 9]), Ipv4Addr::new(172, 30, 1, 9), VIRTUAL_IP);
    let mut context = fabric::raw_context(EtherType::Arp as u16, &arp.to_bytes(), at.clone());

    assert_eq!(fabric.router.process(&mut context), PacketOutcome::ArpReplied);
    assert!(context.is_handled());

    let emitted = fabric.platform.packets.emitted();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].output, at);
    let reply = ArpPacket::parse(&emitted[0].data[14..]).unwrap();
    assert_eq!(reply.sender_mac, VIRTUAL_MAC);
    assert_eq!(reply.sender_ip, VIRTUAL_IP);
}

/// Reactive rules are dropped with everything else on reconfiguration
#[test]
fn test_reactive_rules_withdrawn_on_reconfiguration() {
    let mut fabric = Fabric::configured(&["10.0.0.2"]);
    fabric.add_host([172, 30, 1, 2], KNOWN_HOST_MAC, ConnectPoint::new("deviceX", 1));
    fabric.send_ipv4([8, 8, 8, 8], [172, 30, 1, 2], ConnectPoint::new("deviceY", 2));
    assert_eq!(fabric.router.installed().len(), 3);

    fabric.configure(&["10.0.0.2"]);
    assert_eq!(fabric.router.installed().len(), 2);
    assert_eq!(fabric.platform.intents.active_count(), 2);

    // Same flow again after the teardown is a fresh submission
    let (outcome, _) = fabric.send_ipv4([8, 8, 8, 8], [172, 30, 1, 2], ConnectPoint::new("deviceY", 2));
    assert!(matches!(outcome, PacketOutcome::Installed { .. }));
}
