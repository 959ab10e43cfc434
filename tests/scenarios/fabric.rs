//! Test fabric: an in-memory platform with two peering interfaces and a
//! router wired to it.
//!
//! ```text
//!   hosts (172.30.x.x) --- of:edge --- /3 peer1 10.0.0.1/24 --- 10.0.0.2
//!                              |
//!                              +------ /4 peer2 10.0.1.1/24 --- 10.0.1.2
//!                              |
//!                          of:router/1 (eBGP speaker)
//! ```

use std::net::Ipv4Addr;
use vrouter::config::{NetworkConfigEvent, RouterConfigDoc};
use vrouter::dataplane::{ConfigOutcome, PacketOutcome, VRouter};
use vrouter::platform::memory::MemoryPlatform;
use vrouter::platform::{ConnectPoint, Host, InboundPacket, Interface, PacketContext, ResolvedRoute};
use vrouter::protocol::ethernet::FrameBuilder;
use vrouter::protocol::ipv4::Ipv4Builder;
use vrouter::protocol::{EtherType, MacAddr};

pub const ROUTER_MAC: MacAddr = MacAddr([0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
pub const VIRTUAL_MAC: MacAddr = MacAddr([0x00, 0x00, 0x00, 0x00, 0x00, 0x02]);
pub const VIRTUAL_IP: Ipv4Addr = Ipv4Addr::new(172, 30, 1, 254);
pub const HOST_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x10]);

pub fn router_point() -> ConnectPoint {
    ConnectPoint::new("of:router", 1)
}

pub fn peer1_point() -> ConnectPoint {
    ConnectPoint::new("of:edge", 3)
}

pub fn peer2_point() -> ConnectPoint {
    ConnectPoint::new("of:edge", 4)
}

pub fn router_doc(peers: &[&str]) -> RouterConfigDoc {
    RouterConfigDoc {
        router_point: Some(router_point().to_string()),
        router_mac: Some(ROUTER_MAC.to_string()),
        virtual_ip: Some(VIRTUAL_IP.to_string()),
        virtual_mac: Some(VIRTUAL_MAC.to_string()),
        peers: peers.iter().map(|p| p.to_string()).collect(),
    }
}

pub struct Fabric {
    pub platform: MemoryPlatform,
    pub router: VRouter,
}

impl Fabric {
    /// Active router without configuration
    pub fn new() -> Self {
        let platform = MemoryPlatform::new();
        platform.interfaces.add(Interface {
            name: "peer1".into(),
            connect_point: peer1_point(),
            addresses: vec!["10.0.0.1/24".parse().unwrap()],
            mac: None,
        });
        platform.interfaces.add(Interface {
            name: "peer2".into(),
            connect_point: peer2_point(),
            addresses: vec!["10.0.1.1/24".parse().unwrap()],
            mac: None,
        });

        let mut router = VRouter::new(platform.services());
        router.activate();
        Self { platform, router }
    }

    /// Active router configured with `peers`
    pub fn configured(peers: &[&str]) -> Self {
        let mut fabric = Self::new();
        let outcome = fabric.configure(peers);
        assert!(
            matches!(outcome, ConfigOutcome::Applied { .. }),
            "configuration should apply, got {outcome:?}"
        );
        fabric
    }

    pub fn configure(&mut self, peers: &[&str]) -> ConfigOutcome {
        self.router
            .on_config_event(&NetworkConfigEvent::updated(router_doc(peers)))
    }

    pub fn add_host(&self, ip: [u8; 4], mac: MacAddr, location: ConnectPoint) {
        self.platform.hosts.insert(Host {
            ip: Ipv4Addr::from(ip),
            mac,
            location,
        });
    }

    pub fn add_route(&self, prefix: &str, next_hop: [u8; 4]) {
        self.platform.routes.add(ResolvedRoute {
            prefix: prefix.parse().unwrap(),
            next_hop: Ipv4Addr::from(next_hop),
        });
    }

    /// Deliver one IPv4 packet; returns the outcome and whether it was
    /// marked handled
    pub fn send_ipv4(&mut self, src: [u8; 4], dst: [u8; 4], at: ConnectPoint) -> (PacketOutcome, bool) {
        let mut context = ipv4_context(src, dst, at);
        let outcome = self.router.process(&mut context);
        (outcome, context.is_handled())
    }
}

pub fn ipv4_context(src: [u8; 4], dst: [u8; 4], at: ConnectPoint) -> PacketContext {
    let packet = Ipv4Builder::new()
        .src_addr(Ipv4Addr::from(src))
        .dst_addr(Ipv4Addr::from(dst))
        .protocol(6)
        .build();
    raw_context(EtherType::Ipv4 as u16, &packet, at)
}

pub fn raw_context(ethertype: u16, payload: &[u8], at: ConnectPoint) -> PacketContext {
    let data = FrameBuilder::new()
        .dst_mac(VIRTUAL_MAC)
        .src_mac(HOST_MAC)
        .ethertype(ethertype)
        .payload(payload)
        .build();
    PacketContext::new(InboundPacket {
        received_from: at,
        data,
    })
}
