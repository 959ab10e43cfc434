//! Forwarding decision engine
//!
//! Decides where a new flow goes. A destination that is a known host is
//! delivered locally (inbound); otherwise the route service is consulted and
//! the flow is sent to the next hop (outbound). Local delivery is checked
//! first, so a host that is also covered by a route is still delivered
//! directly.

use super::{ClassifiedPacket, SteeringRule, TrafficSelector, TrafficTreatment};
use crate::config::RouterConfig;
use crate::platform::{ConnectPoint, HostService, InterfaceService, RouteService, Services};
use crate::protocol::Ipv4Prefix;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards a host attached to the SDN fabric
    Inbound,
    /// Towards an external next hop
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

/// Why a packet was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Neither a known host nor a route covers the destination
    NoRoute { dst: Ipv4Addr },
    /// The next hop's MAC is not learned yet
    NextHopUnresolved { next_hop: Ipv4Addr },
    /// No interface faces the next hop
    EgressUnresolved { next_hop: Ipv4Addr },
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::NoRoute { dst } => write!(f, "no host or route for {dst}"),
            IgnoreReason::NextHopUnresolved { next_hop } => {
                write!(f, "next hop {next_hop} not resolved")
            }
            IgnoreReason::EgressUnresolved { next_hop } => {
                write!(f, "no interface towards next hop {next_hop}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Steer {
        direction: Direction,
        rule: SteeringRule,
    },
    Ignore(IgnoreReason),
}

pub struct DecisionEngine<'a> {
    hosts: &'a dyn HostService,
    routes: &'a dyn RouteService,
    interfaces: &'a dyn InterfaceService,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(services: &'a Services) -> Self {
        Self {
            hosts: &*services.hosts,
            routes: &*services.routes,
            interfaces: &*services.interfaces,
        }
    }

    pub fn decide(
        &self,
        packet: &ClassifiedPacket,
        config: &RouterConfig,
        received_from: &ConnectPoint,
    ) -> Decision {
        if let Some(host) = self.hosts.hosts_by_ip(packet.dst_ip).into_iter().next() {
            debug!(dst = %packet.dst_ip, mac = %host.mac, location = %host.location, "destination is a known host");
            let rule = SteeringRule::new(
                TrafficSelector::ipv4_dst(Ipv4Prefix::host(packet.dst_ip)),
                TrafficTreatment::rewrite(config.virtual_mac, host.mac),
                received_from.clone(),
                host.location,
            );
            return Decision::Steer {
                direction: Direction::Inbound,
                rule,
            };
        }

        let Some(route) = self.routes.longest_prefix_lookup(packet.dst_ip) else {
            debug!(dst = %packet.dst_ip, "no route");
            return Decision::Ignore(IgnoreReason::NoRoute { dst: packet.dst_ip });
        };
        let next_hop = route.next_hop;

        let Some(next_hop_mac) = self
            .hosts
            .hosts_by_ip(next_hop)
            .into_iter()
            .next()
            .map(|h| h.mac)
        else {
            debug!(dst = %packet.dst_ip, %next_hop, "next hop MAC unknown");
            return Decision::Ignore(IgnoreReason::NextHopUnresolved { next_hop });
        };

        let Some(egress) = self.interfaces.matching_interface(next_hop) else {
            debug!(dst = %packet.dst_ip, %next_hop, "no interface towards next hop");
            return Decision::Ignore(IgnoreReason::EgressUnresolved { next_hop });
        };

        debug!(dst = %packet.dst_ip, prefix = %route.prefix, %next_hop, %next_hop_mac, "routed via next hop");
        let rule = SteeringRule::new(
            TrafficSelector::ipv4_dst(Ipv4Prefix::host(packet.dst_ip))
                .ip_src(Ipv4Prefix::host(packet.src_ip)),
            TrafficTreatment::rewrite(config.router_mac, next_hop_mac),
            received_from.clone(),
            egress.connect_point,
        );
        Decision::Steer {
            direction: Direction::Outbound,
            rule,
        }
    }
}
