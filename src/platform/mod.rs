//! Controller platform services
//!
//! The router application never owns topology, host, route or intent state.
//! It consumes those through the narrow traits below, injected as a
//! [`Services`] bundle. `memory` provides table-backed implementations.

pub mod memory;
mod types;

pub use types::*;

use crate::dataplane::SteeringRule;
use crate::protocol::EtherType;
use crate::Result;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Host location lookups (IP to MAC + attachment point)
pub trait HostService: Send + Sync {
    /// Hosts currently bound to `ip`, zero or more
    fn hosts_by_ip(&self, ip: Ipv4Addr) -> Vec<Host>;
}

/// Longest-prefix route lookups
pub trait RouteService: Send + Sync {
    fn longest_prefix_lookup(&self, ip: Ipv4Addr) -> Option<ResolvedRoute>;
}

/// Interface configuration lookups
pub trait InterfaceService: Send + Sync {
    /// Interface whose subnet contains `ip`
    fn matching_interface(&self, ip: Ipv4Addr) -> Option<Interface>;

    fn interfaces_by_port(&self, point: &ConnectPoint) -> Vec<Interface>;
}

/// Intent (steering rule) submission and withdrawal
pub trait IntentService: Send + Sync {
    fn submit(&self, rule: &SteeringRule) -> Result<IntentKey>;

    /// Withdrawing an unknown or already withdrawn key must succeed as a no-op.
    fn withdraw(&self, key: IntentKey) -> Result<()>;
}

/// Packet-in subscription and packet-out
pub trait PacketService: Send + Sync {
    fn request_packets(&self, ether_type: EtherType);

    fn cancel_packets(&self, ether_type: EtherType);

    fn emit(&self, packet: OutboundPacket) -> Result<()>;
}

/// Handles to every platform service the application uses
#[derive(Clone)]
pub struct Services {
    pub hosts: Arc<dyn HostService>,
    pub routes: Arc<dyn RouteService>,
    pub interfaces: Arc<dyn InterfaceService>,
    pub intents: Arc<dyn IntentService>,
    pub packets: Arc<dyn PacketService>,
}
