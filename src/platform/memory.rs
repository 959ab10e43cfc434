//! Table-backed platform services
//!
//! Each table is internally locked so it can be shared behind `Arc` and
//! still be updated while the application runs (a next hop being learned,
//! a route appearing). The CLI builds these from the settings file; tests
//! use them as deterministic fakes.

use super::{
    ConnectPoint, Host, HostService, IntentKey, IntentService, Interface, InterfaceService,
    OutboundPacket, PacketService, ResolvedRoute, RouteService, Services,
};
use crate::config::Settings;
use crate::dataplane::SteeringRule;
use crate::protocol::EtherType;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, RwLock};

/// IP to host bindings
#[derive(Debug, Default)]
pub struct HostTable {
    entries: RwLock<HashMap<Ipv4Addr, Vec<Host>>>,
}

impl HostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a host; a host with the same MAC is replaced
    pub fn insert(&self, host: Host) {
        let mut entries = self.entries.write().unwrap();
        let hosts = entries.entry(host.ip).or_default();
        hosts.retain(|h| h.mac != host.mac);
        hosts.push(host);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HostService for HostTable {
    fn hosts_by_ip(&self, ip: Ipv4Addr) -> Vec<Host> {
        self.entries
            .read()
            .unwrap()
            .get(&ip)
            .cloned()
            .unwrap_or_default()
    }
}

/// Routing table using longest prefix match
#[derive(Debug, Default)]
pub struct RouteTable {
    // Kept sorted by prefix length, longest first
    routes: RwLock<Vec<ResolvedRoute>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route, replacing any route for the same prefix
    pub fn add(&self, route: ResolvedRoute) {
        let mut routes = self.routes.write().unwrap();
        routes.retain(|r| r.prefix != route.prefix);
        routes.push(route);
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
    }

    pub fn len(&self) -> usize {
        self.routes.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteService for RouteTable {
    fn longest_prefix_lookup(&self, ip: Ipv4Addr) -> Option<ResolvedRoute> {
        self.routes
            .read()
            .unwrap()
            .iter()
            .find(|r| r.prefix.contains(ip))
            .cloned()
    }
}

/// Configured L3 interfaces, in configuration order
#[derive(Debug, Default)]
pub struct InterfaceTable {
    interfaces: RwLock<Vec<Interface>>,
}

impl InterfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interface, replacing one with the same name
    pub fn add(&self, interface: Interface) {
        let mut interfaces = self.interfaces.write().unwrap();
        interfaces.retain(|i| i.name != interface.name);
        interfaces.push(interface);
    }

    pub fn len(&self) -> usize {
        self.interfaces.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InterfaceService for InterfaceTable {
    fn matching_interface(&self, ip: Ipv4Addr) -> Option<Interface> {
        self.interfaces
            .read()
            .unwrap()
            .iter()
            .find(|i| i.covers(ip))
            .cloned()
    }

    fn interfaces_by_port(&self, point: &ConnectPoint) -> Vec<Interface> {
        self.interfaces
            .read()
            .unwrap()
            .iter()
            .filter(|i| &i.connect_point == point)
            .cloned()
            .collect()
    }
}

/// Operation recorded by [`IntentStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOp {
    Submit(IntentKey),
    Withdraw(IntentKey),
}

#[derive(Debug, Default)]
struct IntentStoreInner {
    next_key: u64,
    active: BTreeMap<IntentKey, SteeringRule>,
    journal: Vec<IntentOp>,
    reject_submit: bool,
    reject_withdraw: bool,
}

/// Intent service keeping submitted rules in memory
///
/// Every call is journaled, including failed and no-op ones. Submission
/// and withdrawal can be switched to fail to exercise error paths.
#[derive(Debug, Default)]
pub struct IntentStore {
    inner: Mutex<IntentStoreInner>,
}

impl IntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules currently submitted, by key
    pub fn active(&self) -> Vec<(IntentKey, SteeringRule)> {
        let inner = self.inner.lock().unwrap();
        inner
            .active
            .iter()
            .map(|(k, r)| (*k, r.clone()))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().unwrap().active.len()
    }

    pub fn journal(&self) -> Vec<IntentOp> {
        self.inner.lock().unwrap().journal.clone()
    }

    pub fn reject_submissions(&self, reject: bool) {
        self.inner.lock().unwrap().reject_submit = reject;
    }

    pub fn reject_withdrawals(&self, reject: bool) {
        self.inner.lock().unwrap().reject_withdraw = reject;
    }
}

impl IntentService for IntentStore {
    fn submit(&self, rule: &SteeringRule) -> Result<IntentKey> {
        let mut inner = self.inner.lock().unwrap();
        if inner.reject_submit {
            return Err(Error::Intent("submission rejected".into()));
        }
        inner.next_key += 1;
        let key = IntentKey(inner.next_key);
        inner.active.insert(key, rule.clone());
        inner.journal.push(IntentOp::Submit(key));
        Ok(key)
    }

    fn withdraw(&self, key: IntentKey) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.journal.push(IntentOp::Withdraw(key));
        if inner.reject_withdraw {
            return Err(Error::Intent(format!("withdrawal of {key} rejected")));
        }
        inner.active.remove(&key);
        Ok(())
    }
}

/// Packet service recording subscriptions and emitted frames
#[derive(Debug, Default)]
pub struct PacketLog {
    requested: Mutex<BTreeSet<EtherType>>,
    emitted: Mutex<Vec<OutboundPacket>>,
}

impl PacketLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&self) -> Vec<EtherType> {
        self.requested.lock().unwrap().iter().copied().collect()
    }

    pub fn emitted(&self) -> Vec<OutboundPacket> {
        self.emitted.lock().unwrap().clone()
    }
}

impl PacketService for PacketLog {
    fn request_packets(&self, ether_type: EtherType) {
        self.requested.lock().unwrap().insert(ether_type);
    }

    fn cancel_packets(&self, ether_type: EtherType) {
        self.requested.lock().unwrap().remove(&ether_type);
    }

    fn emit(&self, packet: OutboundPacket) -> Result<()> {
        self.emitted.lock().unwrap().push(packet);
        Ok(())
    }
}

/// All in-memory services, with concrete handles kept for inspection
#[derive(Debug, Clone, Default)]
pub struct MemoryPlatform {
    pub hosts: Arc<HostTable>,
    pub routes: Arc<RouteTable>,
    pub interfaces: Arc<InterfaceTable>,
    pub intents: Arc<IntentStore>,
    pub packets: Arc<PacketLog>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the tables from the `[[hosts]]`, `[[routes]]` and
    /// `[[interfaces]]` sections of a settings file
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let platform = Self::new();

        for entry in &settings.hosts {
            platform.hosts.insert(Host {
                ip: entry.ip,
                mac: entry
                    .mac
                    .parse()
                    .map_err(|e| Error::Config(format!("hosts.{}: {}", entry.ip, e)))?,
                location: entry.location.parse()?,
            });
        }

        for entry in &settings.routes {
            platform.routes.add(ResolvedRoute {
                prefix: entry.prefix.parse()?,
                next_hop: entry.next_hop,
            });
        }

        for entry in &settings.interfaces {
            let addresses = entry
                .addresses
                .iter()
                .map(|a| a.parse())
                .collect::<Result<Vec<_>>>()?;
            let mac = match &entry.mac {
                Some(mac) => Some(
                    mac.parse()
                        .map_err(|e| Error::Config(format!("interfaces.{}: {}", entry.name, e)))?,
                ),
                None => None,
            };
            platform.interfaces.add(Interface {
                name: entry.name.clone(),
                connect_point: entry.connect_point.parse()?,
                addresses,
                mac,
            });
        }

        Ok(platform)
    }

    pub fn services(&self) -> Services {
        Services {
            hosts: self.hosts.clone(),
            routes: self.routes.clone(),
            interfaces: self.interfaces.clone(),
            intents: self.intents.clone(),
            packets: self.packets.clone(),
        }
    }
}
