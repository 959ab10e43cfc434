//! Configuration types

use crate::platform::ConnectPoint;
use crate::protocol::MacAddr;
use crate::telemetry::LogConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Application name the router configuration is registered under
pub const APP_NAME: &str = "vrouter";

/// Configuration key of the router block within the application
pub const CONFIG_KEY: &str = "router";

// ============================================================================
// Router configuration (netcfg JSON)
// ============================================================================

/// Network configuration export: `{"apps": {"<app>": {"<key>": {...}}}}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NetcfgDocument {
    #[serde(default)]
    pub apps: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

impl NetcfgDocument {
    /// The router block of this application, if present
    pub fn router_config(&self) -> Result<Option<RouterConfigDoc>> {
        match self.apps.get(APP_NAME).and_then(|app| app.get(CONFIG_KEY)) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}

/// Router block as written by the operator, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouterConfigDoc {
    #[serde(alias = "quagga")]
    pub router_point: Option<String>,
    #[serde(alias = "quagga-mac")]
    pub router_mac: Option<String>,
    pub virtual_ip: Option<String>,
    pub virtual_mac: Option<String>,
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Validated router configuration
///
/// Replaced as a whole on every accepted configuration event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Where the routing daemon (eBGP speaker) attaches to the fabric
    pub router_point: ConnectPoint,
    pub router_mac: MacAddr,
    /// Default gateway address of the SDN hosts
    pub virtual_ip: Ipv4Addr,
    pub virtual_mac: MacAddr,
    /// eBGP peers, in configuration order
    pub peers: Vec<Ipv4Addr>,
}

// ============================================================================
// Configuration events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEventKind {
    Added,
    Updated,
    Removed,
}

/// Notification from the configuration registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfigEvent {
    pub kind: ConfigEventKind,
    /// Application the configuration belongs to
    pub subject: String,
    pub config_key: String,
    /// Configuration content at the time of the event, if retrievable
    pub payload: Option<RouterConfigDoc>,
}

impl NetworkConfigEvent {
    /// Event for this application's router block
    pub fn router(kind: ConfigEventKind, payload: Option<RouterConfigDoc>) -> Self {
        Self {
            kind,
            subject: APP_NAME.to_string(),
            config_key: CONFIG_KEY.to_string(),
            payload,
        }
    }

    pub fn added(payload: RouterConfigDoc) -> Self {
        Self::router(ConfigEventKind::Added, Some(payload))
    }

    pub fn updated(payload: RouterConfigDoc) -> Self {
        Self::router(ConfigEventKind::Updated, Some(payload))
    }

    /// Whether this event targets the router block of this application
    pub fn is_router_config(&self) -> bool {
        self.subject == APP_NAME && self.config_key == CONFIG_KEY
    }
}

// ============================================================================
// Controller settings (TOML)
// ============================================================================

/// Static platform state and logging for the command-line tool
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LogConfig,
    pub hosts: Vec<HostEntry>,
    pub routes: Vec<RouteEntry>,
    pub interfaces: Vec<InterfaceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostEntry {
    pub ip: Ipv4Addr,
    pub mac: String,
    /// Attachment point, `<device-id>/<port>`
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteEntry {
    pub prefix: String,
    pub next_hop: Ipv4Addr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterfaceEntry {
    pub name: String,
    pub connect_point: String,
    /// `10.0.0.1/24` style addresses
    #[serde(default)]
    pub addresses: Vec<String>,
    pub mac: Option<String>,
}
