//! Configuration validation

use super::{RouterConfig, RouterConfigDoc};
use crate::platform::ConnectPoint;
use crate::protocol::MacAddr;
use crate::Error;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

/// Validate a router block and return warnings/errors
pub fn validate(doc: &RouterConfigDoc) -> ValidationResult {
    let mut result = ValidationResult::new();
    let _ = check(doc, &mut result);
    result
}

impl TryFrom<&RouterConfigDoc> for RouterConfig {
    type Error = Error;

    fn try_from(doc: &RouterConfigDoc) -> Result<Self, Error> {
        let mut result = ValidationResult::new();
        match check(doc, &mut result) {
            Some(config) if !result.has_errors() => Ok(config),
            _ => Err(Error::InvalidConfig {
                errors: result.errors,
            }),
        }
    }
}

/// Check every field, recording all problems; `Some` only when all
/// mandatory fields parsed
fn check(doc: &RouterConfigDoc, result: &mut ValidationResult) -> Option<RouterConfig> {
    let router_point = required(result, "router-point", doc.router_point.as_deref())
        .and_then(|s| parse_field::<ConnectPoint>(result, "router-point", s));
    let router_mac = required(result, "router-mac", doc.router_mac.as_deref())
        .and_then(|s| parse_field::<MacAddr>(result, "router-mac", s));
    let virtual_ip = required(result, "virtual-ip", doc.virtual_ip.as_deref())
        .and_then(|s| parse_field::<Ipv4Addr>(result, "virtual-ip", s));
    let virtual_mac = required(result, "virtual-mac", doc.virtual_mac.as_deref())
        .and_then(|s| parse_field::<MacAddr>(result, "virtual-mac", s));

    let mut peers: Vec<Ipv4Addr> = Vec::with_capacity(doc.peers.len());
    for (i, raw) in doc.peers.iter().enumerate() {
        let Some(peer) = parse_field::<Ipv4Addr>(result, &format!("peers[{}]", i), raw) else {
            continue;
        };
        if peers.contains(&peer) {
            result.warn(format!(
                "peers[{}]: {} listed more than once, provisioned once",
                i, peer
            ));
            continue;
        }
        peers.push(peer);
    }
    if doc.peers.is_empty() {
        result.warn("peers: no peers configured, no peering flows will be installed");
    }

    for (field, mac) in [("router-mac", router_mac), ("virtual-mac", virtual_mac)] {
        if let Some(mac) = mac.filter(|m| m.is_multicast()) {
            result.warn(format!("{}: {} is a multicast address", field, mac));
        }
    }
    if router_mac.is_some() && router_mac == virtual_mac {
        result.warn("virtual-mac: same as router-mac");
    }

    Some(RouterConfig {
        router_point: router_point?,
        router_mac: router_mac?,
        virtual_ip: virtual_ip?,
        virtual_mac: virtual_mac?,
        peers,
    })
}

fn required<'a>(
    result: &mut ValidationResult,
    field: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            result.error(format!("{}: required", field));
            None
        }
    }
}

fn parse_field<T>(result: &mut ValidationResult, field: &str, value: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            result.error(format!("{}: invalid value '{}': {}", field, value, e));
            None
        }
    }
}
