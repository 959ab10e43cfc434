//! Steering rules and the set of rules this application has installed

use crate::platform::{ConnectPoint, IntentKey};
use crate::protocol::{EtherType, Ipv4Prefix, MacAddr};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Priority of rules installed in reaction to a packet
pub const REACTIVE_PRIORITY: u16 = 100;

/// Priority of the router-to-peer rules, above any reactive rule
pub const PEERING_PRIORITY: u16 = 200;

/// Header match of a steering rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrafficSelector {
    pub eth_type: EtherType,
    pub ip_src: Option<Ipv4Prefix>,
    pub ip_dst: Ipv4Prefix,
}

impl TrafficSelector {
    /// IPv4 traffic towards `dst`
    pub fn ipv4_dst(dst: Ipv4Prefix) -> Self {
        Self {
            eth_type: EtherType::Ipv4,
            ip_src: None,
            ip_dst: dst,
        }
    }

    pub fn ip_src(mut self, src: Ipv4Prefix) -> Self {
        self.ip_src = Some(src);
        self
    }
}

impl fmt::Display for TrafficSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eth_type={}", self.eth_type)?;
        if let Some(src) = self.ip_src {
            write!(f, " ip_src={src}")?;
        }
        write!(f, " ip_dst={}", self.ip_dst)
    }
}

/// Header rewrites applied at the egress point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TrafficTreatment {
    pub eth_src: Option<MacAddr>,
    pub eth_dst: Option<MacAddr>,
}

impl TrafficTreatment {
    pub fn rewrite(eth_src: MacAddr, eth_dst: MacAddr) -> Self {
        Self {
            eth_src: Some(eth_src),
            eth_dst: Some(eth_dst),
        }
    }
}

/// Point-to-point steering request handed to the intent service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteeringRule {
    pub selector: TrafficSelector,
    pub treatment: TrafficTreatment,
    pub ingress: ConnectPoint,
    pub egress: ConnectPoint,
    pub priority: u16,
}

impl SteeringRule {
    pub fn new(
        selector: TrafficSelector,
        treatment: TrafficTreatment,
        ingress: ConnectPoint,
        egress: ConnectPoint,
    ) -> Self {
        Self {
            selector,
            treatment,
            ingress,
            egress,
            priority: REACTIVE_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    /// Identity used to detect that the same flow is already steered
    pub fn key(&self) -> RuleKey {
        RuleKey {
            ingress: self.ingress.clone(),
            egress: self.egress.clone(),
            selector: self.selector.clone(),
        }
    }
}

impl fmt::Display for SteeringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}] prio={}",
            self.ingress, self.egress, self.selector, self.priority
        )?;
        if let Some(src) = self.treatment.eth_src {
            write!(f, " set_eth_src={src}")?;
        }
        if let Some(dst) = self.treatment.eth_dst {
            write!(f, " set_eth_dst={dst}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    ingress: ConnectPoint,
    egress: ConnectPoint,
    selector: TrafficSelector,
}

/// Rules submitted by this application and not yet withdrawn
///
/// Every handle held here refers to a rule the intent service accepted.
/// Handles are ordered, so iteration and draining follow submission order.
#[derive(Debug, Default)]
pub struct InstalledRuleSet {
    rules: BTreeMap<IntentKey, SteeringRule>,
    by_key: HashMap<RuleKey, IntentKey>,
}

impl InstalledRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of an installed rule with the same ingress, egress and selector
    pub fn lookup(&self, key: &RuleKey) -> Option<IntentKey> {
        self.by_key.get(key).copied()
    }

    pub fn insert(&mut self, handle: IntentKey, rule: SteeringRule) {
        self.by_key.insert(rule.key(), handle);
        self.rules.insert(handle, rule);
    }

    /// Empty the set, returning its entries in submission order
    pub fn drain(&mut self) -> Vec<(IntentKey, SteeringRule)> {
        self.by_key.clear();
        std::mem::take(&mut self.rules).into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IntentKey, &SteeringRule)> {
        self.rules.iter().map(|(k, r)| (*k, r))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
