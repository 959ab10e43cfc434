//! Data plane components
//!
//! Handles punted packets and configuration changes: classification,
//! forwarding decisions, and steering rule installation.

mod arp_proxy;
mod classifier;
mod decision;
mod installer;
mod peering;
mod router;
mod rules;

pub use arp_proxy::answer_virtual_gateway;
pub use classifier::{classify, ClassifiedPacket};
pub use decision::{Decision, DecisionEngine, Direction, IgnoreReason};
pub use installer::{InstallOutcome, RuleInstaller};
pub use peering::{PeerSkip, PeeringProvisioner, PeeringReport};
pub use router::{ConfigOutcome, PacketOutcome, VRouter};
pub use rules::{
    InstalledRuleSet, RuleKey, SteeringRule, TrafficSelector, TrafficTreatment, PEERING_PRIORITY,
    REACTIVE_PRIORITY,
};
