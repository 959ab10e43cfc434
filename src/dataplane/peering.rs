//! Peering flow provisioning
//!
//! For every configured peer, installs the pair of rules that carries
//! control-plane traffic (eBGP) between the router's attachment point and the
//! interface facing that peer.

use super::{
    InstallOutcome, InstalledRuleSet, RuleInstaller, SteeringRule, TrafficSelector,
    TrafficTreatment, PEERING_PRIORITY,
};
use crate::config::RouterConfig;
use crate::platform::{ConnectPoint, InterfaceService};
use crate::protocol::Ipv4Prefix;
use std::net::Ipv4Addr;
use tracing::{info, warn};

/// Why a peer got no rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSkip {
    /// No configured interface covers the peer address
    NoInterface,
    /// The interface facing the peer has no address of its own
    NoAddress,
    /// At least one of the two rules was refused by the intent service
    SubmitFailed,
}

/// Summary of one provisioning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeeringReport {
    /// Peers for which both rules are in place
    pub provisioned: Vec<Ipv4Addr>,
    pub skipped: Vec<(Ipv4Addr, PeerSkip)>,
    /// Rules newly submitted in this pass
    pub rules_installed: usize,
}

pub struct PeeringProvisioner<'a> {
    interfaces: &'a dyn InterfaceService,
    installer: &'a RuleInstaller,
}

impl<'a> PeeringProvisioner<'a> {
    pub fn new(interfaces: &'a dyn InterfaceService, installer: &'a RuleInstaller) -> Self {
        Self {
            interfaces,
            installer,
        }
    }

    /// Install the peering rules for `config`, in peer order
    ///
    /// Callers withdraw the previous rule set first; rules already present
    /// in `installed` are not submitted again. `config.peers` holds no
    /// duplicates once validated.
    pub fn provision(
        &self,
        config: &RouterConfig,
        installed: &mut InstalledRuleSet,
    ) -> PeeringReport {
        let mut report = PeeringReport::default();

        for &peer in &config.peers {
            let Some(interface) = self.interfaces.matching_interface(peer) else {
                warn!(%peer, "no interface found for peer, skipping");
                report.skipped.push((peer, PeerSkip::NoInterface));
                continue;
            };
            let peer_point = interface.connect_point;

            let Some(local_ip) = self.local_address(&peer_point) else {
                warn!(%peer, interface = %peer_point, "interface facing peer has no address, skipping");
                report.skipped.push((peer, PeerSkip::NoAddress));
                continue;
            };

            let outgoing = peering_rule(peer, &config.router_point, &peer_point);
            let incoming = peering_rule(local_ip, &peer_point, &config.router_point);

            let mut failed = false;
            for rule in [outgoing, incoming] {
                match self.installer.install(rule, installed) {
                    InstallOutcome::Installed(_) => report.rules_installed += 1,
                    InstallOutcome::AlreadyInstalled(_) => {}
                    InstallOutcome::Failed => failed = true,
                }
            }

            if failed {
                report.skipped.push((peer, PeerSkip::SubmitFailed));
            } else {
                info!(%peer, interface = %peer_point, %local_ip, "peering flows installed");
                report.provisioned.push(peer);
            }
        }

        report
    }

    /// First address configured on the interfaces at `point`
    fn local_address(&self, point: &ConnectPoint) -> Option<Ipv4Addr> {
        self.interfaces
            .interfaces_by_port(point)
            .into_iter()
            .flat_map(|i| i.addresses)
            .map(|a| a.ip)
            .next()
    }
}

fn peering_rule(dst: Ipv4Addr, ingress: &ConnectPoint, egress: &ConnectPoint) -> SteeringRule {
    SteeringRule::new(
        TrafficSelector::ipv4_dst(Ipv4Prefix::host(dst)),
        TrafficTreatment::default(),
        ingress.clone(),
        egress.clone(),
    )
    .with_priority(PEERING_PRIORITY)
}
