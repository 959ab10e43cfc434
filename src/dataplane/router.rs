//! Virtual router application
//!
//! Ties the packet classifier, the decision engine, the rule installer and
//! the peering provisioner together. [`VRouter`] owns the active router
//! configuration and the installed rule set; it takes `&mut self` everywhere
//! and is meant to be driven from a single task (see [`crate::controller`]).

use super::{
    answer_virtual_gateway, classify, Decision, DecisionEngine, Direction, IgnoreReason,
    InstallOutcome, InstalledRuleSet, PeeringProvisioner, PeeringReport, RuleInstaller,
};
use crate::config::{ConfigEventKind, NetworkConfigEvent, RouterConfig};
use crate::platform::{IntentKey, PacketContext, Services};
use crate::protocol::EtherType;
use tracing::{debug, error, info, warn};

/// Packet types the router asks the platform to punt
const PUNTED_TYPES: [EtherType; 2] = [EtherType::Ipv4, EtherType::Arp];

/// What happened to one punted packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Another processor already consumed it
    AlreadyHandled,
    /// Unparsable, or neither IPv4 nor an ARP request for the virtual IP
    NotIpv4,
    /// No router configuration applied yet
    NoConfig,
    /// Answered an ARP request for the virtual gateway
    ArpReplied,
    /// The ARP reply could not be sent
    ArpReplyFailed,
    /// A steering rule was submitted for the flow
    Installed { direction: Direction, key: IntentKey },
    /// The flow was already steered by an earlier rule
    AlreadyInstalled { direction: Direction, key: IntentKey },
    /// No rule could be computed
    Ignored(IgnoreReason),
    /// The intent service refused the rule
    InstallFailed { direction: Direction },
}

impl PacketOutcome {
    /// Whether the packet ended up marked handled
    pub fn is_handled(&self) -> bool {
        matches!(
            self,
            PacketOutcome::AlreadyHandled
                | PacketOutcome::ArpReplied
                | PacketOutcome::Installed { .. }
                | PacketOutcome::AlreadyInstalled { .. }
        )
    }
}

/// What a configuration event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOutcome {
    /// Not an add/update of this application's router block
    Ignored,
    /// Payload failed validation; nothing changed
    Rejected { errors: Vec<String> },
    /// Event carried no payload; rules withdrawn and configuration cleared
    Cleared { withdrawn: usize },
    Applied {
        withdrawn: usize,
        report: PeeringReport,
    },
}

pub struct VRouter {
    services: Services,
    installer: RuleInstaller,
    config: Option<RouterConfig>,
    installed: InstalledRuleSet,
    active: bool,
}

impl VRouter {
    pub fn new(services: Services) -> Self {
        let installer = RuleInstaller::new(services.intents.clone());
        Self {
            services,
            installer,
            config: None,
            installed: InstalledRuleSet::new(),
            active: false,
        }
    }

    /// Start receiving IPv4 and ARP packets
    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        for ether_type in PUNTED_TYPES {
            self.services.packets.request_packets(ether_type);
        }
        self.active = true;
        info!("vrouter started");
    }

    /// Stop receiving packets and withdraw every installed rule
    ///
    /// Rules installed while inactive (a configuration event delivered
    /// before `activate`) are withdrawn as well.
    pub fn deactivate(&mut self) {
        if self.active {
            for ether_type in PUNTED_TYPES {
                self.services.packets.cancel_packets(ether_type);
            }
            self.active = false;
        }
        let withdrawn = self.installer.withdraw_all(&mut self.installed);
        info!(withdrawn, "vrouter stopped");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> Option<&RouterConfig> {
        self.config.as_ref()
    }

    pub fn installed(&self) -> &InstalledRuleSet {
        &self.installed
    }

    /// Handle one punted packet
    pub fn process(&mut self, context: &mut PacketContext) -> PacketOutcome {
        if context.is_handled() {
            return PacketOutcome::AlreadyHandled;
        }

        let inbound = context.inbound();
        let Some(packet) = classify(&inbound.data) else {
            return self.process_non_ipv4(context);
        };

        let Some(config) = &self.config else {
            debug!(src = %packet.src_ip, dst = %packet.dst_ip, "no router configuration, ignoring packet");
            return PacketOutcome::NoConfig;
        };

        debug!(
            src_mac = %packet.src_mac,
            dst_mac = %packet.dst_mac,
            src = %packet.src_ip,
            dst = %packet.dst_ip,
            in_point = %inbound.received_from,
            "reactive IPv4 packet"
        );

        let decision =
            DecisionEngine::new(&self.services).decide(&packet, config, &inbound.received_from);
        let (direction, rule) = match decision {
            Decision::Steer { direction, rule } => (direction, rule),
            Decision::Ignore(reason) => {
                debug!(%reason, "packet ignored");
                return PacketOutcome::Ignored(reason);
            }
        };

        match self.installer.install(rule, &mut self.installed) {
            InstallOutcome::Installed(key) => {
                info!(%direction, %key, "steering rule installed");
                context.block();
                PacketOutcome::Installed { direction, key }
            }
            InstallOutcome::AlreadyInstalled(key) => {
                context.block();
                PacketOutcome::AlreadyInstalled { direction, key }
            }
            InstallOutcome::Failed => PacketOutcome::InstallFailed { direction },
        }
    }

    fn process_non_ipv4(&mut self, context: &mut PacketContext) -> PacketOutcome {
        let Some(config) = &self.config else {
            return PacketOutcome::NotIpv4;
        };
        let inbound = context.inbound();
        let Some(reply) = answer_virtual_gateway(
            &inbound.data,
            &inbound.received_from,
            config.virtual_ip,
            config.virtual_mac,
        ) else {
            return PacketOutcome::NotIpv4;
        };

        match self.services.packets.emit(reply) {
            Ok(()) => {
                context.block();
                PacketOutcome::ArpReplied
            }
            Err(e) => {
                warn!(error = %e, "failed to send ARP reply");
                PacketOutcome::ArpReplyFailed
            }
        }
    }

    /// Handle a configuration registry event
    ///
    /// A valid router block replaces the configuration: every installed rule
    /// is withdrawn before the peering rules of the new configuration go in.
    pub fn on_config_event(&mut self, event: &NetworkConfigEvent) -> ConfigOutcome {
        if !matches!(event.kind, ConfigEventKind::Added | ConfigEventKind::Updated)
            || !event.is_router_config()
        {
            debug!(kind = ?event.kind, subject = %event.subject, key = %event.config_key, "configuration event ignored");
            return ConfigOutcome::Ignored;
        }

        let Some(doc) = &event.payload else {
            let withdrawn = self.installer.withdraw_all(&mut self.installed);
            self.config = None;
            warn!(withdrawn, "configuration event without content, router configuration cleared");
            return ConfigOutcome::Cleared { withdrawn };
        };

        let config = match RouterConfig::try_from(doc) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "router configuration rejected");
                let errors = match e {
                    crate::Error::InvalidConfig { errors } => errors,
                    other => vec![other.to_string()],
                };
                return ConfigOutcome::Rejected { errors };
            }
        };

        let withdrawn = self.installer.withdraw_all(&mut self.installed);
        info!(
            router_point = %config.router_point,
            router_mac = %config.router_mac,
            virtual_ip = %config.virtual_ip,
            virtual_mac = %config.virtual_mac,
            peers = ?config.peers,
            withdrawn,
            "router configuration applied"
        );

        let report = PeeringProvisioner::new(&*self.services.interfaces, &self.installer)
            .provision(&config, &mut self.installed);
        self.config = Some(config);

        ConfigOutcome::Applied { withdrawn, report }
    }
}
