//! Steering rule installer
//!
//! Thin layer over the intent service that keeps [`InstalledRuleSet`]
//! consistent with what the service actually holds.

use super::{InstalledRuleSet, SteeringRule};
use crate::platform::{IntentKey, IntentService};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of an install request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Submitted and recorded under a new handle
    Installed(IntentKey),
    /// An identical flow is already steered; nothing submitted
    AlreadyInstalled(IntentKey),
    /// The intent service refused the rule; nothing recorded
    Failed,
}

pub struct RuleInstaller {
    intents: Arc<dyn IntentService>,
}

impl RuleInstaller {
    pub fn new(intents: Arc<dyn IntentService>) -> Self {
        Self { intents }
    }

    /// Submit `rule` unless the same flow is already installed
    pub fn install(&self, rule: SteeringRule, installed: &mut InstalledRuleSet) -> InstallOutcome {
        if let Some(existing) = installed.lookup(&rule.key()) {
            debug!(%existing, %rule, "flow already steered");
            return InstallOutcome::AlreadyInstalled(existing);
        }

        match self.intents.submit(&rule) {
            Ok(key) => {
                debug!(%key, %rule, "steering rule submitted");
                installed.insert(key, rule);
                InstallOutcome::Installed(key)
            }
            Err(e) => {
                warn!(%rule, error = %e, "steering rule submission failed");
                InstallOutcome::Failed
            }
        }
    }

    /// Withdraw every installed rule and empty the set
    ///
    /// A failed withdrawal is logged and the handle is still dropped, so the
    /// same handle is never withdrawn twice by this application.
    pub fn withdraw_all(&self, installed: &mut InstalledRuleSet) -> usize {
        let drained = installed.drain();
        for (key, rule) in &drained {
            if let Err(e) = self.intents.withdraw(*key) {
                warn!(%key, %rule, error = %e, "steering rule withdrawal failed");
            }
        }
        drained.len()
    }
}
