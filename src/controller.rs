//! Control channel for the virtual router
//!
//! Packet and configuration events may arrive from any task. They are
//! funneled through one mpsc channel into a task that owns the [`VRouter`],
//! so the router configuration and the installed rule set are only ever
//! touched by one event at a time.

use crate::config::{NetworkConfigEvent, RouterConfig};
use crate::dataplane::{ConfigOutcome, PacketOutcome, SteeringRule, VRouter};
use crate::platform::{IntentKey, PacketContext};
use crate::{Error, Result};
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const CHANNEL_CAPACITY: usize = 64;

/// Router state as seen between two events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSnapshot {
    pub config: Option<RouterConfig>,
    /// Installed rules in submission order
    pub rules: Vec<(IntentKey, SteeringRule)>,
}

enum CtlMsg {
    Packet(PacketContext, oneshot::Sender<(PacketOutcome, PacketContext)>),
    Config(NetworkConfigEvent, oneshot::Sender<ConfigOutcome>),
    Snapshot(oneshot::Sender<RouterSnapshot>),
    Shutdown,
}

/// Sends events to the router task
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<CtlMsg>,
}

impl ControllerHandle {
    /// Hand a punted packet to the router
    ///
    /// The context comes back with its handled flag updated.
    pub async fn packet(&self, context: PacketContext) -> Result<(PacketOutcome, PacketContext)> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CtlMsg::Packet(context, reply_tx)).await?;
        reply_rx.await.map_err(|_| Error::ControllerStopped)
    }

    pub async fn config(&self, event: NetworkConfigEvent) -> Result<ConfigOutcome> {
        debug!(kind = ?event.kind, subject = %event.subject, "requesting configuration change");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CtlMsg::Config(event, reply_tx)).await?;
        reply_rx.await.map_err(|_| Error::ControllerStopped)
    }

    pub async fn snapshot(&self) -> Result<RouterSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CtlMsg::Snapshot(reply_tx)).await?;
        reply_rx.await.map_err(|_| Error::ControllerStopped)
    }

    /// Ask the router task to deactivate the router and finish
    pub async fn shutdown(&self) -> Result<()> {
        self.send(CtlMsg::Shutdown).await
    }

    async fn send(&self, msg: CtlMsg) -> Result<()> {
        self.tx.send(msg).await.map_err(|_| Error::ControllerStopped)
    }
}

/// Activate `router` and serve events on a new task
///
/// The task ends on shutdown, or once every handle is dropped, and yields
/// the deactivated router. Must be called within a tokio runtime.
pub fn spawn(mut router: VRouter) -> (ControllerHandle, JoinHandle<VRouter>) {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

    let task = tokio::spawn(async move {
        router.activate();
        while let Some(msg) = rx.recv().await {
            match msg {
                CtlMsg::Packet(mut context, reply_to) => {
                    let outcome = router.process(&mut context);
                    if reply_to.send((outcome, context)).is_err() {
                        error!("could not reply to packet request");
                    }
                }
                CtlMsg::Config(event, reply_to) => {
                    let outcome = router.on_config_event(&event);
                    if reply_to.send(outcome).is_err() {
                        error!("could not reply to configuration request");
                    }
                }
                CtlMsg::Snapshot(reply_to) => {
                    let snapshot = RouterSnapshot {
                        config: router.config().cloned(),
                        rules: router
                            .installed()
                            .iter()
                            .map(|(k, r)| (k, r.clone()))
                            .collect(),
                    };
                    let _ = reply_to.send(snapshot);
                }
                CtlMsg::Shutdown => {
                    info!("got request to shut down");
                    break;
                }
            }
        }
        router.deactivate();
        router
    });

    (ControllerHandle { tx }, task)
}
