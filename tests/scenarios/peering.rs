//! Configuration-driven peering flows

use super::fabric::{self, Fabric};
use vrouter::config::{ConfigEventKind, NetworkConfigEvent};
use vrouter::controller;
use vrouter::dataplane::{ConfigOutcome, PeerSkip, VRouter, PEERING_PRIORITY};
use vrouter::platform::memory::IntentOp;
use vrouter::platform::{ConnectPoint, IntentKey};
use std::net::Ipv4Addr;

fn summary(fabric: &Fabric) -> Vec<(String, ConnectPoint, ConnectPoint)> {
    fabric
        .router
        .installed()
        .iter()
        .map(|(_, r)| (r.selector.ip_dst.to_string(), r.ingress.clone(), r.egress.clone()))
        .collect()
}

/// One peer behind 10.0.0.1/24 gives exactly one rule each way
#[test]
fn test_single_peer_pair() {
    let fabric = Fabric::configured(&["10.0.0.2"]);

    assert_eq!(
        summary(&fabric),
        vec![
            ("10.0.0.2/32".to_string(), fabric::router_point(), fabric::peer1_point()),
            ("10.0.0.1/32".to_string(), fabric::peer1_point(), fabric::router_point()),
        ]
    );
    for (_, rule) in fabric.router.installed().iter() {
        assert_eq!(rule.priority, PEERING_PRIORITY);
        assert_eq!(rule.treatment.eth_src, None);
        assert_eq!(rule.treatment.eth_dst, None);
    }
    assert_eq!(fabric.platform.intents.active_count(), 2);
}

/// Applying the same configuration twice never accumulates rules
#[test]
fn test_reprovisioning_is_idempotent() {
    let peers = ["10.0.0.2", "10.0.1.2"];
    let mut fabric = Fabric::configured(&peers);
    let first = summary(&fabric);

    let outcome = fabric.configure(&peers);
    let ConfigOutcome::Applied { withdrawn, report } = outcome else {
        panic!("expected configuration to apply, got {outcome:?}");
    };
    assert_eq!(withdrawn, 4);
    assert_eq!(report.rules_installed, 4);

    assert_eq!(fabric.router.installed().len(), 2 * peers.len());
    assert_eq!(fabric.platform.intents.active_count(), 2 * peers.len());
    assert_eq!(summary(&fabric), first);
}

/// Every rule of the previous configuration is withdrawn before the first
/// rule of the new one is submitted
#[test]
fn test_withdraw_all_before_reinstall() {
    let mut fabric = Fabric::configured(&["10.0.0.2", "10.0.1.2"]);
    let old: Vec<IntentKey> = fabric.router.installed().iter().map(|(k, _)| k).collect();
    assert_eq!(old.len(), 4);

    fabric.configure(&["10.0.1.2"]);

    let journal = fabric.platform.intents.journal();
    let after = &journal[4..];
    let expected_withdrawals: Vec<IntentOp> = old.iter().map(|k| IntentOp::Withdraw(*k)).collect();
    assert_eq!(&after[..4], expected_withdrawals.as_slice());
    assert!(after[4..].iter().all(|op| matches!(op, IntentOp::Submit(_))));
    assert_eq!(after[4..].len(), 2);

    assert_eq!(
        summary(&fabric),
        vec![
            ("10.0.1.2/32".to_string(), fabric::router_point(), fabric::peer2_point()),
            ("10.0.1.1/32".to_string(), fabric::peer2_point(), fabric::router_point()),
        ]
    );
}

/// An unreachable peer is skipped; the rest are still provisioned
#[test]
fn test_partial_provisioning() {
    let mut fabric = Fabric::new();

    let outcome = fabric.configure(&["192.0.2.9", "10.0.1.2"]);
    let ConfigOutcome::Applied { report, .. } = outcome else {
        panic!("expected configuration to apply, got {outcome:?}");
    };
    assert_eq!(
        report.skipped,
        vec![(Ipv4Addr::new(192, 0, 2, 9), PeerSkip::NoInterface)]
    );
    assert_eq!(report.provisioned, vec![Ipv4Addr::new(10, 0, 1, 2)]);
    assert_eq!(fabric.router.installed().len(), 2);
}

/// Failed withdrawals still drop the handles, so they are not retried
#[test]
fn test_failed_withdrawals_not_repeated() {
    let mut fabric = Fabric::configured(&["10.0.0.2"]);
    let old: Vec<IntentKey> = fabric.router.installed().iter().map(|(k, _)| k).collect();

    fabric.platform.intents.reject_withdrawals(true);
    fabric.configure(&["10.0.0.2"]);
    fabric.platform.intents.reject_withdrawals(false);
    fabric.configure(&["10.0.0.2"]);

    let journal = fabric.platform.intents.journal();
    for key in old {
        let withdrawals = journal
            .iter()
            .filter(|op| **op == IntentOp::Withdraw(key))
            .count();
        assert_eq!(withdrawals, 1, "{key} withdrawn more than once");
    }
    assert_eq!(fabric.router.installed().len(), 2);
}

/// An invalid update leaves the applied configuration and its rules alone
#[test]
fn test_invalid_update_rejected() {
    let mut fabric = Fabric::configured(&["10.0.0.2"]);
    let journal_len = fabric.platform.intents.journal().len();

    let mut doc = fabric::router_doc(&["10.0.0.2"]);
    doc.virtual_ip = None;
    let outcome = fabric
        .router
        .on_config_event(&NetworkConfigEvent::updated(doc));

    assert!(matches!(outcome, ConfigOutcome::Rejected { .. }));
    assert_eq!(fabric.platform.intents.journal().len(), journal_len);
    assert_eq!(fabric.router.installed().len(), 2);
    assert!(fabric.router.config().is_some());
}

/// An event whose content cannot be retrieved tears everything down
#[test]
fn test_event_without_content() {
    let mut fabric = Fabric::configured(&["10.0.0.2", "10.0.1.2"]);

    let outcome = fabric
        .router
        .on_config_event(&NetworkConfigEvent::router(ConfigEventKind::Added, None));

    assert_eq!(outcome, ConfigOutcome::Cleared { withdrawn: 4 });
    assert!(fabric.router.installed().is_empty());
    assert_eq!(fabric.platform.intents.active_count(), 0);
}

/// Packets and reconfigurations racing through the controller leave exactly
/// the peering pair of the last configuration
#[tokio::test]
async fn test_controller_serializes_packets_and_config() {
    let bench = Fabric::new();
    bench.add_host([172, 30, 1, 2], fabric::HOST_MAC, ConnectPoint::new("deviceX", 1));
    let platform = bench.platform.clone();
    let (handle, task) = controller::spawn(VRouter::new(platform.services()));

    handle
        .config(NetworkConfigEvent::added(fabric::router_doc(&["10.0.0.2"])))
        .await
        .unwrap();

    let mut joins = Vec::new();
    for i in 0..16u8 {
        let handle = handle.clone();
        joins.push(tokio::spawn(async move {
            if i % 4 == 0 {
                handle
                    .config(NetworkConfigEvent::updated(fabric::router_doc(&["10.0.0.2"])))
                    .await
                    .map(|_| ())
            } else {
                let context = fabric::ipv4_context(
                    [8, 8, 8, i],
                    [172, 30, 1, 2],
                    ConnectPoint::new("deviceY", u64::from(i)),
                );
                handle.packet(context).await.map(|_| ())
            }
        }));
    }
    for join in joins {
        join.await.unwrap().unwrap();
    }

    handle
        .config(NetworkConfigEvent::updated(fabric::router_doc(&["10.0.0.2"])))
        .await
        .unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.rules.len(), 2);
    assert_eq!(platform.intents.active_count(), 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    assert_eq!(platform.intents.active_count(), 0);
}
