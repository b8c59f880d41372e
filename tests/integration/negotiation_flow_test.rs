//! Negotiation Flow Integration Tests
//!
//! End-to-end blocker flows: detection through negotiation to the
//! configured-blocker payload handed to plan generation.

use uat_pilot::services::blocker::{BlockerDetector, BlockerNegotiator, NegotiationProgress};
use uat_pilot::services::blocker::NegotiationError;
use uat_pilot_core::backend::BlockerDetection;
use uat_pilot_core::{BlockerAction, BlockerType, ConnectionTestResult};

use super::support::{blocker, FakeBackend};

#[tokio::test]
async fn test_skip_both_yields_config_without_probes() {
    let backend = FakeBackend::new();
    let blockers = vec![
        blocker("blk-email", BlockerType::EmailVerification, "no sandbox"),
        blocker("blk-pay", BlockerType::PaymentGateway, "keys expired"),
    ];
    let mut negotiator = BlockerNegotiator::new("shop", blockers).unwrap();

    negotiator
        .select_action(BlockerAction::Skip, &backend)
        .await
        .unwrap();
    assert!(matches!(
        negotiator.next().unwrap(),
        NegotiationProgress::Advanced(1)
    ));

    negotiator
        .select_action(BlockerAction::Skip, &backend)
        .await
        .unwrap();
    let config = match negotiator.next().unwrap() {
        NegotiationProgress::Complete(config) => config,
        other => panic!("expected completion, got {:?}", other),
    };

    // No probe was ever invoked, and both resolutions carry skip.
    assert_eq!(backend.probe_calls(), 0);
    assert_eq!(config.action_for("blk-email"), Some(BlockerAction::Skip));
    assert_eq!(config.action_for("blk-pay"), Some(BlockerAction::Skip));
}

#[tokio::test]
async fn test_detection_feeds_negotiation() {
    let backend = FakeBackend::new();
    let mut not_detected = blocker("blk-sms", BlockerType::Sms, "n/a");
    not_detected.detected = false;

    *backend.detection.lock().unwrap() = Some(BlockerDetection {
        blockers_detected: 2,
        blockers: vec![
            blocker("blk-api", BlockerType::ExternalApi, "staging flapping"),
            not_detected,
        ],
        summary: "1 live blocker".to_string(),
    });

    let detection = BlockerDetector::detect(&backend, "shop", "/srv/shop")
        .await
        .unwrap();
    // The undetected entry is filtered and the count corrected.
    assert_eq!(detection.blockers_detected, 1);

    let mut negotiator = BlockerNegotiator::new("shop", detection.blockers).unwrap();
    negotiator
        .select_action(BlockerAction::Mock, &backend)
        .await
        .unwrap();
    let config = match negotiator.next().unwrap() {
        NegotiationProgress::Complete(config) => config,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(config.len(), 1);
    assert_eq!(config.action_for("blk-api"), Some(BlockerAction::Mock));
}

#[tokio::test]
async fn test_wait_gates_on_probe_until_retry_succeeds() {
    let backend = FakeBackend::new();
    backend.script_probe(Ok(ConnectionTestResult::failed("timeout after 5s")));
    backend.script_probe(Ok(ConnectionTestResult::failed("timeout after 5s")));
    backend.script_probe(Ok(ConnectionTestResult::ok("reachable")));

    let mut negotiator = BlockerNegotiator::new(
        "shop",
        vec![blocker("blk-api", BlockerType::ExternalApi, "flapping")],
    )
    .unwrap();

    negotiator
        .select_action(BlockerAction::Wait, &backend)
        .await
        .unwrap();
    assert!(matches!(
        negotiator.next(),
        Err(NegotiationError::NotReady(_))
    ));

    // Probe retries are unlimited; two more attempts get through.
    negotiator.retry_probe(&backend).await.unwrap();
    assert!(matches!(
        negotiator.next(),
        Err(NegotiationError::NotReady(_))
    ));
    negotiator.retry_probe(&backend).await.unwrap();

    let config = match negotiator.next().unwrap() {
        NegotiationProgress::Complete(config) => config,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(backend.probe_calls(), 3);

    let resolution = &config.resolutions[0];
    assert_eq!(resolution.action, BlockerAction::Wait);
    assert!(resolution.probe.as_ref().map(|p| p.success).unwrap_or(false));
}

#[tokio::test]
async fn test_every_commit_is_posted_once() {
    let backend = FakeBackend::new();
    let mut negotiator = BlockerNegotiator::new(
        "shop",
        vec![
            blocker("blk-db", BlockerType::DatabaseMigration, "pending"),
            blocker("blk-auth", BlockerType::AuthProvider, "IdP down"),
        ],
    )
    .unwrap();

    negotiator
        .select_action(BlockerAction::Mock, &backend)
        .await
        .unwrap();
    negotiator.next().unwrap();

    // Revisit the first blocker; nothing re-posts.
    negotiator.back().unwrap();
    negotiator.next().unwrap();

    negotiator
        .select_action(BlockerAction::Wait, &backend)
        .await
        .unwrap();
    negotiator.next().unwrap();

    assert_eq!(
        backend.responses(),
        vec![
            ("blk-db".to_string(), BlockerAction::Mock),
            ("blk-auth".to_string(), BlockerAction::Wait),
        ]
    );
}
