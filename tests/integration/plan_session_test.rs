//! Plan Session Integration Tests
//!
//! The conversational generate/modify/approve flow against the fake backend.

use uat_pilot::services::plan::{PlanSession, PlanSessionError, PlanStage};
use uat_pilot_core::backend::PlanningBackend;
use uat_pilot_core::{BackendError, BlockerConfig, ModificationType};

use super::support::{make_plan, FakeBackend};

fn ready_session() -> PlanSession {
    let mut session = PlanSession::new("shop");
    session.mark_ready(BlockerConfig::default()).unwrap();
    session
}

#[tokio::test]
async fn test_generate_then_approve() {
    let backend = FakeBackend::new();
    backend.script_plan(make_plan("cycle-1", &["login", "checkout", "refund"]));

    let mut session = ready_session();
    let draft = session.generate(&backend).await.unwrap();
    assert_eq!(draft.cycle_id, "cycle-1");
    assert_eq!(session.stage(), PlanStage::Proposal);

    let receipt = session.approve(&backend).await.unwrap();
    assert_eq!(receipt.tests_created, 3);
    assert_eq!(receipt.test_ids.len(), 3);
    assert_eq!(session.stage(), PlanStage::Confirmed);
}

#[tokio::test]
async fn test_approval_is_at_most_once() {
    let backend = FakeBackend::new();
    backend.script_plan(make_plan("cycle-1", &["a"]));

    let mut session = ready_session();
    session.generate(&backend).await.unwrap();
    session.approve(&backend).await.unwrap();

    // The confirmed session rejects the transition outright.
    let result = session.approve(&backend).await;
    assert!(matches!(
        result,
        Err(PlanSessionError::InvalidStage { .. })
    ));

    // And the backend contract also refuses a repeat for the cycle.
    let direct = backend.approve_plan("cycle-1").await;
    assert!(matches!(
        direct,
        Err(BackendError::AlreadyApproved(id)) if id == "cycle-1"
    ));
}

#[tokio::test]
async fn test_approve_without_draft_is_plan_not_found() {
    let backend = FakeBackend::new();
    backend.script_plan(make_plan("cycle-1", &["a"]));

    let mut session = ready_session();
    session.generate(&backend).await.unwrap();

    // The backend lost the draft (e.g. expired); approval fails fast and
    // the proposal stays current for the user to act on.
    backend.forget_cycle("cycle-1");
    let result = session.approve(&backend).await;
    assert!(matches!(
        result,
        Err(PlanSessionError::Backend(BackendError::PlanNotFound(id))) if id == "cycle-1"
    ));
    assert_eq!(session.stage(), PlanStage::Proposal);
}

#[tokio::test]
async fn test_modification_replaces_draft_wholesale() {
    let backend = FakeBackend::new();
    backend.script_plan(make_plan("cycle-1", &["login", "checkout"]));
    // The replacement shares no scenario ids with the original.
    backend.script_plan(make_plan("ignored", &["refund-flow"]));

    let mut session = ready_session();
    session.generate(&backend).await.unwrap();

    session.reject().unwrap();
    let draft = session
        .submit_feedback(&backend, "remove the login coverage", None)
        .await
        .unwrap();

    assert_eq!(draft.cycle_id, "cycle-1");
    assert_eq!(draft.scenario_ids(), vec!["refund-flow"]);
    assert_eq!(session.stage(), PlanStage::Proposal);

    // One draft of history is kept for the rollback display.
    assert_eq!(
        session.prior_draft().unwrap().scenario_ids(),
        vec!["login", "checkout"]
    );

    // The free text was classified client-side as a removal.
    let mods = backend.modifications();
    assert_eq!(mods.len(), 1);
    assert_eq!(mods[0].0, "cycle-1");
    assert_eq!(mods[0].1, ModificationType::RemoveTests);
}

#[tokio::test]
async fn test_explicit_modification_type_overrides_keywords() {
    let backend = FakeBackend::new();
    backend.script_plan(make_plan("cycle-1", &["a"]));
    backend.script_plan(make_plan("cycle-1", &["b"]));

    let mut session = ready_session();
    session.generate(&backend).await.unwrap();
    session.reject().unwrap();
    session
        .submit_feedback(
            &backend,
            "remove the login coverage",
            Some(ModificationType::AdjustJourneys),
        )
        .await
        .unwrap();

    let mods = backend.modifications();
    assert_eq!(mods[0].1, ModificationType::AdjustJourneys);
}

#[tokio::test]
async fn test_cancel_rejection_keeps_current_draft() {
    let backend = FakeBackend::new();
    backend.script_plan(make_plan("cycle-1", &["a", "b"]));

    let mut session = ready_session();
    session.generate(&backend).await.unwrap();

    session.reject().unwrap();
    assert_eq!(session.stage(), PlanStage::ConfirmingRejection);

    session.cancel_rejection().unwrap();
    assert_eq!(session.stage(), PlanStage::Proposal);
    assert_eq!(session.draft().unwrap().scenario_ids(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_rejection_loop_is_unbounded() {
    let backend = FakeBackend::new();
    backend.script_plan(make_plan("cycle-1", &["v1"]));
    backend.script_plan(make_plan("cycle-1", &["v2"]));
    backend.script_plan(make_plan("cycle-1", &["v3"]));

    let mut session = ready_session();
    session.generate(&backend).await.unwrap();

    for expected in ["v2", "v3"] {
        session.reject().unwrap();
        let draft = session
            .submit_feedback(&backend, "add more coverage", None)
            .await
            .unwrap();
        assert_eq!(draft.scenario_ids(), vec![expected]);
    }

    // Only the immediately prior draft survives each loop.
    assert_eq!(session.prior_draft().unwrap().scenario_ids(), vec!["v2"]);
}

#[tokio::test]
async fn test_generation_failure_stays_retryable() {
    let backend = FakeBackend::new();
    // An invalid draft (dependency cycle) is rejected client-side.
    let mut bad = make_plan("cycle-1", &["a", "b"]);
    bad.test_scenarios[0].dependencies = vec!["b".to_string()];
    bad.test_scenarios[1].dependencies = vec!["a".to_string()];
    backend.script_plan(bad);
    backend.script_plan(make_plan("cycle-1", &["a", "b"]));

    let mut session = ready_session();
    let result = session.generate(&backend).await;
    assert!(matches!(result, Err(PlanSessionError::InvalidPlan(_))));
    assert_eq!(session.stage(), PlanStage::Ready);

    // Retry succeeds from the same stage.
    session.generate(&backend).await.unwrap();
    assert_eq!(session.stage(), PlanStage::Proposal);
}
