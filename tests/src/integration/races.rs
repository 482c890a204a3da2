//! # Race Scenarios
//!
//! Workflows suspended inside a collaborator while the wallet changes
//! network or account, and concurrent callers on the shared engine slot.
//!
//! Each test arms a `CallGate` on the ledger or the bootstrapper, waits until
//! the workflow is held there, changes the environment and releases it.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gc_coordinator::{
        CoordinatorError, EngineError, EngineStatus, OperationKind, OperationOutcome,
        OperationPhase, STALE_MESSAGE,
    };

    use crate::integration::fixtures::{terminal_phases, world, ALICE, AWAY, BOB, HOME};

    async fn wait_for_engine(w: &crate::integration::fixtures::World, status: EngineStatus) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while w.engines.state().status != status {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("engine state should settle");
    }

    // =============================================================================
    // SINGLE-FLIGHT
    // =============================================================================

    /// Second submit while the first is in flight is refused; one commit.
    #[tokio::test]
    async fn test_double_submit_is_busy() {
        let w = world();
        let mut gate = w.ledger.gate().arm();

        let c = w.coordinator.clone();
        let first = tokio::spawn(async move { c.submit(110).await });
        gate.entered().await;

        assert_eq!(w.coordinator.phase(OperationKind::Submit), OperationPhase::Running);
        assert_eq!(
            w.coordinator.submit(120).await,
            Err(CoordinatorError::Busy(OperationKind::Submit))
        );

        gate.release();
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.is_committed());
        assert_eq!(w.ledger.submission_count(), 1);
        assert_eq!(
            w.coordinator.results().submission_handle(),
            outcome.handle().unwrap()
        );
        assert_eq!(w.coordinator.operation_state(OperationKind::Submit).attempts, 1);
    }

    /// Submit and check are independent kinds.
    #[tokio::test]
    async fn test_check_runs_while_submit_in_flight() {
        let w = world();
        let first = w.coordinator.submit(100).await.unwrap().handle().unwrap();

        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let second = tokio::spawn(async move { c.submit(200).await });
        gate.entered().await;

        // Uses the committed submission, not the one in flight.
        assert!(w.coordinator.can_check());
        let check = w.coordinator.check(true).await.unwrap();
        assert!(matches!(
            check,
            OperationOutcome::Committed {
                decrypted: Some(false),
                ..
            }
        ));
        assert_eq!(w.coordinator.results().submission_handle(), first);

        gate.release();
        let second = second.await.unwrap().unwrap().handle().unwrap();
        assert_eq!(w.coordinator.results().submission_handle(), second);
    }

    // =============================================================================
    // STALENESS
    // =============================================================================

    /// Network change mid-submit: Stale, store unchanged.
    #[tokio::test]
    async fn test_network_switch_mid_submit_is_stale() {
        let w = world();
        w.coordinator.submit(100).await.unwrap();
        let before = w.coordinator.results();

        let mut rx = w.coordinator.subscribe();
        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.submit(250).await });
        gate.entered().await;

        w.wallet.switch_network(AWAY);
        gate.release();

        assert_eq!(
            task.await.unwrap(),
            Ok(OperationOutcome::Stale {
                kind: OperationKind::Submit
            })
        );
        let after = w.coordinator.results();
        assert_eq!(after.submission_handle(), before.submission_handle());
        assert_eq!(after.risk_result(), before.risk_result());
        assert_eq!(after.message(), STALE_MESSAGE);
        assert_eq!(terminal_phases(&mut rx), vec![OperationPhase::Stale]);

        // The transaction itself went through.
        assert_eq!(w.ledger.submission_count(), 2);
    }

    #[tokio::test]
    async fn test_account_switch_mid_submit_is_stale() {
        let w = world();
        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.submit(100).await });
        gate.entered().await;

        w.wallet.switch_account(BOB);
        gate.release();

        assert!(task.await.unwrap().unwrap().is_stale());
        assert!(!w.coordinator.results().has_submission());
    }

    #[tokio::test]
    async fn test_account_case_change_is_not_stale() {
        let w = world();
        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.submit(100).await });
        gate.entered().await;

        w.wallet.switch_account(ALICE.to_lowercase());
        gate.release();

        assert!(task.await.unwrap().unwrap().is_committed());
    }

    /// Switch away and back before completion: the environment matches again.
    #[tokio::test]
    async fn test_round_trip_switch_commits() {
        let w = world();
        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.submit(100).await });
        gate.entered().await;

        w.wallet.switch_network(AWAY);
        w.wallet.switch_network(HOME);
        gate.release();

        assert!(task.await.unwrap().unwrap().is_committed());
    }

    #[tokio::test]
    async fn test_disconnect_mid_submit_is_stale() {
        let w = world();
        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.submit(100).await });
        gate.entered().await;

        w.wallet.disconnect();
        gate.release();

        assert!(task.await.unwrap().unwrap().is_stale());
        assert!(!w.coordinator.can_submit());
    }

    /// Network change while the engine is still bootstrapping.
    #[tokio::test]
    async fn test_network_switch_during_bootstrap() {
        let w = world();
        let mut gate = w.bootstrapper.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.submit(100).await });
        gate.entered().await;
        assert_eq!(w.engines.state().status, EngineStatus::Initializing);

        w.wallet.switch_network(AWAY);
        wait_for_engine(&w, EngineStatus::Uninitialized).await;
        gate.release();

        assert!(task.await.unwrap().unwrap().is_stale());
        // The late bootstrap did not claim the slot.
        assert_eq!(w.engines.state().status, EngineStatus::Uninitialized);
        assert!(!w.coordinator.results().has_submission());
    }

    /// Network change mid-check, then back: the next check succeeds.
    #[tokio::test]
    async fn test_stale_check_then_retry_after_switch_back() {
        let w = world();
        w.coordinator.submit(180).await.unwrap();
        let submission = w.coordinator.results().submission_handle();

        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.check(true).await });
        gate.entered().await;

        w.wallet.switch_network(AWAY);
        gate.release();
        assert_eq!(
            task.await.unwrap(),
            Ok(OperationOutcome::Stale {
                kind: OperationKind::Check
            })
        );
        assert!(!w.coordinator.results().has_risk_result());

        w.wallet.switch_network(HOME);
        let outcome = w.coordinator.check(true).await.unwrap();
        assert!(matches!(
            outcome,
            OperationOutcome::Committed {
                kind: OperationKind::Check,
                decrypted: Some(true),
                ..
            }
        ));

        let results = w.coordinator.results();
        assert!(results.has_risk_result());
        assert_eq!(results.submission_handle(), submission);
        assert_eq!(results.risk_result().decrypted, Some(true));
        assert_eq!(w.coordinator.phase(OperationKind::Check), OperationPhase::Idle);
    }

    /// Second check while the first is in flight is refused.
    #[tokio::test]
    async fn test_double_check_is_busy() {
        let w = world();
        w.coordinator.submit(150).await.unwrap();

        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let first = tokio::spawn(async move { c.check(false).await });
        gate.entered().await;

        assert!(!w.coordinator.can_check());
        assert_eq!(
            w.coordinator.check(true).await,
            Err(CoordinatorError::Busy(OperationKind::Check))
        );
        // Submit is a separate kind.
        assert!(w.coordinator.can_submit());

        gate.release();
        assert!(first.await.unwrap().unwrap().is_committed());
        assert_eq!(w.coordinator.operation_state(OperationKind::Check).attempts, 1);
    }

    /// A stale check leaves the previously committed risk result intact,
    /// disclosed value included.
    #[tokio::test]
    async fn test_stale_check_keeps_prior_risk_result() {
        let w = world();
        w.coordinator.submit(220).await.unwrap();
        w.coordinator.check(true).await.unwrap();
        let before = w.coordinator.results().risk_result();
        assert_eq!(before.decrypted, Some(true));

        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.check(true).await });
        gate.entered().await;
        w.wallet.switch_network(AWAY);
        gate.release();

        assert_eq!(
            task.await.unwrap(),
            Ok(OperationOutcome::Stale {
                kind: OperationKind::Check
            })
        );
        assert_eq!(w.coordinator.results().risk_result(), before);
    }

    /// Account change mid-check, network unchanged.
    #[tokio::test]
    async fn test_account_switch_mid_check_is_stale() {
        let w = world();
        w.coordinator.submit(100).await.unwrap();
        let submission = w.coordinator.results().submission_handle();

        let mut rx = w.coordinator.subscribe();
        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.check(false).await });
        gate.entered().await;
        w.wallet.switch_account(BOB);
        gate.release();

        assert!(task.await.unwrap().unwrap().is_stale());
        assert_eq!(terminal_phases(&mut rx), vec![OperationPhase::Stale]);

        let results = w.coordinator.results();
        assert!(!results.has_risk_result());
        assert_eq!(results.submission_handle(), submission);
        assert_eq!(results.message(), STALE_MESSAGE);
        // Same network, so the engine was not torn down.
        assert!(w.engines.state().is_ready_for(HOME));
    }

    /// A stale submit leaves no handle to check, even though the ledger
    /// stored the value.
    #[tokio::test]
    async fn test_stale_submit_is_not_checkable() {
        let w = world();
        let mut gate = w.ledger.gate().arm();
        let c = w.coordinator.clone();
        let task = tokio::spawn(async move { c.submit(100).await });
        gate.entered().await;
        w.wallet.switch_network(AWAY);
        gate.release();
        assert!(task.await.unwrap().unwrap().is_stale());

        w.wallet.switch_network(HOME);
        assert_eq!(w.ledger.submission_count(), 1);
        assert!(!w.coordinator.can_check());
        assert_eq!(
            w.coordinator.check(false).await,
            Err(CoordinatorError::NoSubmission)
        );
    }

    // =============================================================================
    // SHARED ENGINE SLOT
    // =============================================================================

    /// Concurrent callers on one network share one bootstrap.
    #[tokio::test]
    async fn test_concurrent_callers_share_bootstrap() {
        let w = world();
        let mut gate = w.bootstrapper.gate().arm();

        let c = w.coordinator.clone();
        let submit = tokio::spawn(async move { c.submit(100).await });
        gate.entered().await;

        let c = w.coordinator.clone();
        let warm = tokio::spawn(async move { c.prepare().await });
        let engines = w.engines.clone();
        let direct = tokio::spawn(async move { engines.ensure_ready(HOME).await });
        tokio::task::yield_now().await;
        gate.release();

        let (submit, warm, direct) = futures::join!(submit, warm, direct);
        assert!(submit.unwrap().unwrap().is_committed());
        assert_eq!(warm.unwrap(), Ok(()));
        assert_eq!(direct.unwrap().unwrap().network_id(), HOME);
        assert_eq!(w.bootstrapper.attempts(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_bootstrap_failure() {
        let w = world();
        w.bootstrapper.fail_network(HOME, "coprocessor offline");
        let mut gate = w.bootstrapper.gate().arm();

        let c = w.coordinator.clone();
        let submit = tokio::spawn(async move { c.submit(100).await });
        gate.entered().await;
        let c = w.coordinator.clone();
        let warm = tokio::spawn(async move { c.prepare().await });
        tokio::task::yield_now().await;
        gate.release();

        let expected = EngineError::Bootstrap {
            network_id: HOME,
            reason: "coprocessor offline".into(),
        };
        assert_eq!(
            submit.await.unwrap(),
            Err(CoordinatorError::Initialization(expected.clone()))
        );
        assert_eq!(
            warm.await.unwrap(),
            Err(CoordinatorError::Initialization(expected.clone()))
        );
        assert_eq!(w.bootstrapper.attempts(), 1);
        assert_eq!(w.engines.state().last_error, Some(expected));
    }

    /// Every switch away from the engine's network forces a new bootstrap.
    #[tokio::test]
    async fn test_engine_follows_network() {
        let w = world();
        w.coordinator.submit(100).await.unwrap();
        assert!(w.engines.state().is_ready_for(HOME));

        w.wallet.switch_network(AWAY);
        wait_for_engine(&w, EngineStatus::Uninitialized).await;
        w.coordinator.submit(100).await.unwrap();
        assert!(w.engines.state().is_ready_for(AWAY));

        w.wallet.switch_network(HOME);
        wait_for_engine(&w, EngineStatus::Uninitialized).await;
        w.coordinator.submit(100).await.unwrap();
        assert_eq!(w.bootstrapper.attempts(), 3);
    }
}
