//! # Integration Test Flows
//!
//! End-to-end workflows with a stable environment: input validation, the
//! submit -> check pipeline, failure reporting and readiness derivation.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::sync::Arc;

    use gc_coordinator::domain::ActionFailure;
    use gc_coordinator::{
        CoordinatorError, EngineError, EngineStatus, GlucoseCheckApi, LedgerError,
        OperationKind, OperationOutcome, OperationPhase, SignerId, SystemStatus,
    };

    use crate::integration::fixtures::{ensure_metrics, terminal_phases, world, ALICE, AWAY, HOME};

    // =============================================================================
    // INPUT VALIDATION
    // =============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Accepted iff 1 <= v <= 1000; rejections make no transition.
        #[test]
        fn submit_accepts_exactly_the_valid_range(
            raw in prop_oneof![any::<i64>(), -10i64..1100]
        ) {
            let (result, terminals, attempts) = tokio_test::block_on(async {
                let w = world();
                let mut rx = w.coordinator.subscribe();
                let result = w.coordinator.submit(raw).await;
                let terminals = terminal_phases(&mut rx);
                let attempts = w.coordinator.operation_state(OperationKind::Submit).attempts;
                (result, terminals, attempts)
            });

            if (1..=1000).contains(&raw) {
                prop_assert!(result.map(|o| o.is_committed()).unwrap_or(false));
                prop_assert_eq!(terminals, vec![OperationPhase::Succeeded]);
                prop_assert_eq!(attempts, 1);
            } else {
                let is_validation = matches!(result, Err(CoordinatorError::Validation { .. }));
                prop_assert!(is_validation);
                prop_assert!(terminals.is_empty());
                prop_assert_eq!(attempts, 0);
            }
        }
    }

    #[tokio::test]
    async fn test_boundary_values() {
        let w = world();
        for raw in [0, 1001] {
            assert!(matches!(
                w.coordinator.submit(raw).await,
                Err(CoordinatorError::Validation { .. })
            ));
        }
        for raw in [140, 1] {
            assert!(w.coordinator.submit(raw).await.unwrap().is_committed());
        }
        assert_eq!(w.ledger.submission_count(), 2);
    }

    #[tokio::test]
    async fn test_text_input_through_api() {
        let w = world();
        let api: Arc<dyn GlucoseCheckApi> = w.coordinator.clone();

        assert!(api.submit_input("not a number").await.is_err());
        assert!(!api.can_check());

        assert!(api.submit_input("95").await.unwrap().is_committed());
        assert!(api.can_check());
        assert!(api.can_submit());
        assert_eq!(api.phase(OperationKind::Submit), OperationPhase::Idle);
    }

    // =============================================================================
    // SUBMIT -> CHECK
    // =============================================================================

    /// Both handles committed and distinct from the sentinel.
    #[tokio::test]
    async fn test_submit_then_check_commits_both_handles() {
        let w = world();
        let submit = w.coordinator.submit(120).await.unwrap();
        let check = w.coordinator.check(false).await.unwrap();

        let results = w.coordinator.results();
        assert!(results.has_submission());
        assert!(results.has_risk_result());
        assert_eq!(submit.handle(), Some(results.submission_handle()));
        assert_eq!(check.handle(), Some(results.risk_result().handle));
        assert_ne!(results.submission_handle(), results.risk_result().handle);
        assert_eq!(results.risk_result().decrypted, None);
        assert_eq!(results.message(), "Risk checked");

        // Undisclosed, but the stored flag still says normal for 120.
        let alice = SignerId::new(ALICE);
        assert_eq!(
            w.coprocessor.reveal_bool(HOME, &alice, results.risk_result().handle),
            Ok(false)
        );
    }

    #[tokio::test]
    async fn test_disclosed_risk_matches_threshold() {
        let w = world();
        for (value, high) in [(139, false), (140, false), (141, true), (400, true)] {
            w.coordinator.submit(value).await.unwrap();
            let outcome = w.coordinator.check(true).await.unwrap();
            assert_eq!(
                outcome,
                OperationOutcome::Committed {
                    kind: OperationKind::Check,
                    handle: w.coordinator.results().risk_result().handle,
                    decrypted: Some(high),
                },
                "value {value}"
            );
        }
        let recent: Vec<u16> = w
            .coordinator
            .results()
            .recent_submissions()
            .map(|s| s.raw_value)
            .collect();
        assert_eq!(recent, vec![140, 141, 400]);
    }

    #[tokio::test]
    async fn test_new_check_resets_disclosure() {
        let w = world();
        w.coordinator.submit(300).await.unwrap();
        w.coordinator.check(true).await.unwrap();
        assert_eq!(w.coordinator.results().risk_result().decrypted, Some(true));

        w.coordinator.check(false).await.unwrap();
        assert_eq!(w.coordinator.results().risk_result().decrypted, None);
    }

    // =============================================================================
    // FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_contract_missing_is_action_failure() {
        let w = world();
        w.ledger.undeploy(HOME);
        let mut rx = w.coordinator.subscribe();

        let err = w.coordinator.submit(100).await.unwrap_err();
        match err {
            CoordinatorError::Action { kind, source } => {
                assert_eq!(kind, OperationKind::Submit);
                assert_eq!(source, ActionFailure::from(LedgerError::NotDeployed(HOME)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(terminal_phases(&mut rx), vec![OperationPhase::Failed]);
        assert_eq!(w.coordinator.system_status(), SystemStatus::NotDeployed(HOME));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_then_retry() {
        let w = world();
        w.bootstrapper.fail_network(HOME, "relayer unreachable");

        let err = w.coordinator.submit(100).await.unwrap_err();
        assert_eq!(
            err,
            CoordinatorError::Initialization(EngineError::Bootstrap {
                network_id: HOME,
                reason: "relayer unreachable".into(),
            })
        );
        assert_eq!(w.engines.state().status, EngineStatus::Error);
        assert_eq!(w.coordinator.system_status(), SystemStatus::EngineInitializing);

        w.bootstrapper.clear_failures();
        assert!(w.coordinator.submit(100).await.unwrap().is_committed());
        assert_eq!(w.bootstrapper.attempts(), 2);
    }

    #[tokio::test]
    async fn test_failed_check_keeps_previous_result() {
        let w = world();
        w.coordinator.submit(200).await.unwrap();
        w.coordinator.check(false).await.unwrap();
        let before = w.coordinator.results().risk_result();

        w.ledger.fail_next(LedgerError::Rejected("user denied".into()));
        assert!(w.coordinator.check(false).await.is_err());
        assert_eq!(w.coordinator.results().risk_result(), before);
    }

    // =============================================================================
    // READINESS AND TELEMETRY
    // =============================================================================

    #[tokio::test]
    async fn test_system_status_follows_wallet() {
        let w = world();
        assert_eq!(w.coordinator.system_status(), SystemStatus::EngineInitializing);

        w.coordinator.prepare().await.unwrap();
        assert_eq!(w.coordinator.system_status(), SystemStatus::Ready);
        assert_eq!(
            w.coordinator.system_status().to_string(),
            "Ready for glucose assessment"
        );

        w.wallet.disconnect();
        assert_eq!(w.coordinator.system_status(), SystemStatus::WalletDisconnected);
        assert!(!w.coordinator.can_submit());

        w.wallet.connect(AWAY, ALICE);
        assert_eq!(w.coordinator.system_status(), SystemStatus::EngineInitializing);
    }

    #[tokio::test]
    async fn test_metrics_exported() {
        ensure_metrics();
        let w = world();
        w.coordinator.submit(100).await.unwrap();
        let _ = w.coordinator.submit(0).await;

        let text = gc_telemetry::encode_metrics().unwrap();
        assert!(text.contains("gc_operations_committed_total"));
        assert!(text.contains("gc_operations_rejected_total"));
        assert!(text.contains("gc_engine_bootstraps_total"));
    }
}
