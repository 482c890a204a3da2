//! # Operation Coordinator
//!
//! Runs the submit and check workflows. Each kind is single-flight and moves
//! through `Idle -> Running -> {Succeeded | Failed | Stale} -> Idle`.
//!
//! ## Workflow
//!
//! 1. Refuse if the kind is running, the input is invalid, or no signer is
//!    connected. Refusals make no phase transition.
//! 2. Capture the environment and enter `Running`.
//! 3. Make the engine ready for the captured network.
//! 4. Perform the ledger action (and the optional decryption).
//! 5. An action failure ends in `Failed`. Otherwise the live environment is
//!    compared with the captured one: a mismatch ends in `Stale` and leaves
//!    the committed handles untouched, a match commits and ends in
//!    `Succeeded`.
//! 6. Return to `Idle`.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use gc_telemetry::{
    metric_inc, metric_observe, OPERATIONS_COMMITTED, OPERATIONS_FAILED, OPERATIONS_REJECTED,
    OPERATIONS_STALE, OPERATIONS_STARTED, OPERATION_DURATION,
};

use super::crypto_manager::CryptoInstanceManager;
use super::identity_guard::IdentityGuard;
use crate::config::CoordinatorConfig;
use crate::domain::{
    invariant_commit_allowed, invariant_single_flight, CoordinatorError, CoordinatorResult,
    EnvironmentSnapshot, GlucoseReading, Handle, NetworkId, OperationKind, OperationOutcome,
    OperationPhase, OperationState, PhaseEvent, ResultStore, SignerId, SystemStatus,
};
use crate::ports::{GlucoseCheckApi, GlucoseLedger, WalletProvider};

/// Status message shown when a result is discarded.
pub const STALE_MESSAGE: &str = "Environment changed; result discarded";

#[derive(Debug, Default)]
struct OperationTable {
    submit: OperationState,
    check: OperationState,
}

impl OperationTable {
    fn get(&self, kind: OperationKind) -> &OperationState {
        match kind {
            OperationKind::Submit => &self.submit,
            OperationKind::Check => &self.check,
        }
    }

    fn get_mut(&mut self, kind: OperationKind) -> &mut OperationState {
        match kind {
            OperationKind::Submit => &mut self.submit,
            OperationKind::Check => &mut self.check,
        }
    }
}

/// What a completed action produced.
struct ActionResult {
    handle: Handle,
    decrypted: Option<bool>,
    note: Option<String>,
}

impl ActionResult {
    fn handle(handle: Handle) -> Self {
        Self {
            handle,
            decrypted: None,
            note: None,
        }
    }
}

/// An accepted request with the identity it runs under.
struct Admission<T> {
    snapshot: EnvironmentSnapshot,
    network_id: NetworkId,
    signer: SignerId,
    value: T,
}

/// Marks a kind as `Running` until finished or dropped.
///
/// Dropping it unfinished (the workflow future was dropped) returns the kind
/// to `Idle` so a new attempt can start.
struct RunningSlot<'a> {
    coordinator: &'a OperationCoordinator,
    kind: OperationKind,
    snapshot: EnvironmentSnapshot,
    network_id: NetworkId,
    signer: SignerId,
    started_at: Instant,
    finished: bool,
}

impl RunningSlot<'_> {
    fn finish(mut self, terminal: OperationPhase) {
        self.finished = true;
        metric_observe!(
            OPERATION_DURATION,
            &[self.kind.as_str()],
            self.started_at.elapsed().as_secs_f64()
        );
        self.coordinator.finish(self.kind, terminal);
    }
}

impl Drop for RunningSlot<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(kind = %self.kind, "Operation abandoned while running");
            self.coordinator.reset(self.kind);
        }
    }
}

/// Coordinates the submit and check workflows against the live environment.
pub struct OperationCoordinator {
    config: CoordinatorConfig,
    guard: IdentityGuard,
    engines: Arc<CryptoInstanceManager>,
    ledger: Arc<dyn GlucoseLedger>,
    store: RwLock<ResultStore>,
    operations: Mutex<OperationTable>,
    events: broadcast::Sender<PhaseEvent>,
}

impl OperationCoordinator {
    /// Create a coordinator.
    pub fn new(
        config: CoordinatorConfig,
        provider: Arc<dyn WalletProvider>,
        engines: Arc<CryptoInstanceManager>,
        ledger: Arc<dyn GlucoseLedger>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            store: RwLock::new(ResultStore::new(config.history_len)),
            guard: IdentityGuard::new(provider),
            operations: Mutex::new(OperationTable::default()),
            config,
            engines,
            ledger,
            events,
        }
    }

    /// Encrypt and submit a glucose value.
    #[instrument(skip(self), fields(kind = "submit"))]
    pub async fn submit(&self, raw_value: i64) -> CoordinatorResult<OperationOutcome> {
        let (slot, reading) =
            self.begin(OperationKind::Submit, || GlucoseReading::new(raw_value))?;
        self.run_submit(slot, reading).await
    }

    /// Parse user text, then submit it.
    #[instrument(skip(self), fields(kind = "submit"))]
    pub async fn submit_input(&self, input: &str) -> CoordinatorResult<OperationOutcome> {
        let (slot, reading) = self.begin(OperationKind::Submit, || GlucoseReading::parse(input))?;
        self.run_submit(slot, reading).await
    }

    /// Evaluate the risk predicate over the committed submission handle.
    ///
    /// With `disclose`, the risk handle is decrypted as well. A failed
    /// decryption is reported in the status message but does not fail the
    /// check.
    #[instrument(skip(self), fields(kind = "check"))]
    pub async fn check(&self, disclose: bool) -> CoordinatorResult<OperationOutcome> {
        let (slot, glucose) = self.begin(OperationKind::Check, || {
            let handle = self.store.read().submission_handle();
            if handle.is_empty() {
                Err(CoordinatorError::NoSubmission)
            } else {
                Ok(handle)
            }
        })?;
        self.store.write().set_message("Checking risk...");

        let result = self.perform_check(&slot, glucose, disclose).await;
        self.conclude(slot, result)
    }

    /// Make the engine ready for the current network ahead of any workflow.
    pub async fn prepare(&self) -> CoordinatorResult<()> {
        let network_id = self
            .guard
            .capture()
            .network_id()
            .ok_or(CoordinatorError::NotConnected)?;
        self.engines
            .ensure_ready(network_id)
            .await
            .map(|_| ())
            .map_err(CoordinatorError::Initialization)
    }

    /// Current phase of `kind`.
    pub fn phase(&self, kind: OperationKind) -> OperationPhase {
        self.operations.lock().get(kind).phase
    }

    /// Full state of `kind`.
    pub fn operation_state(&self, kind: OperationKind) -> OperationState {
        self.operations.lock().get(kind).clone()
    }

    /// Copy of the committed results.
    pub fn results(&self) -> ResultStore {
        self.store.read().clone()
    }

    /// Phase transitions, including the transient terminal phases.
    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.events.subscribe()
    }

    /// The engine manager this coordinator draws instances from.
    pub fn engines(&self) -> &Arc<CryptoInstanceManager> {
        &self.engines
    }

    /// Configuration in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Readiness derived from the wallet, the engine slot and the ledger.
    pub fn system_status(&self) -> SystemStatus {
        let snapshot = self.guard.capture();
        let network_id = match (snapshot.network_id(), snapshot.signer_id()) {
            (Some(network_id), Some(_)) => network_id,
            _ => return SystemStatus::WalletDisconnected,
        };
        if !self.engines.state().is_ready_for(network_id) {
            return SystemStatus::EngineInitializing;
        }
        if !self.ledger.is_deployed(network_id) {
            return SystemStatus::NotDeployed(network_id);
        }
        SystemStatus::Ready
    }

    /// Signer connected and no submit running.
    pub fn can_submit(&self) -> bool {
        self.guard.capture().is_connected() && !self.operations.lock().submit.is_running()
    }

    /// Signer connected, a submission committed and no check running.
    pub fn can_check(&self) -> bool {
        self.guard.capture().is_connected()
            && !self.operations.lock().check.is_running()
            && self.store.read().has_submission()
    }

    async fn run_submit(
        &self,
        slot: RunningSlot<'_>,
        reading: GlucoseReading,
    ) -> CoordinatorResult<OperationOutcome> {
        {
            let mut store = self.store.write();
            let entry = store.record_submission(reading);
            store.set_message("Submitting glucose...");
            debug!(sequence = entry.sequence, value = %reading, "Submission recorded");
        }

        let result = self.perform_submit(&slot, reading).await;
        self.conclude(slot, result)
    }

    /// Refuse or enter `Running`. Checks and transition happen under one lock.
    fn begin<T>(
        &self,
        kind: OperationKind,
        validate: impl FnOnce() -> CoordinatorResult<T>,
    ) -> CoordinatorResult<(RunningSlot<'_>, T)> {
        let admitted = {
            let mut operations = self.operations.lock();
            let state = operations.get_mut(kind);
            let admitted = self.admit(kind, state.phase, validate);
            if let Ok(admission) = &admitted {
                state.phase = OperationPhase::Running;
                state.started = Some(admission.snapshot.clone());
                state.attempts += 1;
                self.publish(kind, OperationPhase::Idle, OperationPhase::Running);
            }
            admitted
        };

        let admission = match admitted {
            Ok(admission) => admission,
            Err(error) => {
                debug!(kind = %kind, error = %error, "Operation refused");
                metric_inc!(OPERATIONS_REJECTED, &[kind.as_str(), error.label()]);
                return Err(error);
            }
        };

        info!(
            kind = %kind,
            network_id = %admission.network_id,
            signer = %admission.signer.as_str(),
            "Operation started"
        );
        metric_inc!(OPERATIONS_STARTED, &[kind.as_str()]);

        Ok((
            RunningSlot {
                coordinator: self,
                kind,
                snapshot: admission.snapshot,
                network_id: admission.network_id,
                signer: admission.signer,
                started_at: Instant::now(),
                finished: false,
            },
            admission.value,
        ))
    }

    /// Busy, then input, then connection.
    fn admit<T>(
        &self,
        kind: OperationKind,
        phase: OperationPhase,
        validate: impl FnOnce() -> CoordinatorResult<T>,
    ) -> CoordinatorResult<Admission<T>> {
        if !invariant_single_flight(phase) {
            return Err(CoordinatorError::Busy(kind));
        }
        let value = validate()?;
        let snapshot = self.guard.capture();
        let (network_id, signer) = match (snapshot.network_id(), snapshot.signer_id()) {
            (Some(network_id), Some(signer)) => (network_id, signer.clone()),
            _ => return Err(CoordinatorError::NotConnected),
        };
        Ok(Admission {
            snapshot,
            network_id,
            signer,
            value,
        })
    }

    async fn perform_submit(
        &self,
        slot: &RunningSlot<'_>,
        reading: GlucoseReading,
    ) -> CoordinatorResult<ActionResult> {
        let kind = OperationKind::Submit;
        let engine = self
            .engines
            .ensure_ready(slot.network_id)
            .await
            .map_err(CoordinatorError::Initialization)?;

        let input = engine
            .encrypt_u32(&slot.signer, u32::from(reading.mg_dl()))
            .await
            .map_err(|e| CoordinatorError::action(kind, e))?;

        let handle = self
            .ledger
            .submit_glucose(slot.network_id, &slot.signer, input)
            .await
            .map_err(|e| CoordinatorError::action(kind, e))?;

        Ok(ActionResult::handle(handle))
    }

    async fn perform_check(
        &self,
        slot: &RunningSlot<'_>,
        glucose: Handle,
        disclose: bool,
    ) -> CoordinatorResult<ActionResult> {
        let kind = OperationKind::Check;
        let engine = self
            .engines
            .ensure_ready(slot.network_id)
            .await
            .map_err(CoordinatorError::Initialization)?;

        let handle = self
            .ledger
            .check_risk(slot.network_id, &slot.signer, glucose)
            .await
            .map_err(|e| CoordinatorError::action(kind, e))?;

        let mut result = ActionResult::handle(handle);
        if disclose {
            match engine.decrypt_bool(&slot.signer, handle).await {
                Ok(high_risk) => result.decrypted = Some(high_risk),
                Err(e) => {
                    warn!(handle = %handle, error = %e, "Risk decryption failed");
                    result.note = Some(format!("decryption failed: {e}"));
                }
            }
        }
        Ok(result)
    }

    /// Record the terminal phase for a finished action.
    fn conclude(
        &self,
        slot: RunningSlot<'_>,
        result: CoordinatorResult<ActionResult>,
    ) -> CoordinatorResult<OperationOutcome> {
        let kind = slot.kind;

        let action = match result {
            Ok(action) => action,
            Err(error) => return Err(self.fail(slot, error)),
        };

        let unchanged = self.guard.still_valid(&slot.snapshot);
        if !invariant_commit_allowed(&action.handle, unchanged) {
            if action.handle.is_empty() {
                return Err(self.fail(slot, CoordinatorError::EmptyHandle(kind)));
            }
            info!(
                kind = %kind,
                started = %slot.snapshot,
                live = %self.guard.capture(),
                "Environment changed in flight; result discarded"
            );
            metric_inc!(OPERATIONS_STALE, &[kind.as_str()]);
            self.store.write().set_message(STALE_MESSAGE);
            slot.finish(OperationPhase::Stale);
            return Ok(OperationOutcome::Stale { kind });
        }

        {
            let mut store = self.store.write();
            if let Err(error) = store.commit(kind, action.handle) {
                drop(store);
                return Err(self.fail(slot, error));
            }
            if let Some(high_risk) = action.decrypted {
                store.set_decrypted(action.handle, high_risk);
            }
            store.set_message(self.success_message(kind, &action));
        }

        info!(kind = %kind, handle = %action.handle, "Result committed");
        metric_inc!(OPERATIONS_COMMITTED, &[kind.as_str()]);
        slot.finish(OperationPhase::Succeeded);

        Ok(OperationOutcome::Committed {
            kind,
            handle: action.handle,
            decrypted: action.decrypted,
        })
    }

    fn fail(&self, slot: RunningSlot<'_>, error: CoordinatorError) -> CoordinatorError {
        warn!(kind = %slot.kind, error = %error, "Operation failed");
        metric_inc!(OPERATIONS_FAILED, &[slot.kind.as_str(), error.label()]);
        self.store.write().set_message(error.to_string());
        slot.finish(OperationPhase::Failed);
        error
    }

    fn success_message(&self, kind: OperationKind, action: &ActionResult) -> String {
        let threshold = self.config.risk_threshold;
        match (kind, action.decrypted, &action.note) {
            (OperationKind::Submit, _, _) => "Glucose submitted".to_string(),
            (OperationKind::Check, Some(true), _) => format!("Risk: HIGH (> {threshold} mg/dL)"),
            (OperationKind::Check, Some(false), _) => {
                format!("Risk: NORMAL (<= {threshold} mg/dL)")
            }
            (OperationKind::Check, None, Some(note)) => format!("Risk checked; {note}"),
            (OperationKind::Check, None, None) => "Risk checked".to_string(),
        }
    }

    /// Running -> terminal -> Idle.
    fn finish(&self, kind: OperationKind, terminal: OperationPhase) {
        let mut operations = self.operations.lock();
        let state = operations.get_mut(kind);
        state.last_terminal = Some(terminal);
        state.phase = OperationPhase::Idle;
        state.started = None;
        // Published under the lock so the next attempt's Idle -> Running
        // cannot overtake them.
        self.publish(kind, OperationPhase::Running, terminal);
        self.publish(kind, terminal, OperationPhase::Idle);
    }

    /// Running -> Idle without a terminal phase.
    fn reset(&self, kind: OperationKind) {
        let mut operations = self.operations.lock();
        let state = operations.get_mut(kind);
        state.phase = OperationPhase::Idle;
        state.started = None;
        self.publish(kind, OperationPhase::Running, OperationPhase::Idle);
    }

    fn publish(&self, kind: OperationKind, from: OperationPhase, to: OperationPhase) {
        debug!(kind = %kind, from = %from, to = %to, "Phase transition");
        // No receivers is fine.
        let _ = self.events.send(PhaseEvent { kind, from, to });
    }
}

#[async_trait]
impl GlucoseCheckApi for OperationCoordinator {
    async fn submit(&self, raw_value: i64) -> CoordinatorResult<OperationOutcome> {
        OperationCoordinator::submit(self, raw_value).await
    }

    async fn submit_input(&self, input: &str) -> CoordinatorResult<OperationOutcome> {
        OperationCoordinator::submit_input(self, input).await
    }

    async fn check(&self, disclose: bool) -> CoordinatorResult<OperationOutcome> {
        OperationCoordinator::check(self, disclose).await
    }

    fn phase(&self, kind: OperationKind) -> OperationPhase {
        OperationCoordinator::phase(self, kind)
    }

    fn results(&self) -> ResultStore {
        OperationCoordinator::results(self)
    }

    fn system_status(&self) -> SystemStatus {
        OperationCoordinator::system_status(self)
    }

    fn can_submit(&self) -> bool {
        OperationCoordinator::can_submit(self)
    }

    fn can_check(&self) -> bool {
        OperationCoordinator::can_check(self)
    }
}
