//! # Inbound Ports
//!
//! API the presentation layer drives.

use async_trait::async_trait;

use crate::domain::{
    CoordinatorResult, OperationKind, OperationOutcome, OperationPhase, ResultStore, SystemStatus,
};

/// Glucose check API - inbound port.
#[async_trait]
pub trait GlucoseCheckApi: Send + Sync {
    /// Encrypt and submit a glucose value.
    ///
    /// Out-of-range values and a running submit are rejected before any
    /// phase transition.
    async fn submit(&self, raw_value: i64) -> CoordinatorResult<OperationOutcome>;

    /// Parse user text, then behave like `submit`.
    async fn submit_input(&self, input: &str) -> CoordinatorResult<OperationOutcome>;

    /// Run the risk predicate over the committed submission.
    ///
    /// With `disclose`, the resulting handle is also decrypted.
    async fn check(&self, disclose: bool) -> CoordinatorResult<OperationOutcome>;

    /// Current phase of a workflow kind.
    fn phase(&self, kind: OperationKind) -> OperationPhase;

    /// Copy of the committed results.
    fn results(&self) -> ResultStore;

    /// Readiness for display.
    fn system_status(&self) -> SystemStatus;

    /// Submit affordance: signer connected and no submit in flight.
    fn can_submit(&self) -> bool;

    /// Check affordance: signer connected, a submission committed, no check
    /// in flight.
    fn can_check(&self) -> bool;
}
