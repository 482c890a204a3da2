//! # Domain Invariants
//!
//! Rules that must hold for every committed result.

use super::entities::OperationPhase;
use super::value_objects::Handle;

/// Lowest accepted glucose value (mg/dL).
pub const MIN_GLUCOSE_MG_DL: u16 = 1;

/// Highest accepted glucose value (mg/dL).
pub const MAX_GLUCOSE_MG_DL: u16 = 1000;

/// Values strictly above this are reported as high risk.
pub const RISK_THRESHOLD_MG_DL: u16 = 140;

/// Default number of recent submissions kept for display.
pub const DEFAULT_HISTORY_LEN: usize = 3;

/// Invariant: accepted readings lie in `MIN..=MAX`.
pub fn invariant_glucose_range(raw: i64) -> bool {
    (i64::from(MIN_GLUCOSE_MG_DL)..=i64::from(MAX_GLUCOSE_MG_DL)).contains(&raw)
}

/// Invariant: at most one running operation per kind.
pub fn invariant_single_flight(current: OperationPhase) -> bool {
    current != OperationPhase::Running
}

/// Invariant: a result may be committed only if the action produced a real
/// handle and the live environment still matches the one it started under.
pub fn invariant_commit_allowed(handle: &Handle, environment_unchanged: bool) -> bool {
    !handle.is_empty() && environment_unchanged
}
