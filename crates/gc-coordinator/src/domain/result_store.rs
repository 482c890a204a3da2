//! # Result Store
//!
//! Last committed handle per workflow kind, the recent accepted inputs and a
//! free-form status message for display.
//!
//! `commit` is the only way a handle changes besides `clear`. Submit and check
//! results live in separate fields so the two kinds never contend.

use std::collections::VecDeque;

use super::entities::{GlucoseSubmission, RiskResult};
use super::errors::{CoordinatorError, CoordinatorResult};
use super::invariants::DEFAULT_HISTORY_LEN;
use super::value_objects::{GlucoseReading, Handle, OperationKind};

/// Committed results and display state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultStore {
    submission: Handle,
    risk: RiskResult,
    message: String,
    recent: VecDeque<GlucoseSubmission>,
    history_len: usize,
    next_sequence: u64,
}

impl ResultStore {
    /// Empty store keeping `history_len` recent submissions.
    pub fn new(history_len: usize) -> Self {
        Self {
            submission: Handle::EMPTY,
            risk: RiskResult::default(),
            message: String::new(),
            recent: VecDeque::with_capacity(history_len),
            history_len,
            next_sequence: 0,
        }
    }

    /// Replace the handle for `kind`. The sentinel is refused.
    ///
    /// A new risk handle resets any previously disclosed value.
    pub fn commit(&mut self, kind: OperationKind, handle: Handle) -> CoordinatorResult<()> {
        if handle.is_empty() {
            return Err(CoordinatorError::EmptyHandle(kind));
        }
        match kind {
            OperationKind::Submit => self.submission = handle,
            OperationKind::Check => {
                self.risk = RiskResult {
                    handle,
                    decrypted: None,
                }
            }
        }
        Ok(())
    }

    /// Attach a disclosed value to the current risk handle.
    ///
    /// Ignored if `handle` is no longer the committed one.
    pub fn set_decrypted(&mut self, handle: Handle, high_risk: bool) -> bool {
        if handle.is_empty() || self.risk.handle != handle {
            return false;
        }
        self.risk.decrypted = Some(high_risk);
        true
    }

    /// Drop every committed handle and the message. History is kept.
    pub fn clear(&mut self) {
        self.submission = Handle::EMPTY;
        self.risk = RiskResult::default();
        self.message.clear();
    }

    /// Record an accepted input and return it with its sequence number.
    pub fn record_submission(&mut self, reading: GlucoseReading) -> GlucoseSubmission {
        self.next_sequence += 1;
        let entry = GlucoseSubmission {
            raw_value: reading.mg_dl(),
            sequence: self.next_sequence,
        };
        if self.history_len > 0 {
            while self.recent.len() >= self.history_len {
                self.recent.pop_front();
            }
            self.recent.push_back(entry);
        }
        entry
    }

    /// Handle for `kind`, `Handle::EMPTY` if none.
    pub fn handle(&self, kind: OperationKind) -> Handle {
        match kind {
            OperationKind::Submit => self.submission,
            OperationKind::Check => self.risk.handle,
        }
    }

    /// True if `kind` holds a real handle.
    pub fn has_value(&self, kind: OperationKind) -> bool {
        !self.handle(kind).is_empty()
    }

    /// True once a submission handle was committed.
    pub fn has_submission(&self) -> bool {
        self.has_value(OperationKind::Submit)
    }

    /// True once a risk handle was committed.
    pub fn has_risk_result(&self) -> bool {
        self.has_value(OperationKind::Check)
    }

    /// Committed submission handle.
    pub fn submission_handle(&self) -> Handle {
        self.submission
    }

    /// Committed risk result.
    pub fn risk_result(&self) -> RiskResult {
        self.risk
    }

    /// Status message for display.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Replace the status message.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// Recent accepted inputs, oldest first.
    pub fn recent_submissions(&self) -> impl Iterator<Item = &GlucoseSubmission> {
        self.recent.iter()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(byte: u8) -> Handle {
        Handle::from_bytes([byte; 32])
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = ResultStore::default();
        assert!(!store.has_submission());
        assert!(!store.has_risk_result());
        assert_eq!(store.message(), "");
    }

    #[test]
    fn test_commit_supersedes() {
        let mut store = ResultStore::default();
        store.commit(OperationKind::Submit, handle(1)).unwrap();
        store.commit(OperationKind::Submit, handle(2)).unwrap();
        assert_eq!(store.submission_handle(), handle(2));
        assert!(!store.has_risk_result());
    }

    #[test]
    fn test_commit_rejects_sentinel() {
        let mut store = ResultStore::default();
        store.commit(OperationKind::Check, handle(3)).unwrap();
        let err = store.commit(OperationKind::Check, Handle::EMPTY).unwrap_err();
        assert_eq!(err, CoordinatorError::EmptyHandle(OperationKind::Check));
        assert_eq!(store.risk_result().handle, handle(3));
    }

    #[test]
    fn test_decrypted_tracks_current_handle() {
        let mut store = ResultStore::default();
        store.commit(OperationKind::Check, handle(4)).unwrap();
        assert!(store.set_decrypted(handle(4), true));
        assert_eq!(store.risk_result().decrypted, Some(true));

        assert!(!store.set_decrypted(handle(5), false));
        assert_eq!(store.risk_result().decrypted, Some(true));

        store.commit(OperationKind::Check, handle(6)).unwrap();
        assert_eq!(store.risk_result().decrypted, None);
    }

    #[test]
    fn test_clear() {
        let mut store = ResultStore::default();
        store.commit(OperationKind::Submit, handle(1)).unwrap();
        store.commit(OperationKind::Check, handle(2)).unwrap();
        store.set_message("done");
        store.clear();
        assert!(!store.has_submission());
        assert!(!store.has_risk_result());
        assert_eq!(store.message(), "");
    }

    #[test]
    fn test_history_bounded_and_ordered() {
        let mut store = ResultStore::new(3);
        for v in [90, 100, 110, 150] {
            store.record_submission(GlucoseReading::new(v).unwrap());
        }
        let values: Vec<u16> = store.recent_submissions().map(|s| s.raw_value).collect();
        assert_eq!(values, vec![100, 110, 150]);
        let sequences: Vec<u64> = store.recent_submissions().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![2, 3, 4]);
    }

    #[test]
    fn test_history_disabled() {
        let mut store = ResultStore::new(0);
        let entry = store.record_submission(GlucoseReading::new(80).unwrap());
        assert_eq!(entry.sequence, 1);
        assert_eq!(store.recent_submissions().count(), 0);
    }
}
