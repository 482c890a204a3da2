//! # Domain Entities
//!
//! Workflow phases, engine lifecycle state and the records the result store
//! keeps.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::EngineError;
use super::value_objects::{EnvironmentSnapshot, Handle, NetworkId, OperationKind};

/// Phase of one workflow kind.
///
/// `Idle -> Running -> {Succeeded | Failed | Stale} -> Idle`. Terminal phases
/// are transient signals; the resting state is always `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationPhase {
    /// Ready for a new attempt.
    Idle,
    /// An attempt is in flight.
    Running,
    /// The result was committed.
    Succeeded,
    /// The attempt failed.
    Failed,
    /// The environment changed in flight; the result was dropped.
    Stale,
}

impl OperationPhase {
    /// Succeeded, Failed or Stale.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationPhase::Succeeded | OperationPhase::Failed | OperationPhase::Stale
        )
    }

    /// Lower-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationPhase::Idle => "idle",
            OperationPhase::Running => "running",
            OperationPhase::Succeeded => "succeeded",
            OperationPhase::Failed => "failed",
            OperationPhase::Stale => "stale",
        }
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind workflow state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationState {
    /// Current phase.
    pub phase: OperationPhase,
    /// Snapshot captured when the running attempt started.
    pub started: Option<EnvironmentSnapshot>,
    /// Terminal phase of the most recent finished attempt.
    pub last_terminal: Option<OperationPhase>,
    /// Attempts that reached `Running`.
    pub attempts: u64,
}

impl OperationState {
    /// Fresh idle state.
    pub fn new() -> Self {
        Self {
            phase: OperationPhase::Idle,
            started: None,
            last_terminal: None,
            attempts: 0,
        }
    }

    /// True while an attempt is in flight.
    pub fn is_running(&self) -> bool {
        self.phase == OperationPhase::Running
    }
}

impl Default for OperationState {
    fn default() -> Self {
        Self::new()
    }
}

/// One phase transition, published to observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseEvent {
    /// Workflow kind.
    pub kind: OperationKind,
    /// Phase left.
    pub from: OperationPhase,
    /// Phase entered.
    pub to: OperationPhase,
}

/// Lifecycle status of the encryption engine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineStatus {
    /// No instance and no attempt in flight.
    Uninitialized,
    /// A bootstrap attempt is in flight.
    Initializing,
    /// An instance is available for `network_id`.
    Ready,
    /// The last bootstrap failed.
    Error,
}

/// Observable view of the engine slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CryptoInstanceState {
    /// Lifecycle status.
    pub status: EngineStatus,
    /// Network the slot refers to, if any.
    pub network_id: Option<NetworkId>,
    /// Cause of the last failed bootstrap.
    pub last_error: Option<EngineError>,
}

impl CryptoInstanceState {
    /// True if the slot holds a ready instance for this network.
    pub fn is_ready_for(&self, network_id: NetworkId) -> bool {
        self.status == EngineStatus::Ready && self.network_id == Some(network_id)
    }
}

/// An accepted glucose input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlucoseSubmission {
    /// Value in mg/dL.
    pub raw_value: u16,
    /// Monotonic submission order.
    pub sequence: u64,
}

/// Latest committed risk result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskResult {
    /// Handle of the encrypted boolean; `Handle::EMPTY` until a check commits.
    pub handle: Handle,
    /// Decrypted value (`true` = above threshold), once disclosed.
    pub decrypted: Option<bool>,
}

impl RiskResult {
    /// True once a real handle was committed.
    pub fn has_value(&self) -> bool {
        !self.handle.is_empty()
    }
}

/// Outcome of a workflow that ran to completion without failing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Result committed to the store.
    Committed {
        /// Workflow kind.
        kind: OperationKind,
        /// Committed handle.
        handle: Handle,
        /// Decrypted risk flag, when disclosure was requested and succeeded.
        decrypted: Option<bool>,
    },
    /// Environment changed in flight; the result was discarded.
    Stale {
        /// Workflow kind.
        kind: OperationKind,
    },
}

impl OperationOutcome {
    /// True if the result reached the store.
    pub fn is_committed(&self) -> bool {
        matches!(self, OperationOutcome::Committed { .. })
    }

    /// True if the result was discarded as stale.
    pub fn is_stale(&self) -> bool {
        matches!(self, OperationOutcome::Stale { .. })
    }

    /// Committed handle, if any.
    pub fn handle(&self) -> Option<Handle> {
        match self {
            OperationOutcome::Committed { handle, .. } => Some(*handle),
            OperationOutcome::Stale { .. } => None,
        }
    }
}

/// Overall readiness, derived for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemStatus {
    /// No network or signer.
    WalletDisconnected,
    /// Engine not ready for the current network.
    EngineInitializing,
    /// No contract on the current network.
    NotDeployed(NetworkId),
    /// Everything in place.
    Ready,
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemStatus::WalletDisconnected => f.write_str("Please connect your wallet"),
            SystemStatus::EngineInitializing => f.write_str("Initializing encryption engine..."),
            SystemStatus::NotDeployed(n) => {
                write!(f, "Contract not deployed on this network (chain {n})")
            }
            SystemStatus::Ready => f.write_str("Ready for glucose assessment"),
        }
    }
}
