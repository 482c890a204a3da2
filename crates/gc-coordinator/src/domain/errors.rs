//! # Domain Errors
//!
//! Error types for the coordinator and its collaborators.

use thiserror::Error;

use super::invariants::{MAX_GLUCOSE_MG_DL, MIN_GLUCOSE_MG_DL};
use super::value_objects::{Handle, NetworkId, OperationKind};

/// Errors raised by the encryption engine or its bootstrap.
///
/// `Clone` so every caller joined on one bootstrap attempt sees the same cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Engine bootstrap failed for this network.
    #[error("Engine bootstrap failed on network {network_id}: {reason}")]
    Bootstrap {
        /// Network the bootstrap targeted
        network_id: NetworkId,
        /// Underlying cause
        reason: String,
    },

    /// Encrypting a value failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decrypting a handle failed.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Instance used outside the network it was built for.
    #[error("Engine bound to network {bound} cannot serve network {requested}")]
    WrongNetwork {
        /// Network the instance was built for
        bound: NetworkId,
        /// Network the caller asked for
        requested: NetworkId,
    },
}

/// Errors raised by the ledger collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No contract on this network.
    #[error("Contract not deployed on network {0}")]
    NotDeployed(NetworkId),

    /// Transaction rejected (by the user, the contract, or the node).
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// Transport failure (congestion, RPC unavailable).
    #[error("Ledger transport error: {0}")]
    Transport(String),

    /// The ledger has no value behind this handle.
    #[error("Unknown handle: {0}")]
    UnknownHandle(Handle),
}

/// Failure of the domain action itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFailure {
    /// Encryption step failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Ledger send or confirmation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Coordinator error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// Input is not an integer in the accepted range. No workflow started.
    #[error("Invalid glucose value {input:?}: expected an integer in {min}..={max} mg/dL")]
    Validation {
        /// Rejected input as given
        input: String,
        /// Lowest accepted value
        min: u16,
        /// Highest accepted value
        max: u16,
    },

    /// An operation of this kind is already running. No workflow started.
    #[error("A {0} operation is already running")]
    Busy(OperationKind),

    /// No wallet network or signer. No workflow started.
    #[error("Wallet not connected")]
    NotConnected,

    /// Risk check requested before any submission was committed.
    #[error("No glucose submission to check")]
    NoSubmission,

    /// Engine bootstrap failed for the current network.
    #[error("Encryption engine unavailable: {0}")]
    Initialization(EngineError),

    /// The ledger call or encryption step failed.
    #[error("{kind} failed: {source}")]
    Action {
        /// Workflow that failed
        kind: OperationKind,
        /// Underlying cause
        #[source]
        source: ActionFailure,
    },

    /// Attempted to commit the empty sentinel handle.
    #[error("Refusing to commit empty handle for {0}")]
    EmptyHandle(OperationKind),
}

impl CoordinatorError {
    /// Validation failure for the given input text.
    pub fn validation(input: impl Into<String>) -> Self {
        Self::Validation {
            input: input.into(),
            min: MIN_GLUCOSE_MG_DL,
            max: MAX_GLUCOSE_MG_DL,
        }
    }

    /// Action failure for a workflow.
    pub fn action(kind: OperationKind, source: impl Into<ActionFailure>) -> Self {
        Self::Action {
            kind,
            source: source.into(),
        }
    }

    /// True when the attempt was refused before any phase transition.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Busy(_) | Self::NotConnected | Self::NoSubmission
        )
    }

    /// Metric label for the error class.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Busy(_) => "busy",
            Self::NotConnected => "not_connected",
            Self::NoSubmission => "no_submission",
            Self::Initialization(_) => "initialization",
            Self::Action { .. } => "action",
            Self::EmptyHandle(_) => "empty_handle",
        }
    }
}

/// Result alias for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
