//! # Glucose-Check Coordinator
//!
//! Client-side coordination of encrypted glucose submissions and risk checks
//! against a wallet whose network and account can change at any time.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Every workflow suspends on slow external calls (engine bootstrap,
//! encryption, ledger confirmation, decryption). While it is suspended the
//! user may switch network or account. The coordinator guarantees that:
//!
//! - at most one operation of each kind is in flight,
//! - the encryption engine is bootstrapped once per network, with concurrent
//!   callers joining the same attempt,
//! - a result computed under an identity that is no longer live is discarded
//!   instead of committed.
//!
//! ## Module Structure
//!
//! ```text
//! gc-coordinator/
//! ├── domain/          # Snapshots, handles, phases, ResultStore, errors
//! ├── ports/           # GlucoseCheckApi (inbound) + collaborator traits (outbound)
//! ├── application/     # IdentityGuard, CryptoInstanceManager, OperationCoordinator
//! ├── adapters/        # In-memory wallet, mock engine, in-memory ledger
//! └── config.rs        # CoordinatorConfig
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engines = Arc::new(CryptoInstanceManager::new(bootstrapper, wallet.clone(), config.clone()));
//! let _listener = engines.spawn_environment_listener(wallet.subscribe());
//! let coordinator = OperationCoordinator::new(config, wallet, engines, ledger);
//!
//! coordinator.submit(120).await?;
//! coordinator.check(true).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use application::{CryptoInstanceManager, IdentityGuard, OperationCoordinator, STALE_MESSAGE};
pub use config::CoordinatorConfig;
pub use domain::{
    CoordinatorError, CoordinatorResult, CryptoInstanceState, EngineError, EngineStatus,
    EnvironmentSnapshot, GlucoseReading, GlucoseSubmission, Handle, LedgerError, NetworkId,
    OperationKind, OperationOutcome, OperationPhase, OperationState, PhaseEvent, ResultStore,
    RiskResult, SignerId, SystemStatus, MAX_GLUCOSE_MG_DL, MIN_GLUCOSE_MG_DL,
    RISK_THRESHOLD_MG_DL,
};
pub use ports::{
    BootstrapTarget, EncryptionEngine, EngineBootstrapper, GlucoseCheckApi, GlucoseLedger,
    WalletProvider,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
