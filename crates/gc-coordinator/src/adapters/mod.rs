//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of the outbound ports: wallet, engine bootstrap
//! and ledger, plus the call gate used to pause them.

mod engine;
mod gate;
mod ledger;
mod wallet;

pub use engine::{MockBootstrapper, MockCoprocessor, MockEngine};
pub use gate::{CallGate, GateHandle};
pub use ledger::InMemoryLedger;
pub use wallet::InMemoryWallet;
