//! # Application Module
//!
//! Services orchestrating the domain and the outbound ports.

pub mod coordinator;
pub mod crypto_manager;
pub mod identity_guard;

pub use coordinator::{OperationCoordinator, STALE_MESSAGE};
pub use crypto_manager::CryptoInstanceManager;
pub use identity_guard::IdentityGuard;
