//! # Identity Guard
//!
//! Captures the environment when an operation starts and answers, after any
//! suspension, whether the live network and signer still match it.
//!
//! Every answer re-reads the provider; nothing is cached.

use std::sync::Arc;

use crate::domain::{EnvironmentSnapshot, NetworkId, SignerId};
use crate::ports::WalletProvider;

/// Staleness detector over the live wallet state.
#[derive(Clone)]
pub struct IdentityGuard {
    provider: Arc<dyn WalletProvider>,
}

impl IdentityGuard {
    /// Guard reading from `provider`.
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self { provider }
    }

    /// Read the current network and signer. Never suspends.
    pub fn capture(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot::new(self.provider.network_id(), self.provider.signer_id())
    }

    /// Live network equals the snapshot's (both absent counts as equal).
    pub fn same_network(&self, snapshot: &EnvironmentSnapshot) -> bool {
        network_matches(snapshot.network_id(), self.provider.network_id())
    }

    /// Live signer equals the snapshot's, ignoring case.
    pub fn same_signer(&self, snapshot: &EnvironmentSnapshot) -> bool {
        signer_matches(snapshot.signer_id(), self.provider.signer_id().as_ref())
    }

    /// Both network and signer are unchanged since `snapshot`.
    pub fn still_valid(&self, snapshot: &EnvironmentSnapshot) -> bool {
        self.same_network(snapshot) && self.same_signer(snapshot)
    }
}

fn network_matches(captured: Option<NetworkId>, live: Option<NetworkId>) -> bool {
    captured == live
}

fn signer_matches(captured: Option<&SignerId>, live: Option<&SignerId>) -> bool {
    match (captured, live) {
        (Some(a), Some(b)) => a.matches(b.as_str()),
        (None, None) => true,
        _ => false,
    }
}
