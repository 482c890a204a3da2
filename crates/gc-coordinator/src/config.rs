//! # Coordinator Configuration
//!
//! Configuration for the operation coordinator and the engine manager.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{NetworkId, DEFAULT_HISTORY_LEN, RISK_THRESHOLD_MG_DL};

/// Coordinator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Values strictly above this are high risk (mg/dL).
    pub risk_threshold: u16,

    /// Recent accepted submissions kept for display.
    pub history_len: usize,

    /// Networks bootstrapped against a local mock RPC instead of the
    /// provider's transport, keyed by chain id.
    pub mock_chains: BTreeMap<u64, String>,

    /// Buffer size of the phase event channel.
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let mut mock_chains = BTreeMap::new();
        mock_chains.insert(
            NetworkId::LOCAL_DEV.value(),
            "http://localhost:8545".to_string(),
        );
        Self {
            risk_threshold: RISK_THRESHOLD_MG_DL,
            history_len: DEFAULT_HISTORY_LEN,
            mock_chains,
            event_capacity: 64,
        }
    }
}

impl CoordinatorConfig {
    /// Create a config for testing (larger event buffer so tests can drain late).
    pub fn for_testing() -> Self {
        Self {
            event_capacity: 256,
            ..Self::default()
        }
    }

    /// Mock RPC endpoint configured for this network.
    pub fn mock_rpc_url(&self, network_id: NetworkId) -> Option<&str> {
        self.mock_chains.get(&network_id.value()).map(String::as_str)
    }
}
