//! Runtime configuration from environment variables.

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use gc_coordinator::{CoordinatorConfig, NetworkId};

/// Default account: the first well-known local development key.
pub const DEFAULT_SIGNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Wiring parameters for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Network the wallet starts on.
    pub network_id: NetworkId,
    /// Account the wallet starts with.
    pub signer: String,
    /// Simulated engine bootstrap latency.
    pub bootstrap_delay: Duration,
    /// Simulated ledger confirmation latency.
    pub ledger_delay: Duration,
    /// Networks the contract is deployed on.
    pub deployed: Vec<NetworkId>,
    /// Coordinator settings.
    pub coordinator: CoordinatorConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            network_id: NetworkId::LOCAL_DEV,
            signer: DEFAULT_SIGNER.to_string(),
            bootstrap_delay: Duration::from_millis(500),
            ledger_delay: Duration::from_millis(1500),
            deployed: vec![NetworkId::LOCAL_DEV, NetworkId::SEPOLIA],
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `GC_CHAIN_ID`: starting network (default: 31337)
    /// - `GC_SIGNER`: starting account
    /// - `GC_BOOTSTRAP_DELAY_MS`: engine bootstrap latency (default: 500)
    /// - `GC_LEDGER_DELAY_MS`: ledger confirmation latency (default: 1500)
    /// - `GC_DEPLOYED_CHAINS`: comma-separated chain ids with the contract
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(chain_id) = parse_var::<u64>(&lookup, "GC_CHAIN_ID")? {
            config.network_id = NetworkId(chain_id);
        }
        if let Some(signer) = lookup("GC_SIGNER").filter(|s| !s.trim().is_empty()) {
            config.signer = signer;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "GC_BOOTSTRAP_DELAY_MS")? {
            config.bootstrap_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "GC_LEDGER_DELAY_MS")? {
            config.ledger_delay = Duration::from_millis(ms);
        }
        if let Some(list) = lookup("GC_DEPLOYED_CHAINS") {
            config.deployed = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u64>()
                        .map(NetworkId)
                        .with_context(|| format!("GC_DEPLOYED_CHAINS: invalid chain id {s:?}"))
                })
                .collect::<Result<_>>()?;
        }

        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key}: invalid value {raw:?}"))
        })
        .transpose()
}
