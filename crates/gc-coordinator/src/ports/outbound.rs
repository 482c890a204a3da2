//! # Outbound Ports
//!
//! Traits for the external collaborators: wallet/network provider, engine
//! bootstrap, the engine instance and the ledger.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::domain::{
    EncryptedInput, EngineError, EnvironmentSnapshot, Handle, LedgerError, NetworkId, SignerId,
};

/// Wallet/network provider - outbound port.
///
/// Reads never suspend. `subscribe` yields a fresh snapshot on every network
/// or account change.
pub trait WalletProvider: Send + Sync {
    /// Current network, `None` when disconnected.
    fn network_id(&self) -> Option<NetworkId>;

    /// Current signer, `None` when no account is selected.
    fn signer_id(&self) -> Option<SignerId>;

    /// RPC endpoint of the provider's transport.
    fn rpc_url(&self) -> Option<String>;

    /// Change notifications.
    fn subscribe(&self) -> watch::Receiver<EnvironmentSnapshot>;
}

/// What to bootstrap an engine instance against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapTarget {
    /// Network the instance will be bound to.
    pub network_id: NetworkId,
    /// RPC endpoint to use.
    pub rpc_url: Option<String>,
    /// True for a configured local mock chain.
    pub mock: bool,
}

/// Encryption engine instance - outbound port.
///
/// Only valid for the network it was bootstrapped for.
#[async_trait]
pub trait EncryptionEngine: Send + Sync + fmt::Debug {
    /// Network this instance is bound to.
    fn network_id(&self) -> NetworkId;

    /// Encrypt a value for use by `signer` in a ledger call.
    async fn encrypt_u32(
        &self,
        signer: &SignerId,
        value: u32,
    ) -> Result<EncryptedInput, EngineError>;

    /// Request decryption of an encrypted boolean `signer` is allowed to read.
    async fn decrypt_bool(&self, signer: &SignerId, handle: Handle) -> Result<bool, EngineError>;
}

/// Engine bootstrap - outbound port.
#[async_trait]
pub trait EngineBootstrapper: Send + Sync {
    /// Build an instance for the target network. May be slow.
    async fn bootstrap(
        &self,
        target: BootstrapTarget,
    ) -> Result<Arc<dyn EncryptionEngine>, EngineError>;
}

/// Glucose ledger (on-chain contract) - outbound port.
#[async_trait]
pub trait GlucoseLedger: Send + Sync {
    /// True if the contract exists on this network.
    fn is_deployed(&self, network_id: NetworkId) -> bool;

    /// Send an encrypted glucose value and wait for confirmation.
    async fn submit_glucose(
        &self,
        network_id: NetworkId,
        signer: &SignerId,
        input: EncryptedInput,
    ) -> Result<Handle, LedgerError>;

    /// Evaluate the risk predicate over a stored value and wait for
    /// confirmation. Returns the handle of the encrypted boolean.
    async fn check_risk(
        &self,
        network_id: NetworkId,
        signer: &SignerId,
        glucose: Handle,
    ) -> Result<Handle, LedgerError>;
}
