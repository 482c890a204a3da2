//! Mock encryption engine.
//!
//! `MockCoprocessor` stands in for the encrypted-computation backend: it keeps
//! plaintexts behind opaque handles, scoped to a network and an owner. The
//! engine instances and the in-memory ledger share one coprocessor so
//! handles produced by one are understood by the other.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::gate::CallGate;
use crate::domain::{EncryptedInput, EngineError, Handle, LedgerError, NetworkId, SignerId};
use crate::ports::{BootstrapTarget, EncryptionEngine, EngineBootstrapper};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Plaintext {
    U32(u32),
    Bool(bool),
}

#[derive(Clone, Debug)]
struct Ciphertext {
    network_id: NetworkId,
    owner: SignerId,
    value: Plaintext,
}

/// Handle-addressed store of simulated ciphertexts.
#[derive(Default)]
pub struct MockCoprocessor {
    values: RwLock<HashMap<Handle, Ciphertext>>,
    nonce: AtomicU64,
}

impl MockCoprocessor {
    /// Empty coprocessor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ciphertexts held.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// True if nothing has been encrypted yet.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Encrypt `value` for `owner` on `network_id`.
    pub fn encrypt(&self, network_id: NetworkId, owner: &SignerId, value: u32) -> EncryptedInput {
        let handle = self.insert(network_id, owner, Plaintext::U32(value));
        EncryptedInput {
            handle,
            input_proof: input_proof(network_id, owner, &handle),
        }
    }

    /// Accept an encrypted input into ledger storage and return the stored
    /// handle.
    pub fn store_input(
        &self,
        network_id: NetworkId,
        owner: &SignerId,
        input: &EncryptedInput,
    ) -> Result<Handle, LedgerError> {
        if input.input_proof != input_proof(network_id, owner, &input.handle) {
            return Err(LedgerError::Rejected("invalid input proof".into()));
        }
        let value = self.lookup(network_id, &input.handle)?.value;
        Ok(self.insert(network_id, owner, value))
    }

    /// Encrypted `stored > threshold`, readable by `owner`.
    pub fn greater_than(
        &self,
        network_id: NetworkId,
        owner: &SignerId,
        stored: Handle,
        threshold: u32,
    ) -> Result<Handle, LedgerError> {
        let ciphertext = self.lookup(network_id, &stored)?;
        if ciphertext.owner != *owner {
            return Err(LedgerError::Rejected(format!(
                "{stored} is not readable by {owner}"
            )));
        }
        let value = match ciphertext.value {
            Plaintext::U32(v) => v > threshold,
            Plaintext::Bool(_) => {
                return Err(LedgerError::Rejected(format!("{stored} is not a number")))
            }
        };
        Ok(self.insert(network_id, owner, Plaintext::Bool(value)))
    }

    /// Decrypt an encrypted boolean for its owner.
    pub fn reveal_bool(
        &self,
        network_id: NetworkId,
        requester: &SignerId,
        handle: Handle,
    ) -> Result<bool, EngineError> {
        let ciphertext = self
            .lookup(network_id, &handle)
            .map_err(|e| EngineError::Decryption(e.to_string()))?;
        if ciphertext.owner != *requester {
            return Err(EngineError::Decryption(format!(
                "{requester} is not allowed to decrypt {handle}"
            )));
        }
        match ciphertext.value {
            Plaintext::Bool(v) => Ok(v),
            Plaintext::U32(_) => Err(EngineError::Decryption(format!(
                "{handle} is not an encrypted boolean"
            ))),
        }
    }

    fn lookup(&self, network_id: NetworkId, handle: &Handle) -> Result<Ciphertext, LedgerError> {
        self.values
            .read()
            .get(handle)
            .filter(|c| c.network_id == network_id)
            .cloned()
            .ok_or(LedgerError::UnknownHandle(*handle))
    }

    fn insert(&self, network_id: NetworkId, owner: &SignerId, value: Plaintext) -> Handle {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(network_id.value().to_be_bytes());
        hasher.update(owner.as_str().as_bytes());
        hasher.update(nonce.to_be_bytes());
        let handle = Handle::from_bytes(hasher.finalize().into());

        self.values.write().insert(
            handle,
            Ciphertext {
                network_id,
                owner: owner.clone(),
                value,
            },
        );
        handle
    }
}

fn input_proof(network_id: NetworkId, owner: &SignerId, handle: &Handle) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(b"input-proof");
    hasher.update(network_id.value().to_be_bytes());
    hasher.update(owner.as_str().as_bytes());
    hasher.update(handle.as_bytes());
    hasher.finalize().to_vec()
}

/// Engine instance bound to one network.
pub struct MockEngine {
    network_id: NetworkId,
    coprocessor: Arc<MockCoprocessor>,
    fail_decryption: Arc<AtomicBool>,
}

impl std::fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEngine")
            .field("network_id", &self.network_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EncryptionEngine for MockEngine {
    fn network_id(&self) -> NetworkId {
        self.network_id
    }

    async fn encrypt_u32(
        &self,
        signer: &SignerId,
        value: u32,
    ) -> Result<EncryptedInput, EngineError> {
        Ok(self.coprocessor.encrypt(self.network_id, signer, value))
    }

    async fn decrypt_bool(&self, signer: &SignerId, handle: Handle) -> Result<bool, EngineError> {
        if self.fail_decryption.load(Ordering::SeqCst) {
            return Err(EngineError::Decryption("relayer unavailable".into()));
        }
        self.coprocessor.reveal_bool(self.network_id, signer, handle)
    }
}

/// Bootstrapper producing `MockEngine` instances.
pub struct MockBootstrapper {
    coprocessor: Arc<MockCoprocessor>,
    delay: Duration,
    attempts: AtomicU64,
    failures: Mutex<HashMap<NetworkId, String>>,
    fail_decryption: Arc<AtomicBool>,
    last_target: Mutex<Option<BootstrapTarget>>,
    gate: CallGate,
}

impl MockBootstrapper {
    /// Bootstrapper over a shared coprocessor.
    pub fn new(coprocessor: Arc<MockCoprocessor>) -> Self {
        Self {
            coprocessor,
            delay: Duration::ZERO,
            attempts: AtomicU64::new(0),
            failures: Mutex::new(HashMap::new()),
            fail_decryption: Arc::new(AtomicBool::new(false)),
            last_target: Mutex::new(None),
            gate: CallGate::new(),
        }
    }

    /// Simulated bootstrap latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Bootstraps attempted so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Target of the most recent attempt.
    pub fn last_target(&self) -> Option<BootstrapTarget> {
        self.last_target.lock().clone()
    }

    /// Make bootstraps for `network_id` fail with `reason`.
    pub fn fail_network(&self, network_id: NetworkId, reason: impl Into<String>) {
        self.failures.lock().insert(network_id, reason.into());
    }

    /// Let every network bootstrap again.
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Make decryption fail on every instance, including existing ones.
    pub fn fail_decryption(&self, fail: bool) {
        self.fail_decryption.store(fail, Ordering::SeqCst);
    }

    /// Pause point inside `bootstrap`.
    pub fn gate(&self) -> &CallGate {
        &self.gate
    }
}

#[async_trait]
impl EngineBootstrapper for MockBootstrapper {
    async fn bootstrap(
        &self,
        target: BootstrapTarget,
    ) -> Result<Arc<dyn EncryptionEngine>, EngineError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.last_target.lock() = Some(target.clone());
        debug!(network_id = %target.network_id, rpc_url = ?target.rpc_url, "Mock bootstrap");

        self.gate.pass().await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let failure = self.failures.lock().get(&target.network_id).cloned();
        if let Some(reason) = failure {
            return Err(EngineError::Bootstrap {
                network_id: target.network_id,
                reason,
            });
        }

        Ok(Arc::new(MockEngine {
            network_id: target.network_id,
            coprocessor: Arc::clone(&self.coprocessor),
            fail_decryption: Arc::clone(&self.fail_decryption),
        }))
    }
}
