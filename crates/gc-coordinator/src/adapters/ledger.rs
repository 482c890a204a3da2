//! In-memory glucose ledger.
//!
//! Plays the on-chain contract: stores encrypted submissions per signer and
//! evaluates `glucose > threshold` over them through the shared coprocessor.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::engine::MockCoprocessor;
use super::gate::CallGate;
use crate::domain::{EncryptedInput, Handle, LedgerError, NetworkId, SignerId};
use crate::ports::GlucoseLedger;

/// Contract simulation with configurable latency and failures.
pub struct InMemoryLedger {
    coprocessor: Arc<MockCoprocessor>,
    risk_threshold: u16,
    latency: Duration,
    deployments: RwLock<HashSet<NetworkId>>,
    submissions: RwLock<HashMap<(NetworkId, SignerId), Vec<Handle>>>,
    failures: Mutex<VecDeque<LedgerError>>,
    gate: CallGate,
}

impl InMemoryLedger {
    /// Ledger with no deployments.
    pub fn new(coprocessor: Arc<MockCoprocessor>, risk_threshold: u16) -> Self {
        Self {
            coprocessor,
            risk_threshold,
            latency: Duration::ZERO,
            deployments: RwLock::new(HashSet::new()),
            submissions: RwLock::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            gate: CallGate::new(),
        }
    }

    /// Simulated confirmation latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Deploy the contract on `network_id`.
    pub fn deploy(&self, network_id: NetworkId) {
        self.deployments.write().insert(network_id);
    }

    /// Remove the contract from `network_id`.
    pub fn undeploy(&self, network_id: NetworkId) {
        self.deployments.write().remove(&network_id);
    }

    /// Fail the next confirmed call with `error`.
    pub fn fail_next(&self, error: LedgerError) {
        self.failures.lock().push_back(error);
    }

    /// Pause point before confirmation.
    pub fn gate(&self) -> &CallGate {
        &self.gate
    }

    /// Submissions stored across all networks and signers.
    pub fn submission_count(&self) -> usize {
        self.submissions.read().values().map(Vec::len).sum()
    }

    /// Latest stored submission of `signer` on `network_id`.
    pub fn latest_submission(&self, network_id: NetworkId, signer: &SignerId) -> Option<Handle> {
        self.submissions
            .read()
            .get(&(network_id, signer.clone()))
            .and_then(|handles| handles.last().copied())
    }

    fn ensure_deployed(&self, network_id: NetworkId) -> Result<(), LedgerError> {
        if self.is_deployed(network_id) {
            Ok(())
        } else {
            Err(LedgerError::NotDeployed(network_id))
        }
    }

    /// Wait for "block confirmation".
    async fn confirm(&self) -> Result<(), LedgerError> {
        self.gate.pass().await;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GlucoseLedger for InMemoryLedger {
    fn is_deployed(&self, network_id: NetworkId) -> bool {
        self.deployments.read().contains(&network_id)
    }

    async fn submit_glucose(
        &self,
        network_id: NetworkId,
        signer: &SignerId,
        input: EncryptedInput,
    ) -> Result<Handle, LedgerError> {
        self.ensure_deployed(network_id)?;
        self.confirm().await?;

        let handle = self.coprocessor.store_input(network_id, signer, &input)?;
        self.submissions
            .write()
            .entry((network_id, signer.clone()))
            .or_default()
            .push(handle);
        debug!(network_id = %network_id, signer = %signer, handle = %handle, "Glucose stored");
        Ok(handle)
    }

    async fn check_risk(
        &self,
        network_id: NetworkId,
        signer: &SignerId,
        glucose: Handle,
    ) -> Result<Handle, LedgerError> {
        self.ensure_deployed(network_id)?;
        self.confirm().await?;

        let handle = self.coprocessor.greater_than(
            network_id,
            signer,
            glucose,
            u32::from(self.risk_threshold),
        )?;
        debug!(network_id = %network_id, signer = %signer, handle = %handle, "Risk evaluated");
        Ok(handle)
    }
}
