//! # Crypto Instance Manager
//!
//! Owns the single process-wide encryption engine slot.
//!
//! ## Slot lifecycle
//!
//! ```text
//! Uninitialized ──ensure_ready(n)──→ Initializing(n) ──ok──→ Ready(n)
//!       ↑                                  │
//!       │                                  └──err──→ Error(n)
//!       └──────── network change / invalidate ────────────┘
//! ```
//!
//! Callers arriving while `Initializing(n)` join the in-flight attempt, so one
//! bootstrap serves all of them and they all observe the same outcome. An
//! attempt that completes after the slot moved on (network change, newer
//! attempt) does not overwrite it.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use gc_telemetry::{
    metric_inc, HistogramTimer, ENGINE_BOOTSTRAPS, ENGINE_BOOTSTRAP_DURATION,
    ENGINE_INVALIDATIONS,
};

use crate::config::CoordinatorConfig;
use crate::domain::{
    CryptoInstanceState, EngineError, EngineStatus, EnvironmentSnapshot, NetworkId,
};
use crate::ports::{BootstrapTarget, EncryptionEngine, EngineBootstrapper, WalletProvider};

type BootstrapOutcome = Result<Arc<dyn EncryptionEngine>, EngineError>;
type BootstrapAttempt = Shared<BoxFuture<'static, BootstrapOutcome>>;

/// What `settle` did with an attempt's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    /// This caller moved the slot out of `Initializing`.
    Applied,
    /// Another caller joined on the same attempt got there first.
    AlreadySettled,
    /// The slot moved on to another attempt or network.
    Superseded,
}

enum Slot {
    Uninitialized,
    Initializing {
        network_id: NetworkId,
        generation: u64,
        attempt: BootstrapAttempt,
    },
    Ready {
        network_id: NetworkId,
        instance: Arc<dyn EncryptionEngine>,
    },
    Error {
        network_id: NetworkId,
        error: EngineError,
    },
}

impl Slot {
    fn network_id(&self) -> Option<NetworkId> {
        match self {
            Slot::Uninitialized => None,
            Slot::Initializing { network_id, .. }
            | Slot::Ready { network_id, .. }
            | Slot::Error { network_id, .. } => Some(*network_id),
        }
    }

    fn state(&self) -> CryptoInstanceState {
        let (status, last_error) = match self {
            Slot::Uninitialized => (EngineStatus::Uninitialized, None),
            Slot::Initializing { .. } => (EngineStatus::Initializing, None),
            Slot::Ready { .. } => (EngineStatus::Ready, None),
            Slot::Error { error, .. } => (EngineStatus::Error, Some(error.clone())),
        };
        CryptoInstanceState {
            status,
            network_id: self.network_id(),
            last_error,
        }
    }
}

/// Lifecycle owner of the encryption engine instance.
pub struct CryptoInstanceManager {
    bootstrapper: Arc<dyn EngineBootstrapper>,
    provider: Arc<dyn WalletProvider>,
    config: CoordinatorConfig,
    slot: Mutex<Slot>,
    generation: AtomicU64,
    bootstrap_attempts: AtomicU64,
}

impl CryptoInstanceManager {
    /// Manager with an empty slot.
    pub fn new(
        bootstrapper: Arc<dyn EngineBootstrapper>,
        provider: Arc<dyn WalletProvider>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            bootstrapper,
            provider,
            config,
            slot: Mutex::new(Slot::Uninitialized),
            generation: AtomicU64::new(0),
            bootstrap_attempts: AtomicU64::new(0),
        }
    }

    /// Return a ready instance for `network_id`, bootstrapping if needed.
    ///
    /// Returns without suspending when the slot is already ready for this
    /// network; joins the in-flight attempt when one is running for it.
    pub async fn ensure_ready(
        &self,
        network_id: NetworkId,
    ) -> Result<Arc<dyn EncryptionEngine>, EngineError> {
        let (generation, attempt) = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Ready {
                    network_id: bound,
                    instance,
                } if *bound == network_id => return Ok(Arc::clone(instance)),
                Slot::Initializing {
                    network_id: bound,
                    generation,
                    attempt,
                } if *bound == network_id => {
                    debug!(network_id = %network_id, "Joining in-flight engine bootstrap");
                    (*generation, attempt.clone())
                }
                _ => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let attempt = self.begin_bootstrap(network_id);
                    *slot = Slot::Initializing {
                        network_id,
                        generation,
                        attempt: attempt.clone(),
                    };
                    (generation, attempt)
                }
            }
        };

        let outcome = attempt.await;
        let settlement = self.settle(generation, network_id, &outcome);
        trace!(network_id = %network_id, generation, ?settlement, "Bootstrap settled");
        outcome
    }

    /// Tear down the slot unconditionally.
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        if let Some(network_id) = slot.network_id() {
            info!(network_id = %network_id, "Encryption engine invalidated");
            metric_inc!(ENGINE_INVALIDATIONS, &["explicit"]);
            *slot = Slot::Uninitialized;
        }
    }

    /// Tear down the slot if it belongs to a different network.
    ///
    /// Returns true if the slot was reset.
    pub fn on_network_changed(&self, network_id: Option<NetworkId>) -> bool {
        let mut slot = self.slot.lock();
        match slot.network_id() {
            Some(bound) if Some(bound) != network_id => {
                info!(
                    from = %bound,
                    to = ?network_id.map(|n| n.value()),
                    "Network changed; encryption engine torn down"
                );
                metric_inc!(ENGINE_INVALIDATIONS, &["network_change"]);
                *slot = Slot::Uninitialized;
                true
            }
            _ => false,
        }
    }

    /// Current slot state.
    pub fn state(&self) -> CryptoInstanceState {
        self.slot.lock().state()
    }

    /// Bootstrap attempts started so far.
    pub fn bootstrap_attempts(&self) -> u64 {
        self.bootstrap_attempts.load(Ordering::SeqCst)
    }

    /// Invalidate on every network change reported by `changes`.
    ///
    /// The task ends when the sender side is dropped.
    pub fn spawn_environment_listener(
        self: &Arc<Self>,
        mut changes: watch::Receiver<EnvironmentSnapshot>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let network_id = changes.borrow_and_update().network_id();
                manager.on_network_changed(network_id);
            }
            debug!("Environment listener stopped");
        })
    }

    fn begin_bootstrap(&self, network_id: NetworkId) -> BootstrapAttempt {
        let mock_url = self.config.mock_rpc_url(network_id).map(str::to_string);
        let target = BootstrapTarget {
            network_id,
            mock: mock_url.is_some(),
            rpc_url: mock_url.or_else(|| self.provider.rpc_url()),
        };
        let attempt = self.bootstrap_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            network_id = %network_id,
            mock = target.mock,
            attempt,
            "Bootstrapping encryption engine"
        );

        let bootstrapper = Arc::clone(&self.bootstrapper);
        async move {
            let _timer = HistogramTimer::new(&ENGINE_BOOTSTRAP_DURATION);
            let instance = bootstrapper.bootstrap(target).await?;
            if instance.network_id() != network_id {
                return Err(EngineError::WrongNetwork {
                    bound: instance.network_id(),
                    requested: network_id,
                });
            }
            Ok(instance)
        }
        .boxed()
        .shared()
    }

    fn settle(
        &self,
        generation: u64,
        network_id: NetworkId,
        outcome: &BootstrapOutcome,
    ) -> Settlement {
        let mut slot = self.slot.lock();
        match &*slot {
            Slot::Initializing { generation: g, .. } if *g == generation => {}
            Slot::Ready { network_id: bound, .. } | Slot::Error { network_id: bound, .. }
                if *bound == network_id =>
            {
                return Settlement::AlreadySettled;
            }
            _ => {
                debug!(network_id = %network_id, generation, "Bootstrap outcome superseded");
                return Settlement::Superseded;
            }
        }

        *slot = match outcome {
            Ok(instance) => {
                info!(network_id = %network_id, "Encryption engine ready");
                metric_inc!(ENGINE_BOOTSTRAPS, &["ready"]);
                Slot::Ready {
                    network_id,
                    instance: Arc::clone(instance),
                }
            }
            Err(error) => {
                warn!(network_id = %network_id, error = %error, "Encryption engine bootstrap failed");
                metric_inc!(ENGINE_BOOTSTRAPS, &["error"]);
                Slot::Error {
                    network_id,
                    error: error.clone(),
                }
            }
        };
        Settlement::Applied
    }
}

impl fmt::Debug for CryptoInstanceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoInstanceManager")
            .field("state", &self.state())
            .field("bootstrap_attempts", &self.bootstrap_attempts())
            .finish()
    }
}
