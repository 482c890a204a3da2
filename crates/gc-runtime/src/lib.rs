//! # Glucose-Check Runtime
//!
//! Wires the coordinator to in-memory collaborators and executes line
//! commands against it.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (from env)
//! 2. Initialize telemetry
//! 3. Build wallet, engine bootstrapper, ledger and coordinator
//! 4. Start the environment listener and the phase event reporter
//! 5. Execute commands until `quit` or end of input

pub mod commands;
pub mod config;

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use gc_coordinator::adapters::{InMemoryLedger, InMemoryWallet, MockBootstrapper, MockCoprocessor};
use gc_coordinator::{
    CoordinatorResult, CryptoInstanceManager, OperationCoordinator, OperationKind,
    OperationOutcome, OperationPhase, WalletProvider,
};

pub use commands::{Command, HELP};
pub use config::RuntimeConfig;

/// Status report printed by `status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Readiness message.
    pub status: String,
    /// Current network.
    pub network_id: Option<u64>,
    /// Current account.
    pub signer: Option<String>,
    /// Submit phase.
    pub submit: OperationPhase,
    /// Check phase.
    pub check: OperationPhase,
    /// Committed submission handle.
    pub submission: Option<String>,
    /// Committed risk handle.
    pub risk: Option<String>,
    /// Disclosed risk flag.
    pub high_risk: Option<bool>,
    /// Recent accepted values, oldest first.
    pub recent: Vec<u16>,
    /// Status message.
    pub message: String,
}

/// The running application.
pub struct GlucoseRuntime {
    wallet: Arc<InMemoryWallet>,
    coordinator: Arc<OperationCoordinator>,
    tasks: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl GlucoseRuntime {
    /// Build the collaborators and start the background tasks.
    pub fn new(config: RuntimeConfig) -> Self {
        info!(
            network_id = %config.network_id,
            signer = %config.signer,
            "Creating glucose-check runtime"
        );

        let coprocessor = Arc::new(MockCoprocessor::new());
        let wallet = Arc::new(InMemoryWallet::connected(config.network_id, &config.signer));
        let bootstrapper = Arc::new(
            MockBootstrapper::new(Arc::clone(&coprocessor)).with_delay(config.bootstrap_delay),
        );
        let ledger = Arc::new(
            InMemoryLedger::new(coprocessor, config.coordinator.risk_threshold)
                .with_latency(config.ledger_delay),
        );
        for network_id in &config.deployed {
            ledger.deploy(*network_id);
        }

        let engines = Arc::new(CryptoInstanceManager::new(
            bootstrapper,
            wallet.clone(),
            config.coordinator.clone(),
        ));
        let listener = engines.spawn_environment_listener(wallet.subscribe());
        let coordinator = Arc::new(OperationCoordinator::new(
            config.coordinator,
            wallet.clone(),
            engines,
            ledger,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reporter = spawn_phase_reporter(&coordinator, shutdown_rx);

        Self {
            wallet,
            coordinator,
            tasks: vec![listener, reporter],
            shutdown_tx,
        }
    }

    /// The coordinator driven by this runtime.
    pub fn coordinator(&self) -> &Arc<OperationCoordinator> {
        &self.coordinator
    }

    /// The wallet driven by this runtime.
    pub fn wallet(&self) -> &Arc<InMemoryWallet> {
        &self.wallet
    }

    /// Warm up the engine for the starting network in the background.
    pub fn prepare(&self) -> JoinHandle<()> {
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            if let Err(e) = coordinator.prepare().await {
                warn!(error = %e, "Engine warm-up failed");
            }
        })
    }

    /// Execute one command. Returns `false` when the runtime should stop.
    ///
    /// Workflows are spawned so further commands can run while they are in
    /// flight.
    pub fn execute(&self, command: Command) -> Result<bool> {
        match command {
            Command::Submit(text) => {
                let coordinator = Arc::clone(&self.coordinator);
                self.spawn_workflow(OperationKind::Submit, async move {
                    coordinator.submit_input(&text).await
                });
            }
            Command::Check => {
                let coordinator = Arc::clone(&self.coordinator);
                self.spawn_workflow(OperationKind::Check, async move {
                    coordinator.check(false).await
                });
            }
            Command::Reveal => {
                let coordinator = Arc::clone(&self.coordinator);
                self.spawn_workflow(OperationKind::Check, async move {
                    coordinator.check(true).await
                });
            }
            Command::Network(network_id) => self.wallet.switch_network(network_id),
            Command::Account(address) => self.wallet.switch_account(address),
            Command::Connect(network_id, address) => self.wallet.connect(network_id, address),
            Command::Disconnect => self.wallet.disconnect(),
            Command::Status => {
                let report = serde_json::to_string_pretty(&self.status())
                    .context("Failed to encode status")?;
                println!("{report}");
            }
            Command::Metrics => {
                let text = gc_telemetry::encode_metrics().context("Failed to encode metrics")?;
                println!("{text}");
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Snapshot of readiness and results.
    pub fn status(&self) -> StatusReport {
        let results = self.coordinator.results();
        let risk = results.risk_result();
        StatusReport {
            status: self.coordinator.system_status().to_string(),
            network_id: self.wallet.network_id().map(|n| n.value()),
            signer: self.wallet.signer_id().map(|s| s.as_str().to_string()),
            submit: self.coordinator.phase(OperationKind::Submit),
            check: self.coordinator.phase(OperationKind::Check),
            submission: results
                .has_submission()
                .then(|| results.submission_handle().to_hex()),
            risk: risk.has_value().then(|| risk.handle.to_hex()),
            high_risk: risk.decrypted,
            recent: results.recent_submissions().map(|s| s.raw_value).collect(),
            message: results.message().to_string(),
        }
    }

    /// Stop background tasks.
    pub async fn shutdown(self) {
        info!("Initiating shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for task in self.tasks {
            task.abort();
            let _ = task.await;
        }
        info!("Shutdown complete");
    }

    fn spawn_workflow<F>(&self, kind: OperationKind, workflow: F)
    where
        F: std::future::Future<Output = CoordinatorResult<OperationOutcome>> + Send + 'static,
    {
        tokio::spawn(async move {
            match workflow.await {
                Ok(OperationOutcome::Committed {
                    handle, decrypted, ..
                }) => match decrypted {
                    Some(high) => println!("{kind}: committed {handle} (high risk: {high})"),
                    None => println!("{kind}: committed {handle}"),
                },
                Ok(OperationOutcome::Stale { .. }) => {
                    println!("{kind}: {}", gc_coordinator::STALE_MESSAGE)
                }
                Err(e) if e.is_rejection() => println!("{kind}: refused: {e}"),
                Err(e) => println!("{kind}: failed: {e}"),
            }
        });
    }
}

/// Log every phase transition until shutdown.
fn spawn_phase_reporter(
    coordinator: &OperationCoordinator,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut events = coordinator.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => info!(
                        kind = %event.kind,
                        from = %event.from,
                        to = %event.to,
                        "Phase changed"
                    ),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Phase reporter lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => {
                    info!("Phase reporter shutdown signal received");
                    break;
                }
            }
        }
    })
}
