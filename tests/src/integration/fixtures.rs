//! Shared wiring for integration tests.

use std::sync::{Arc, Once};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use gc_coordinator::adapters::{InMemoryLedger, InMemoryWallet, MockBootstrapper, MockCoprocessor};
use gc_coordinator::{
    CoordinatorConfig, CryptoInstanceManager, NetworkId, OperationCoordinator, OperationPhase,
    PhaseEvent, WalletProvider,
};

pub const ALICE: &str = "0xA11CE00000000000000000000000000000000001";
pub const BOB: &str = "0xB0B0000000000000000000000000000000000002";
pub const HOME: NetworkId = NetworkId::LOCAL_DEV;
pub const AWAY: NetworkId = NetworkId::SEPOLIA;

/// Coordinator over in-memory collaborators, contract deployed on `HOME`
/// and `AWAY`, environment listener running.
pub struct World {
    pub wallet: Arc<InMemoryWallet>,
    pub coprocessor: Arc<MockCoprocessor>,
    pub bootstrapper: Arc<MockBootstrapper>,
    pub ledger: Arc<InMemoryLedger>,
    pub engines: Arc<CryptoInstanceManager>,
    pub coordinator: Arc<OperationCoordinator>,
    listener: JoinHandle<()>,
}

impl Drop for World {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

pub fn world() -> World {
    let config = CoordinatorConfig::for_testing();
    let coprocessor = Arc::new(MockCoprocessor::new());
    let wallet = Arc::new(InMemoryWallet::connected(HOME, ALICE));
    let bootstrapper = Arc::new(MockBootstrapper::new(coprocessor.clone()));
    let ledger = Arc::new(InMemoryLedger::new(coprocessor.clone(), config.risk_threshold));
    ledger.deploy(HOME);
    ledger.deploy(AWAY);

    let engines = Arc::new(CryptoInstanceManager::new(
        bootstrapper.clone(),
        wallet.clone(),
        config.clone(),
    ));
    let listener = engines.spawn_environment_listener(wallet.subscribe());
    let coordinator = Arc::new(OperationCoordinator::new(
        config,
        wallet.clone(),
        engines.clone(),
        ledger.clone(),
    ));

    World {
        wallet,
        coprocessor,
        bootstrapper,
        ledger,
        engines,
        coordinator,
        listener,
    }
}

/// Terminal phases seen on `rx` so far, in order.
pub fn terminal_phases(rx: &mut broadcast::Receiver<PhaseEvent>) -> Vec<OperationPhase> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if event.to.is_terminal() {
            seen.push(event.to);
        }
    }
    seen
}

static METRICS: Once = Once::new();

/// Register the telemetry metrics once per test process.
pub fn ensure_metrics() {
    METRICS.call_once(|| {
        gc_telemetry::register_metrics().expect("metrics register once");
    });
}
