//! In-memory wallet provider.
//!
//! Holds the selected network and account and publishes a snapshot on every
//! change. Used by the runtime binary and by tests to switch identity while
//! operations are in flight.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::info;

use crate::domain::{EnvironmentSnapshot, NetworkId, SignerId};
use crate::ports::WalletProvider;

#[derive(Debug, Default)]
struct WalletState {
    network_id: Option<NetworkId>,
    /// Address as the wallet reports it, casing preserved.
    account: Option<String>,
    rpc_url: Option<String>,
}

impl WalletState {
    fn snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot::new(self.network_id, self.account.as_ref().map(SignerId::new))
    }
}

/// Wallet whose network and account are set programmatically.
pub struct InMemoryWallet {
    state: RwLock<WalletState>,
    changes: watch::Sender<EnvironmentSnapshot>,
}

impl InMemoryWallet {
    /// Wallet connected to `network_id` with `account` selected.
    pub fn connected(network_id: NetworkId, account: impl AsRef<str>) -> Self {
        Self::with_state(WalletState {
            network_id: Some(network_id),
            account: Some(account.as_ref().to_string()),
            rpc_url: None,
        })
    }

    /// Wallet with no network and no account.
    pub fn disconnected() -> Self {
        Self::with_state(WalletState::default())
    }

    fn with_state(state: WalletState) -> Self {
        let (changes, _) = watch::channel(state.snapshot());
        Self {
            state: RwLock::new(state),
            changes,
        }
    }

    /// Set the transport endpoint reported to the engine bootstrap.
    pub fn with_rpc_url(self, rpc_url: impl Into<String>) -> Self {
        self.state.write().rpc_url = Some(rpc_url.into());
        self
    }

    /// Switch to another network.
    pub fn switch_network(&self, network_id: NetworkId) {
        self.update(|state| state.network_id = Some(network_id));
    }

    /// Select another account.
    pub fn switch_account(&self, account: impl AsRef<str>) {
        let account = account.as_ref().to_string();
        self.update(|state| state.account = Some(account));
    }

    /// Connect with the given network and account.
    pub fn connect(&self, network_id: NetworkId, account: impl AsRef<str>) {
        let account = account.as_ref().to_string();
        self.update(|state| {
            state.network_id = Some(network_id);
            state.account = Some(account);
        });
    }

    /// Drop network and account.
    pub fn disconnect(&self) {
        self.update(|state| {
            state.network_id = None;
            state.account = None;
        });
    }

    fn update(&self, change: impl FnOnce(&mut WalletState)) {
        let snapshot = {
            let mut state = self.state.write();
            change(&mut state);
            state.snapshot()
        };
        info!(environment = %snapshot, "Wallet environment changed");
        self.changes.send_replace(snapshot);
    }
}

impl WalletProvider for InMemoryWallet {
    fn network_id(&self) -> Option<NetworkId> {
        self.state.read().network_id
    }

    fn signer_id(&self) -> Option<SignerId> {
        self.state.read().account.as_ref().map(SignerId::new)
    }

    fn rpc_url(&self) -> Option<String> {
        self.state.read().rpc_url.clone()
    }

    fn subscribe(&self) -> watch::Receiver<EnvironmentSnapshot> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_reports_identity() {
        let wallet = InMemoryWallet::connected(NetworkId::LOCAL_DEV, "0xABCD");
        assert_eq!(wallet.network_id(), Some(NetworkId::LOCAL_DEV));
        assert_eq!(wallet.signer_id(), Some(SignerId::new("0xabcd")));
        assert_eq!(wallet.rpc_url(), None);
    }

    #[test]
    fn test_disconnected() {
        let wallet = InMemoryWallet::disconnected();
        assert_eq!(wallet.network_id(), None);
        assert_eq!(wallet.signer_id(), None);

        wallet.connect(NetworkId::SEPOLIA, "0x1");
        assert_eq!(wallet.network_id(), Some(NetworkId::SEPOLIA));
    }

    #[test]
    fn test_rpc_url() {
        let wallet = InMemoryWallet::connected(NetworkId::SEPOLIA, "0x1")
            .with_rpc_url("https://rpc.sepolia.example");
        assert_eq!(wallet.rpc_url().as_deref(), Some("https://rpc.sepolia.example"));
    }

    #[tokio::test]
    async fn test_changes_are_published() {
        let wallet = InMemoryWallet::connected(NetworkId::LOCAL_DEV, "0x1");
        let mut rx = wallet.subscribe();

        wallet.switch_network(NetworkId::SEPOLIA);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().network_id(), Some(NetworkId::SEPOLIA));

        wallet.disconnect();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_connected());
    }
}
