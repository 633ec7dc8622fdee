//! Shared fixtures for the integration suites: a recording approval surface
//! and a background wired to in-memory storage with dark RPC endpoints, so
//! no test depends on a live network.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use pedals_wallet::background::{ApprovalSurface, Background, Command, PendingSummary};
use pedals_wallet::core::config::WalletConfig;
use pedals_wallet::core::derivation::Bip44Derivation;
use pedals_wallet::core::errors::WalletError;
use pedals_wallet::storage::MemoryStore;

pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const TEST_PASSWORD: &str = "Str0ng!Pass";
pub const TEST_ETH_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";
pub const DAPP_ORIGIN: &str = "https://dapp.example";

/// Approval surface double: records prompts so tests can fish out the
/// correlation id the popup would display.
#[derive(Default)]
pub struct RecordingSurface {
    opened: Mutex<Vec<PendingSummary>>,
    closed: Mutex<Vec<Uuid>>,
    fail_open: Mutex<bool>,
}

impl RecordingSurface {
    pub fn opened(&self) -> Vec<PendingSummary> {
        self.opened.lock().clone()
    }

    pub fn closed(&self) -> Vec<Uuid> {
        self.closed.lock().clone()
    }

    pub fn set_fail_open(&self, fail: bool) {
        *self.fail_open.lock() = fail;
    }

    /// Wait until `count` prompts have been shown and return the latest.
    pub async fn wait_for_open(&self, count: usize) -> PendingSummary {
        for _ in 0..500 {
            {
                let opened = self.opened.lock();
                if opened.len() >= count {
                    return opened[count - 1].clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("approval surface never showed request #{}", count);
    }
}

#[async_trait]
impl ApprovalSurface for RecordingSurface {
    async fn open(&self, request: &PendingSummary) -> Result<(), WalletError> {
        if *self.fail_open.lock() {
            return Err(WalletError::InternalError("popup blocked".to_string()));
        }
        self.opened.lock().push(request.clone());
        Ok(())
    }

    async fn close(&self, request_id: Uuid) {
        self.closed.lock().push(request_id);
    }
}

/// Config with fast KDF, short RPC timeouts and endpoints nothing listens
/// on. Tests that need a live-looking endpoint swap in an httpmock URL.
pub fn test_config() -> WalletConfig {
    let mut config = WalletConfig::default();
    config.security.pbkdf2_iterations = 1_000;
    config.blockchain.rpc_timeout_secs = 1;
    for table in config.blockchain.networks.values_mut() {
        for network in table.values_mut() {
            network.rpc_url = "http://127.0.0.1:59900".to_string();
            network.backup_rpc_urls.clear();
        }
    }
    config
}

pub async fn test_background(config: WalletConfig) -> (Arc<Background>, Arc<RecordingSurface>) {
    let surface = Arc::new(RecordingSurface::default());
    let store = Arc::new(MemoryStore::new());
    let background = Background::new(
        config,
        store.clone(),
        store,
        Arc::new(Bip44Derivation),
        surface.clone(),
    )
    .await
    .expect("background should build");
    (background, surface)
}

/// Create the fixture wallet; the background is unlocked afterwards.
pub async fn create_wallet(background: &Arc<Background>) {
    let reply = background
        .handle(Command::CreateWallet {
            password: TEST_PASSWORD.to_string(),
            mnemonic: TEST_MNEMONIC.to_string(),
        })
        .await;
    assert!(reply.success, "wallet creation failed: {:?}", reply.message);
}
