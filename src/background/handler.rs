//! The privileged background context.
//!
//! `Background` owns every component and exposes exactly one entry point,
//! [`Background::handle`]: a single dispatch over the closed [`Command`]
//! variant set. Suspension (human approvals, network round trips) happens
//! inside individual handlers; the relay spawns a task per request, so a
//! parked approval never blocks an unrelated balance query.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use super::authorizer::OriginAuthorizer;
use super::broker::ApprovalBroker;
use super::command::{Command, CommandReply};
use super::pending::{ApprovalOutcome, Decision, RequestKind};
use super::surface::ApprovalSurface;
use crate::blockchain::ChainProviderRegistry;
use crate::core::config::WalletConfig;
use crate::core::derivation::{Bip44Derivation, KeyDerivation};
use crate::core::domain::{Chain, TxReceipt};
use crate::core::errors::WalletError;
use crate::service::TransactionService;
use crate::storage::{GrantStore, SecretStore, SqliteStore};
use crate::vault::SecretVault;

/// Push notifications for provider objects: connected pages learn about
/// account, chain and grant changes without polling.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WalletEvent {
    AccountsChanged { accounts: Vec<String> },
    ChainChanged { chain: Chain, network: String, chain_id: Option<u64> },
    Disconnected { origin: String },
}

pub struct Background {
    config: WalletConfig,
    vault: Arc<SecretVault>,
    registry: Arc<ChainProviderRegistry>,
    transactions: Arc<TransactionService>,
    authorizer: Arc<OriginAuthorizer>,
    broker: Arc<ApprovalBroker>,
    events: broadcast::Sender<WalletEvent>,
}

impl Background {
    /// Wire the full component graph over the given stores and surface.
    pub async fn new(
        config: WalletConfig,
        secret_store: Arc<dyn SecretStore>,
        grant_store: Arc<dyn GrantStore>,
        derivation: Arc<dyn KeyDerivation>,
        surface: Arc<dyn ApprovalSurface>,
    ) -> Result<Arc<Self>, WalletError> {
        let default_chain = Chain::Ethereum;
        let default_network = config.blockchain.default_network(default_chain).to_string();

        let vault = Arc::new(SecretVault::new(
            secret_store,
            derivation,
            config.security.clone(),
            default_chain,
            &default_network,
        ));
        let registry = Arc::new(ChainProviderRegistry::new(config.blockchain.clone()));
        let transactions = Arc::new(TransactionService::new(
            registry.clone(),
            vault.clone(),
            config.gas_tiers.clone(),
        ));

        let authorizer = Arc::new(OriginAuthorizer::new(grant_store));
        authorizer.load().await?;

        let broker = Arc::new(ApprovalBroker::new(
            vault.clone(),
            authorizer.clone(),
            transactions.clone(),
            surface,
            config.blockchain.clone(),
            Duration::from_secs(config.approval.decision_timeout_secs),
        ));

        let (events, _) = broadcast::channel(64);

        Ok(Arc::new(Self { config, vault, registry, transactions, authorizer, broker, events }))
    }

    /// Convenience constructor: SQLite storage from the config URL, standard
    /// derivation.
    pub async fn with_sqlite(
        config: WalletConfig,
        surface: Arc<dyn ApprovalSurface>,
    ) -> Result<Arc<Self>, WalletError> {
        let store = Arc::new(
            SqliteStore::new_with_url(&config.storage.database_url)
                .await
                .map_err(|e| WalletError::StorageError(e.to_string()))?,
        );
        Self::new(config, store.clone(), store, Arc::new(Bip44Derivation), surface).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    pub fn vault(&self) -> &Arc<SecretVault> {
        &self.vault
    }

    pub fn broker(&self) -> &Arc<ApprovalBroker> {
        &self.broker
    }

    pub fn authorizer(&self) -> &Arc<OriginAuthorizer> {
        &self.authorizer
    }

    pub fn registry(&self) -> &Arc<ChainProviderRegistry> {
        &self.registry
    }

    /// Resolve outstanding approvals before teardown so no relayed caller
    /// hangs on a vanished background.
    pub async fn shutdown(&self) {
        self.broker.shutdown().await;
    }

    /// Handle one command to a `{success, ...}` reply. Never panics and
    /// never throws past this boundary: every failure is a tagged reply.
    pub async fn handle(&self, command: Command) -> CommandReply {
        // Payloads can carry passwords; log tags only.
        debug!(command = command.tag(), "Handling command");
        CommandReply::from_result(self.dispatch(command).await)
    }

    async fn dispatch(&self, command: Command) -> Result<Value, WalletError> {
        match command {
            Command::GenerateMnemonic => {
                let mnemonic = self.vault.generate_mnemonic()?;
                Ok(json!({ "mnemonic": mnemonic }))
            }

            Command::CreateWallet { password, mnemonic } => {
                let accounts = self.vault.create(&password, &mnemonic).await?;
                self.emit_accounts_changed();
                Ok(json!({ "accounts": accounts }))
            }

            Command::ImportWallet { mnemonic, password } => {
                let accounts = self.vault.import(&mnemonic, &password).await?;
                self.emit_accounts_changed();
                Ok(json!({ "accounts": accounts }))
            }

            Command::UnlockWallet { password } => {
                let accounts = self.vault.unlock(&password).await?;
                self.emit_accounts_changed();
                Ok(json!({ "accounts": accounts }))
            }

            Command::LockWallet => {
                self.vault.lock();
                self.emit(WalletEvent::AccountsChanged { accounts: Vec::new() });
                Ok(Value::Null)
            }

            Command::CheckWalletStatus => {
                let exists = self.vault.exists().await?;
                Ok(json!({
                    "exists": exists,
                    "isUnlocked": self.vault.is_unlocked(),
                }))
            }

            Command::GetAccounts => {
                let accounts = self.vault.addresses()?;
                Ok(json!({
                    "accounts": accounts,
                    "activeChain": self.vault.active_chain(),
                    "activeNetwork": self.vault.active_network(),
                }))
            }

            Command::GetTokens { chain, network } => {
                let tokens = self.transactions.token_balances(chain, &network).await?;
                Ok(json!({ "tokens": tokens }))
            }

            Command::GetGasPrice { chain, network } => {
                let quote = self.transactions.gas_price(chain, &network).await?;
                Ok(json!({ "gasPrice": quote }))
            }

            Command::EstimateTransaction { chain, network, transaction } => {
                let estimate = self.transactions.estimate(chain, &network, &transaction).await?;
                Ok(json!({ "estimate": estimate }))
            }

            Command::SendTransaction { transaction, origin } => match origin {
                // Page-initiated: full authorization + approval path.
                Some(origin) => {
                    let outcome = self.broker.request_transaction(&origin, transaction).await?;
                    match outcome {
                        ApprovalOutcome::Submitted(receipt) => Ok(Self::receipt_payload(&receipt)),
                        ApprovalOutcome::Connected { .. } => Err(WalletError::InternalError(
                            "Unexpected outcome for transaction request".to_string(),
                        )),
                    }
                }
                // Wallet-initiated from the send screen: the user already
                // acted, no approval surface.
                None => {
                    let chain = self.vault.active_chain();
                    let network = self.vault.active_network();
                    let receipt = self.transactions.send(chain, &network, &transaction).await?;
                    Ok(Self::receipt_payload(&receipt))
                }
            },

            Command::UpdateNetwork { chain, network } => {
                let network_config = self
                    .config
                    .blockchain
                    .network(chain, &network)
                    .ok_or_else(|| {
                        WalletError::ValidationError(format!(
                            "Unknown network: {} {}",
                            chain, network
                        ))
                    })?
                    .clone();

                if !self.registry.update_provider(chain, &network).await {
                    return Err(WalletError::ProviderUnavailable(format!(
                        "Could not reach any endpoint for {} {}",
                        chain, network
                    )));
                }

                // Advance state only after the swap succeeded.
                self.vault.set_active_network(chain, &network);
                self.emit(WalletEvent::ChainChanged {
                    chain,
                    network: network.clone(),
                    chain_id: network_config.chain_id,
                });

                Ok(json!({
                    "chain": chain,
                    "network": network,
                    "chainId": network_config.chain_id.map(Self::chain_id_hex),
                }))
            }

            Command::ConnectRequest { origin } => {
                let outcome = self.broker.request_connection(&origin).await?;
                match outcome {
                    ApprovalOutcome::Connected { accounts, chain, network, chain_id } => {
                        Ok(json!({
                            "accounts": [accounts.ethereum_address],
                            "chainId": chain_id.map(Self::chain_id_hex),
                            "chain": chain,
                            "network": network,
                        }))
                    }
                    ApprovalOutcome::Submitted(_) => Err(WalletError::InternalError(
                        "Unexpected outcome for connection request".to_string(),
                    )),
                }
            }

            Command::ConnectionApproved { request_id } => {
                self.broker
                    .resolve(request_id, Decision::Approved, Some(RequestKind::Connect))
                    .await?;
                Ok(Value::Null)
            }

            Command::ConnectionRejected { request_id } => {
                self.broker
                    .resolve(request_id, Decision::Rejected, Some(RequestKind::Connect))
                    .await?;
                Ok(Value::Null)
            }

            Command::TransactionApproved { request_id } => {
                self.broker
                    .resolve(request_id, Decision::Approved, Some(RequestKind::Transaction))
                    .await?;
                Ok(Value::Null)
            }

            Command::TransactionRejected { request_id } => {
                self.broker
                    .resolve(request_id, Decision::Rejected, Some(RequestKind::Transaction))
                    .await?;
                Ok(Value::Null)
            }

            Command::GetPendingRequest { request_id } => {
                let summary = self
                    .broker
                    .pending()
                    .summary(request_id)
                    .ok_or_else(|| WalletError::NotFound("No pending request".to_string()))?;
                Ok(json!({ "request": summary }))
            }

            Command::GetConnectedSites => Ok(json!({ "sites": self.authorizer.list() })),

            Command::DisconnectSite { origin } => {
                let removed = self.authorizer.revoke(&origin).await?;
                if removed {
                    self.emit(WalletEvent::Disconnected { origin: origin.clone() });
                }
                Ok(json!({ "removed": removed }))
            }

            Command::ExportPrivateKey { chain } => {
                let key = self.vault.export_private_key(chain)?;
                Ok(json!({ "privateKey": key.as_str() }))
            }
        }
    }

    fn receipt_payload(receipt: &TxReceipt) -> Value {
        json!({ "hash": receipt.hash, "blockNumber": receipt.block_number })
    }

    fn chain_id_hex(id: u64) -> String {
        format!("0x{:x}", id)
    }

    fn emit_accounts_changed(&self) {
        let accounts = match self.vault.addresses() {
            Ok(addresses) => vec![addresses.ethereum_address],
            Err(_) => Vec::new(),
        };
        self.emit(WalletEvent::AccountsChanged { accounts });
    }

    fn emit(&self, event: WalletEvent) {
        // No subscribers is fine; events are best-effort notifications.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::pending::PendingSummary;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use uuid::Uuid;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    struct SilentSurface;

    #[async_trait]
    impl ApprovalSurface for SilentSurface {
        async fn open(&self, _request: &PendingSummary) -> Result<(), WalletError> {
            Ok(())
        }

        async fn close(&self, _request_id: Uuid) {}
    }

    async fn background() -> Arc<Background> {
        let mut config = WalletConfig::default();
        config.security.pbkdf2_iterations = 1_000;
        // Dark endpoints: no test here may depend on live RPC.
        for table in config.blockchain.networks.values_mut() {
            for network in table.values_mut() {
                network.rpc_url = "http://127.0.0.1:59977".to_string();
                network.backup_rpc_urls.clear();
            }
        }
        config.blockchain.rpc_timeout_secs = 1;

        let store = Arc::new(MemoryStore::new());
        Background::new(
            config,
            store.clone(),
            store,
            Arc::new(Bip44Derivation),
            Arc::new(SilentSurface),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_mnemonic_command() {
        let bg = background().await;
        let reply = bg.handle(Command::GenerateMnemonic).await;
        assert!(reply.success);
        let mnemonic = reply.get("mnemonic").unwrap().as_str().unwrap();
        assert_eq!(mnemonic.split_whitespace().count(), 12);
    }

    #[tokio::test]
    async fn test_wallet_status_lifecycle() {
        let bg = background().await;

        let reply = bg.handle(Command::CheckWalletStatus).await;
        assert_eq!(reply.get("exists"), Some(&json!(false)));
        assert_eq!(reply.get("isUnlocked"), Some(&json!(false)));

        let reply = bg
            .handle(Command::CreateWallet {
                password: "Str0ng!Pass".to_string(),
                mnemonic: TEST_MNEMONIC.to_string(),
            })
            .await;
        assert!(reply.success, "create failed: {:?}", reply.error);

        let reply = bg.handle(Command::CheckWalletStatus).await;
        assert_eq!(reply.get("exists"), Some(&json!(true)));
        assert_eq!(reply.get("isUnlocked"), Some(&json!(true)));

        let reply = bg.handle(Command::LockWallet).await;
        assert!(reply.success);
        let reply = bg.handle(Command::CheckWalletStatus).await;
        assert_eq!(reply.get("isUnlocked"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn test_get_accounts_locked_gives_stable_code() {
        let bg = background().await;
        let reply = bg.handle(Command::GetAccounts).await;
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("Locked"));
    }

    #[tokio::test]
    async fn test_wrong_password_unlock_reply() {
        let bg = background().await;
        bg.handle(Command::CreateWallet {
            password: "Str0ng!Pass".to_string(),
            mnemonic: TEST_MNEMONIC.to_string(),
        })
        .await;
        bg.handle(Command::LockWallet).await;

        let reply =
            bg.handle(Command::UnlockWallet { password: "Wr0ng!Pass".to_string() }).await;
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("InvalidPassword"));

        // Vault stayed locked.
        let reply = bg.handle(Command::GetAccounts).await;
        assert_eq!(reply.error.as_deref(), Some("Locked"));
    }

    #[tokio::test]
    async fn test_update_network_unknown_name() {
        let bg = background().await;
        let reply = bg
            .handle(Command::UpdateNetwork {
                chain: Chain::Ethereum,
                network: "goerli".to_string(),
            })
            .await;
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("ValidationError"));
    }

    #[tokio::test]
    async fn test_update_network_unreachable_keeps_active_state() {
        let bg = background().await;
        let reply = bg
            .handle(Command::UpdateNetwork {
                chain: Chain::Ethereum,
                network: "mainnet".to_string(),
            })
            .await;
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("ProviderUnavailable"));
        // The swap failed, so the active pair did not advance.
        assert_eq!(bg.vault().active_network(), "sepolia");
    }

    #[tokio::test]
    async fn test_page_send_from_unconnected_origin() {
        let bg = background().await;
        bg.handle(Command::CreateWallet {
            password: "Str0ng!Pass".to_string(),
            mnemonic: TEST_MNEMONIC.to_string(),
        })
        .await;

        let reply = bg
            .handle(Command::SendTransaction {
                transaction: crate::core::domain::TxIntent::new(
                    "0x742d35Cc6634C0532925a3b8D400e8B78fFe4860",
                    "0.1",
                ),
                origin: Some("https://dapp.example".to_string()),
            })
            .await;
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("NotConnected"));
    }

    #[tokio::test]
    async fn test_decision_for_unknown_request_is_noop_reply() {
        let bg = background().await;
        let reply =
            bg.handle(Command::ConnectionApproved { request_id: Uuid::new_v4() }).await;
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("NotFound"));
    }

    #[tokio::test]
    async fn test_export_requires_unlock_and_logs_shape() {
        let bg = background().await;
        let reply = bg.handle(Command::ExportPrivateKey { chain: Chain::Ethereum }).await;
        assert_eq!(reply.error.as_deref(), Some("Locked"));

        bg.handle(Command::CreateWallet {
            password: "Str0ng!Pass".to_string(),
            mnemonic: TEST_MNEMONIC.to_string(),
        })
        .await;
        let reply = bg.handle(Command::ExportPrivateKey { chain: Chain::Ethereum }).await;
        assert!(reply.success);
        let key = reply.get("privateKey").unwrap().as_str().unwrap();
        assert!(key.starts_with("0x"));
        assert_eq!(key.len(), 66);
    }

    #[tokio::test]
    async fn test_disconnect_emits_event() {
        let bg = background().await;
        bg.handle(Command::CreateWallet {
            password: "Str0ng!Pass".to_string(),
            mnemonic: TEST_MNEMONIC.to_string(),
        })
        .await;
        bg.authorizer().grant("https://dapp.example", Chain::Ethereum, "sepolia").await.unwrap();

        let mut events = bg.subscribe();
        let reply = bg
            .handle(Command::DisconnectSite { origin: "https://dapp.example".to_string() })
            .await;
        assert!(reply.success);
        assert_eq!(reply.get("removed"), Some(&json!(true)));

        match events.recv().await.unwrap() {
            WalletEvent::Disconnected { origin } => assert_eq!(origin, "https://dapp.example"),
            other => panic!("unexpected event: {:?}", other),
        }

        let reply = bg.handle(Command::GetConnectedSites).await;
        assert_eq!(reply.get("sites"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_solana_send_from_ui_is_typed_gap() {
        let bg = background().await;
        bg.handle(Command::CreateWallet {
            password: "Str0ng!Pass".to_string(),
            mnemonic: TEST_MNEMONIC.to_string(),
        })
        .await;
        // Make solana the active chain without touching the network (the
        // provider swap would fail against dark endpoints).
        bg.vault().set_active_network(Chain::Solana, "testnet");

        let reply = bg
            .handle(Command::SendTransaction {
                transaction: crate::core::domain::TxIntent::new(
                    "11111111111111111111111111111111",
                    "1",
                ),
                origin: None,
            })
            .await;
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("NotImplemented"));
    }
}
