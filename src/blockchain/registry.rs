//! Provider registry with backup-endpoint fallback.
//!
//! Maps (chain, network) to a live [`ChainClient`] handle. Construction
//! walks the configured endpoint list in order: primary first, then each
//! backup, and only reports `ProviderUnavailable` once every candidate has
//! failed. A temporarily dark network is a typed result here, never a panic
//! or a hang: connection attempts carry the configured RPC timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::ethereum::EthereumClient;
use super::solana::SolanaClient;
use super::traits::ChainClient;
use crate::core::config::BlockchainConfig;
use crate::core::domain::Chain;
use crate::core::errors::WalletError;

pub struct ChainProviderRegistry {
    config: BlockchainConfig,
    clients: RwLock<HashMap<(Chain, String), Arc<dyn ChainClient>>>,
}

impl ChainProviderRegistry {
    pub fn new(config: BlockchainConfig) -> Self {
        Self { config, clients: RwLock::new(HashMap::new()) }
    }

    /// Get (or lazily build) the provider for (chain, network). Returns
    /// `ProviderUnavailable` only after the primary endpoint and every backup
    /// failed; callers degrade instead of crashing.
    pub async fn get_provider(
        &self,
        chain: Chain,
        network: &str,
    ) -> Result<Arc<dyn ChainClient>, WalletError> {
        let key = (chain, network.to_string());
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(&key) {
                return Ok(client.clone());
            }
        }

        let client = self.build_client(chain, network).await?;

        let mut clients = self.clients.write().await;
        // A concurrent builder may have won the race; keep the first one.
        let entry = clients.entry(key).or_insert(client);
        Ok(entry.clone())
    }

    /// Rebuild the provider for (chain, network), replacing the cached handle
    /// only on success. Returns whether the swap happened, so callers advance
    /// the active-network state only when it did.
    pub async fn update_provider(&self, chain: Chain, network: &str) -> bool {
        match self.build_client(chain, network).await {
            Ok(client) => {
                let mut clients = self.clients.write().await;
                clients.insert((chain, network.to_string()), client);
                info!(chain = %chain, network = %network, "Provider updated");
                true
            }
            Err(e) => {
                warn!(chain = %chain, network = %network, "Provider update failed: {}", e);
                false
            }
        }
    }

    /// Register a pre-built handle, replacing any cached one. Used by tests
    /// and by embedders supplying custom transports.
    pub async fn insert_client(&self, client: Arc<dyn ChainClient>) {
        let key = (client.chain(), client.network().to_string());
        self.clients.write().await.insert(key, client);
    }

    /// Drop the cached handle so the next `get_provider` reconnects.
    pub async fn evict(&self, chain: Chain, network: &str) {
        self.clients.write().await.remove(&(chain, network.to_string()));
    }

    async fn build_client(
        &self,
        chain: Chain,
        network: &str,
    ) -> Result<Arc<dyn ChainClient>, WalletError> {
        let network_config = self.config.network(chain, network).ok_or_else(|| {
            WalletError::ValidationError(format!("Unknown network: {} {}", chain, network))
        })?;

        let timeout = Duration::from_secs(self.config.rpc_timeout_secs);

        let mut candidates = Vec::with_capacity(1 + network_config.backup_rpc_urls.len());
        candidates.push(network_config.rpc_url.as_str());
        candidates.extend(network_config.backup_rpc_urls.iter().map(String::as_str));

        let mut last_error = String::new();
        for (i, url) in candidates.iter().enumerate() {
            debug!(chain = %chain, network = %network, endpoint = i, "Trying RPC endpoint");
            let attempt: anyhow::Result<Arc<dyn ChainClient>> = match chain {
                Chain::Ethereum => {
                    let chain_id = network_config.chain_id.ok_or_else(|| {
                        anyhow::anyhow!("Missing chain id for ethereum {}", network)
                    })?;
                    EthereumClient::connect(
                        url,
                        network,
                        chain_id,
                        timeout,
                        self.config.confirmations,
                    )
                    .await
                    .map(|c| Arc::new(c) as Arc<dyn ChainClient>)
                }
                Chain::Solana => SolanaClient::connect(url, network, timeout)
                    .await
                    .map(|c| Arc::new(c) as Arc<dyn ChainClient>),
            };

            match attempt {
                Ok(client) => {
                    if i > 0 {
                        info!(chain = %chain, network = %network,
                              "Primary endpoint down, using backup #{}", i);
                    }
                    return Ok(client);
                }
                Err(e) => {
                    warn!(chain = %chain, network = %network, endpoint = i,
                          "RPC endpoint failed: {}", e);
                    last_error = e.to_string();
                }
            }
        }

        Err(WalletError::ProviderUnavailable(format!(
            "All endpoints failed for {} {}: {}",
            chain, network, last_error
        )))
    }
}
