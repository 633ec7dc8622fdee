use async_trait::async_trait;
use ethers::{
    prelude::{JsonRpcClient, SignerMiddleware},
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Eip1559TransactionRequest, NameOrAddress, TransactionRequest, U256},
    utils::parse_ether,
};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info, warn};

use super::traits::ChainClient;
use crate::core::domain::{Chain, FeeEstimate, PrivateKey, TxIntent, TxReceipt};
use crate::core::errors::WalletError;

/// Standard gas limit for a plain ETH transfer.
const DEFAULT_GAS_LIMIT: u64 = 21_000;

#[derive(Clone)]
pub struct EthereumClient<P: JsonRpcClient + Clone = Http> {
    provider: Provider<P>,
    network: String,
    chain_id: u64,
    confirmations: usize,
}

impl EthereumClient<Http> {
    /// Connect to `rpc_url` and verify it serves `expected_chain_id`. The
    /// chain-id round trip doubles as the reachability probe the registry
    /// relies on for endpoint fallback.
    pub async fn connect(
        rpc_url: &str,
        network: &str,
        expected_chain_id: u64,
        timeout: Duration,
        confirmations: usize,
    ) -> anyhow::Result<Self> {
        let rpc_url_clean = rpc_url.trim();
        let parsed_url = reqwest::Url::parse(rpc_url_clean)
            .map_err(|e| anyhow::anyhow!("Invalid Ethereum RPC URL '{}': {}", rpc_url_clean, e))?;

        debug!(url = %parsed_url, network = %network, "Connecting to Ethereum endpoint");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        let provider = Provider::new(Http::new_with_client(parsed_url.clone(), client));

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get chain ID from {}: {}", parsed_url, e))?
            .as_u64();

        if chain_id != expected_chain_id {
            return Err(anyhow::anyhow!(
                "Endpoint {} serves chain id {}, expected {}",
                parsed_url,
                chain_id,
                expected_chain_id
            ));
        }

        info!("Connected to {} (Chain ID: {})", network, chain_id);
        Ok(Self { provider, network: network.to_string(), chain_id, confirmations })
    }
}

impl<P> EthereumClient<P>
where
    P: JsonRpcClient + Clone + Send + Sync,
{
    /// Build a client around an existing provider. Useful for testing with a
    /// `MockProvider` instead of a live endpoint.
    pub fn new_with_provider(provider: Provider<P>, network: &str, chain_id: u64) -> Self {
        Self { provider, network: network.to_string(), chain_id, confirmations: 1 }
    }

    fn create_wallet_from_private_key(&self, key: &PrivateKey) -> Result<LocalWallet, WalletError> {
        // Do NOT log key material.
        key.with_secret(|bytes| LocalWallet::from_bytes(bytes))
            .map_err(|e| WalletError::InternalError(format!("Invalid private key: {}", e)))
            .map(|wallet| wallet.with_chain_id(self.chain_id))
    }

    async fn gas_price_wei(&self) -> Result<U256, WalletError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| WalletError::ProviderUnavailable(format!("Failed to get gas price: {}", e)))
    }
}

/// Classify a submission failure. Insufficient funds and node-level
/// rejections are terminal and must surface verbatim; only transport
/// failures map to `ProviderUnavailable`.
fn map_send_error(msg: String) -> WalletError {
    let lowered = msg.to_lowercase();
    if lowered.contains("insufficient funds") {
        return WalletError::InsufficientFunds(msg);
    }
    if lowered.contains("error sending request")
        || lowered.contains("connection")
        || lowered.contains("timed out")
        || lowered.contains("timeout")
    {
        return WalletError::ProviderUnavailable(msg);
    }
    WalletError::Rejected(msg)
}

#[async_trait]
impl<P> ChainClient for EthereumClient<P>
where
    P: JsonRpcClient + Clone + 'static + Send + Sync,
{
    fn chain(&self) -> Chain {
        Chain::Ethereum
    }

    fn network(&self) -> &str {
        &self.network
    }

    fn chain_id(&self) -> Option<u64> {
        Some(self.chain_id)
    }

    fn validate_address(&self, address: &str) -> bool {
        Address::from_str(address).is_ok()
    }

    async fn get_balance(&self, address: &str) -> Result<String, WalletError> {
        debug!("Getting ETH balance for address: {}", address);

        let address = Address::from_str(address)
            .map_err(|e| WalletError::ValidationError(format!("Invalid Ethereum address: {}", e)))?;

        let balance = self
            .provider
            .get_balance(address, None)
            .await
            .map_err(|e| WalletError::ProviderUnavailable(format!("Failed to get balance: {}", e)))?;

        Ok(ethers::utils::format_ether(balance))
    }

    async fn get_gas_price(&self) -> Result<String, WalletError> {
        let price = self.gas_price_wei().await?;
        Ok(price.to_string())
    }

    async fn estimate_transaction(&self, intent: &TxIntent) -> Result<FeeEstimate, WalletError> {
        let to_address = Address::from_str(&intent.to)
            .map_err(|e| WalletError::ValidationError(format!("Invalid recipient address: {}", e)))?;
        let amount_wei = parse_ether(&intent.value)
            .map_err(|e| WalletError::ValidationError(format!("Invalid amount: {}", e)))?;

        let gas_price = self.gas_price_wei().await?;

        let gas_limit = match &intent.gas_limit {
            Some(limit) => U256::from_dec_str(limit)
                .map_err(|e| WalletError::ValidationError(format!("Invalid gas limit: {}", e)))?,
            None => {
                let call = TransactionRequest::new().to(to_address).value(amount_wei);
                self.provider
                    .estimate_gas(&call.into(), None)
                    .await
                    .unwrap_or_else(|e| {
                        // Estimation feeds display, not fund movement; fall
                        // back to the plain-transfer limit.
                        warn!("Gas estimation failed, using default: {}", e);
                        U256::from(DEFAULT_GAS_LIMIT)
                    })
            }
        };

        Ok(FeeEstimate { gas_limit: gas_limit.to_string(), gas_price: gas_price.to_string() })
    }

    async fn send_transaction(
        &self,
        key: &PrivateKey,
        intent: &TxIntent,
    ) -> Result<TxReceipt, WalletError> {
        info!("Sending {} ETH to {}", intent.value, intent.to);

        let wallet = self.create_wallet_from_private_key(key)?;

        let to_address = Address::from_str(&intent.to)
            .map_err(|e| WalletError::ValidationError(format!("Invalid recipient address: {}", e)))?;
        let amount_wei = parse_ether(&intent.value)
            .map_err(|e| WalletError::ValidationError(format!("Invalid amount: {}", e)))?;

        let gas_price = match &intent.gas_price {
            Some(price) => U256::from_dec_str(price)
                .map_err(|e| WalletError::ValidationError(format!("Invalid gas price: {}", e)))?,
            None => self.gas_price_wei().await?,
        };
        let gas_limit = match &intent.gas_limit {
            Some(limit) => U256::from_dec_str(limit)
                .map_err(|e| WalletError::ValidationError(format!("Invalid gas limit: {}", e)))?,
            None => U256::from(DEFAULT_GAS_LIMIT),
        };

        let nonce = self
            .provider
            .get_transaction_count(wallet.address(), None)
            .await
            .map_err(|e| WalletError::ProviderUnavailable(format!("Failed to get nonce: {}", e)))?;

        // EIP-1559 (type-2): derive fee caps from the reported gas price.
        let max_fee_per_gas = gas_price.saturating_mul(U256::from(2u64));
        let max_priority_fee_per_gas =
            (gas_price / U256::from(10u64)).max(U256::from(1_000_000_000u64)); // >= 1 gwei

        let tx = Eip1559TransactionRequest {
            to: Some(NameOrAddress::Address(to_address)),
            value: Some(amount_wei),
            gas: Some(gas_limit),
            nonce: Some(nonce),
            max_fee_per_gas: Some(max_fee_per_gas),
            max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
            ..Default::default()
        };

        let client = SignerMiddleware::new(self.provider.clone(), wallet);

        let pending_tx = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| map_send_error(e.to_string()))?;

        let tx_hash = format!("0x{}", hex::encode(pending_tx.tx_hash().as_bytes()));

        // Wait for inclusion before reporting success.
        let receipt = pending_tx
            .confirmations(self.confirmations)
            .await
            .map_err(|e| map_send_error(e.to_string()))?
            .ok_or_else(|| WalletError::Rejected("Transaction dropped from mempool".to_string()))?;

        let block_number = receipt.block_number.map(|n| n.as_u64());
        info!(tx_hash = %tx_hash, block = ?block_number, "Transaction confirmed");

        Ok(TxReceipt { hash: tx_hash, block_number })
    }
}
