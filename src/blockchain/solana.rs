use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::traits::ChainClient;
use crate::core::domain::{Chain, FeeEstimate, PrivateKey, TxIntent, TxReceipt};
use crate::core::errors::WalletError;

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Minimal Solana JSON-RPC client. Balance queries are real; transaction
/// building and submission are a stated gap and return `NotImplemented`
/// rather than a fabricated success.
pub struct SolanaClient {
    http: reqwest::Client,
    rpc_url: String,
    network: String,
}

impl SolanaClient {
    /// Connect to `rpc_url` and probe it with `getHealth` so the registry's
    /// fallback logic can tell a dead endpoint from a live one.
    pub async fn connect(rpc_url: &str, network: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        let client =
            Self { http, rpc_url: rpc_url.trim().to_string(), network: network.to_string() };

        let health: Value = client.rpc_call("getHealth", json!([])).await.map_err(|e| {
            anyhow::anyhow!("Solana endpoint {} failed health check: {}", rpc_url, e)
        })?;
        debug!(url = %client.rpc_url, health = %health, "Solana endpoint healthy");

        info!("Connected to solana {} cluster", network);
        Ok(client)
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WalletError::ProviderUnavailable(format!("Solana RPC error: {}", e)))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| WalletError::ProviderUnavailable(format!("Malformed RPC response: {}", e)))?;

        if let Some(error) = payload.get("error") {
            return Err(WalletError::Rejected(format!("Solana node error: {}", error)));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| WalletError::ProviderUnavailable("RPC response missing result".to_string()))
    }
}

/// Format lamports as whole SOL without float rounding.
fn lamports_to_sol(lamports: u64) -> String {
    let whole = lamports / LAMPORTS_PER_SOL;
    let frac = lamports % LAMPORTS_PER_SOL;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:09}", frac);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

#[async_trait]
impl ChainClient for SolanaClient {
    fn chain(&self) -> Chain {
        Chain::Solana
    }

    fn network(&self) -> &str {
        &self.network
    }

    fn chain_id(&self) -> Option<u64> {
        None
    }

    fn validate_address(&self, address: &str) -> bool {
        matches!(bs58::decode(address).into_vec(), Ok(bytes) if bytes.len() == 32)
    }

    async fn get_balance(&self, address: &str) -> Result<String, WalletError> {
        if !self.validate_address(address) {
            return Err(WalletError::ValidationError(format!(
                "Invalid Solana address: {}",
                address
            )));
        }

        debug!("Getting SOL balance for address: {}", address);
        let result = self.rpc_call("getBalance", json!([address])).await?;
        let lamports = result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| WalletError::ProviderUnavailable("Malformed balance response".to_string()))?;

        Ok(lamports_to_sol(lamports))
    }

    async fn get_gas_price(&self) -> Result<String, WalletError> {
        Err(WalletError::NotImplemented("Solana fee queries".to_string()))
    }

    async fn estimate_transaction(&self, _intent: &TxIntent) -> Result<FeeEstimate, WalletError> {
        Err(WalletError::NotImplemented("Solana fee estimation".to_string()))
    }

    async fn send_transaction(
        &self,
        _key: &PrivateKey,
        _intent: &TxIntent,
    ) -> Result<TxReceipt, WalletError> {
        // No transaction design exists for Solana yet. Returning a typed gap
        // beats inventing a hash.
        Err(WalletError::NotImplemented("Solana transaction submission".to_string()))
    }
}
