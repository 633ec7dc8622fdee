//! Transaction building, estimation and submission.
//!
//! Sits between the command layer and the chain clients: fetches the live
//! provider from the registry, pulls signing keys from the vault for the
//! duration of one signature, and forwards terminal outcomes verbatim.

use std::sync::Arc;
use tracing::{info, warn};

use crate::blockchain::ChainProviderRegistry;
use crate::core::config::GasTierConfig;
use crate::core::domain::{Chain, FeeEstimate, GasPriceQuote, TokenBalance, TxIntent, TxReceipt};
use crate::core::errors::WalletError;
use crate::vault::SecretVault;

/// Fallback values when estimation has no reachable provider. Estimation
/// feeds display, so a conservative default beats a failure.
const FALLBACK_GAS_LIMIT: u64 = 21_000;
const FALLBACK_GAS_PRICE_WEI: u128 = 1_000_000_000; // 1 gwei

pub struct TransactionService {
    registry: Arc<ChainProviderRegistry>,
    vault: Arc<SecretVault>,
    gas_tiers: GasTierConfig,
}

impl TransactionService {
    pub fn new(
        registry: Arc<ChainProviderRegistry>,
        vault: Arc<SecretVault>,
        gas_tiers: GasTierConfig,
    ) -> Self {
        Self { registry, vault, gas_tiers }
    }

    /// Estimate fees for `intent`. Read-only; a dark network degrades to the
    /// conservative defaults instead of failing the caller.
    pub async fn estimate(
        &self,
        chain: Chain,
        network: &str,
        intent: &TxIntent,
    ) -> Result<FeeEstimate, WalletError> {
        if chain == Chain::Solana {
            return Err(WalletError::NotImplemented("Solana fee estimation".to_string()));
        }

        let provider = match self.registry.get_provider(chain, network).await {
            Ok(provider) => provider,
            Err(WalletError::ProviderUnavailable(msg)) => {
                warn!("Estimation without provider, using defaults: {}", msg);
                return Ok(Self::fallback_estimate(intent));
            }
            Err(e) => return Err(e),
        };

        match provider.estimate_transaction(intent).await {
            Ok(estimate) => Ok(estimate),
            Err(WalletError::ProviderUnavailable(msg)) => {
                warn!("Estimation call failed, using defaults: {}", msg);
                Ok(Self::fallback_estimate(intent))
            }
            Err(e) => Err(e),
        }
    }

    /// Tiered gas price quote for the send screen. Degrades like `estimate`.
    pub async fn gas_price(
        &self,
        chain: Chain,
        network: &str,
    ) -> Result<GasPriceQuote, WalletError> {
        if chain == Chain::Solana {
            return Err(WalletError::NotImplemented("Solana fee queries".to_string()));
        }

        let base_wei = match self.registry.get_provider(chain, network).await {
            Ok(provider) => match provider.get_gas_price().await {
                Ok(price) => price
                    .parse::<u128>()
                    .map_err(|e| WalletError::InternalError(format!("Bad gas price: {}", e)))?,
                Err(WalletError::ProviderUnavailable(msg)) => {
                    warn!("Gas price unavailable, using fallback: {}", msg);
                    FALLBACK_GAS_PRICE_WEI
                }
                Err(e) => return Err(e),
            },
            Err(WalletError::ProviderUnavailable(msg)) => {
                warn!("Gas price without provider, using fallback: {}", msg);
                FALLBACK_GAS_PRICE_WEI
            }
            Err(e) => return Err(e),
        };

        Ok(self.quote_from_base(base_wei))
    }

    /// Native-token balance rows for the dashboard. A dark network yields
    /// `available: false` with a placeholder balance rather than an error.
    /// Requires an unlocked vault: addresses are only revealed with balances
    /// attached, which is a privileged read.
    pub async fn token_balances(
        &self,
        chain: Chain,
        network: &str,
    ) -> Result<Vec<TokenBalance>, WalletError> {
        let addresses = self.vault.addresses()?;
        let address = match chain {
            Chain::Ethereum => addresses.ethereum_address,
            Chain::Solana => addresses.solana_address,
        };

        let balance = match self.registry.get_provider(chain, network).await {
            Ok(provider) => provider.get_balance(&address).await,
            Err(e) => Err(e),
        };

        let row = match balance {
            Ok(balance) => TokenBalance {
                chain,
                network: network.to_string(),
                symbol: chain.native_symbol().to_string(),
                balance,
                available: true,
            },
            Err(WalletError::ProviderUnavailable(msg)) => {
                warn!("Balance unavailable for {} {}: {}", chain, network, msg);
                TokenBalance {
                    chain,
                    network: network.to_string(),
                    symbol: chain.native_symbol().to_string(),
                    balance: "0".to_string(),
                    available: false,
                }
            }
            Err(e) => return Err(e),
        };

        Ok(vec![row])
    }

    /// Sign and submit `intent`. Requires an unlocked vault; surfaces
    /// `InsufficientFunds`, `ProviderUnavailable` and `Rejected` verbatim. A
    /// failed submission is never retried here: a signed transaction is not
    /// idempotent on-chain, so retries are explicit user action.
    pub async fn send(
        &self,
        chain: Chain,
        network: &str,
        intent: &TxIntent,
    ) -> Result<TxReceipt, WalletError> {
        match chain {
            Chain::Ethereum => {
                let key = self.vault.ethereum_key()?;
                let provider = self.registry.get_provider(chain, network).await?;
                let receipt = provider.send_transaction(&key, intent).await?;
                info!(hash = %receipt.hash, "Transaction submitted and confirmed");
                Ok(receipt)
            }
            Chain::Solana => {
                // Submission has no design yet; vault state still gates the
                // attempt so a locked wallet fails the same way everywhere.
                if !self.vault.is_unlocked() {
                    return Err(WalletError::Locked);
                }
                Err(WalletError::NotImplemented("Solana transaction submission".to_string()))
            }
        }
    }

    fn fallback_estimate(intent: &TxIntent) -> FeeEstimate {
        let gas_limit = intent
            .gas_limit
            .clone()
            .unwrap_or_else(|| FALLBACK_GAS_LIMIT.to_string());
        FeeEstimate { gas_limit, gas_price: FALLBACK_GAS_PRICE_WEI.to_string() }
    }

    fn quote_from_base(&self, base_wei: u128) -> GasPriceQuote {
        let tier = |pct: u64| (base_wei.saturating_mul(pct as u128) / 100).to_string();
        GasPriceQuote {
            slow: tier(self.gas_tiers.slow_pct),
            standard: tier(self.gas_tiers.standard_pct),
            fast: tier(self.gas_tiers.fast_pct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{BlockchainConfig, SecurityConfig};
    use crate::core::derivation::Bip44Derivation;
    use crate::storage::MemoryStore;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn unreachable_config() -> BlockchainConfig {
        // Default endpoints swapped for ports nothing listens on.
        let mut config = BlockchainConfig::default();
        for table in config.networks.values_mut() {
            for network in table.values_mut() {
                network.rpc_url = "http://127.0.0.1:59979".to_string();
                network.backup_rpc_urls.clear();
            }
        }
        config.rpc_timeout_secs = 2;
        config
    }

    async fn make_service(unlock: bool) -> TransactionService {
        let vault = Arc::new(SecretVault::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Bip44Derivation),
            SecurityConfig { pbkdf2_iterations: 1_000, ..SecurityConfig::default() },
            Chain::Ethereum,
            "sepolia",
        ));
        if unlock {
            vault.create("Str0ng!Pass", TEST_MNEMONIC).await.unwrap();
        }
        let registry = Arc::new(ChainProviderRegistry::new(unreachable_config()));
        TransactionService::new(registry, vault, GasTierConfig::default())
    }

    #[tokio::test]
    async fn test_estimate_degrades_when_provider_unavailable() {
        let service = make_service(false).await;
        let intent = TxIntent::new("0x742d35Cc6634C0532925a3b8D400e8B78fFe4860", "0.1");

        let estimate = service.estimate(Chain::Ethereum, "sepolia", &intent).await.unwrap();
        assert_eq!(estimate.gas_limit, "21000");
        assert_eq!(estimate.gas_price, FALLBACK_GAS_PRICE_WEI.to_string());
    }

    #[tokio::test]
    async fn test_estimate_keeps_caller_gas_limit_in_fallback() {
        let service = make_service(false).await;
        let mut intent = TxIntent::new("0x742d35Cc6634C0532925a3b8D400e8B78fFe4860", "0.1");
        intent.gas_limit = Some("100000".to_string());

        let estimate = service.estimate(Chain::Ethereum, "sepolia", &intent).await.unwrap();
        assert_eq!(estimate.gas_limit, "100000");
    }

    #[tokio::test]
    async fn test_estimate_solana_is_typed_gap() {
        let service = make_service(false).await;
        let intent = TxIntent::new("11111111111111111111111111111111", "1");
        let result = service.estimate(Chain::Solana, "testnet", &intent).await;
        assert!(matches!(result.unwrap_err(), WalletError::NotImplemented(_)));
    }

    #[tokio::test]
    async fn test_gas_price_tiers_from_fallback_base() {
        let service = make_service(false).await;
        let quote = service.gas_price(Chain::Ethereum, "sepolia").await.unwrap();
        assert_eq!(quote.slow, "1000000000");
        assert_eq!(quote.standard, "1200000000");
        assert_eq!(quote.fast, "1500000000");
    }

    #[tokio::test]
    async fn test_send_requires_unlocked_vault() {
        let service = make_service(false).await;
        let intent = TxIntent::new("0x742d35Cc6634C0532925a3b8D400e8B78fFe4860", "0.1");

        let result = service.send(Chain::Ethereum, "sepolia", &intent).await;
        assert!(matches!(result.unwrap_err(), WalletError::Locked));

        let result = service.send(Chain::Solana, "testnet", &intent).await;
        assert!(matches!(result.unwrap_err(), WalletError::Locked));
    }

    #[tokio::test]
    async fn test_send_solana_not_implemented_when_unlocked() {
        let service = make_service(true).await;
        let intent = TxIntent::new("11111111111111111111111111111111", "1");
        let result = service.send(Chain::Solana, "testnet", &intent).await;
        assert!(matches!(result.unwrap_err(), WalletError::NotImplemented(_)));
    }

    #[tokio::test]
    async fn test_send_surfaces_provider_unavailable() {
        let service = make_service(true).await;
        let intent = TxIntent::new("0x742d35Cc6634C0532925a3b8D400e8B78fFe4860", "0.1");
        let result = service.send(Chain::Ethereum, "sepolia", &intent).await;
        assert!(matches!(result.unwrap_err(), WalletError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_balances_require_unlock() {
        let service = make_service(false).await;
        let result = service.token_balances(Chain::Ethereum, "sepolia").await;
        assert!(matches!(result.unwrap_err(), WalletError::Locked));
    }

    #[tokio::test]
    async fn test_balances_degrade_to_unavailable_row() {
        let service = make_service(true).await;
        let rows = service.token_balances(Chain::Ethereum, "sepolia").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "ETH");
        assert_eq!(rows[0].balance, "0");
        assert!(!rows[0].available);
    }
}
