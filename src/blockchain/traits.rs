use async_trait::async_trait;

use crate::core::domain::{Chain, FeeEstimate, PrivateKey, TxIntent, TxReceipt};
use crate::core::errors::WalletError;

/// Defines the standard interface for a live RPC handle to one
/// (chain, network). Instances are built and cached by the
/// [`crate::blockchain::ChainProviderRegistry`]; nothing else constructs them.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain this client serves.
    fn chain(&self) -> Chain;

    /// Network name ("sepolia", "testnet", ...).
    fn network(&self) -> &str;

    /// Chain id for Ethereum-family networks, `None` for Solana clusters.
    fn chain_id(&self) -> Option<u64>;

    /// Symbol of the native token ("ETH", "SOL").
    fn native_symbol(&self) -> &str {
        self.chain().native_symbol()
    }

    /// Whether `address` is well-formed for this chain.
    fn validate_address(&self, address: &str) -> bool;

    /// Native balance of `address` in whole units, as a decimal string.
    async fn get_balance(&self, address: &str) -> Result<String, WalletError>;

    /// Current gas price in minimal units (wei), as a decimal string.
    async fn get_gas_price(&self) -> Result<String, WalletError>;

    /// Estimate gas limit and price for `intent`. Read-only.
    async fn estimate_transaction(&self, intent: &TxIntent) -> Result<FeeEstimate, WalletError>;

    /// Sign `intent` with `key`, submit it, and await at least one
    /// confirmation. Errors surface verbatim; a signed transaction is never
    /// resubmitted automatically.
    async fn send_transaction(
        &self,
        key: &PrivateKey,
        intent: &TxIntent,
    ) -> Result<TxReceipt, WalletError>;
}

impl std::fmt::Debug for dyn ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("chain", &self.chain())
            .field("network", &self.network())
            .finish()
    }
}
