use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Chains the wallet derives an account for. One account per chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Solana,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Solana => "solana",
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ETH",
            Chain::Solana => "SOL",
        }
    }
}

impl std::str::FromStr for Chain {
    type Err = crate::core::errors::WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "solana" | "sol" => Ok(Chain::Solana),
            other => Err(crate::core::errors::WalletError::ValidationError(format!(
                "Unsupported chain: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction as requested by a page or the send screen, before fee fields
/// are filled in. Field names follow the page-facing JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIntent {
    /// Recipient address.
    pub to: String,
    /// Amount in whole native units as a decimal string ("0.05" ETH).
    pub value: String,
    /// Optional gas limit override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    /// Optional gas price override (wei).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    /// Optional calldata, 0x-prefixed hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl TxIntent {
    pub fn new(to: &str, value: &str) -> Self {
        Self {
            to: to.to_string(),
            value: value.to_string(),
            gas_limit: None,
            gas_price: None,
            data: None,
        }
    }
}

/// Fee estimate for display purposes. Values are wei as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    pub gas_limit: String,
    pub gas_price: String,
}

/// Tiered gas price quote (wei, decimal strings). Tiers are percentages of
/// the node-reported base price, configured in `GasTierConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasPriceQuote {
    pub slow: String,
    pub standard: String,
    pub fast: String,
}

/// Outcome of a confirmed transaction submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub hash: String,
    pub block_number: Option<u64>,
}

/// A single balance row for the dashboard. `available == false` means the
/// provider could not be reached and `balance` is a placeholder, not a zero
/// holding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub chain: Chain,
    pub network: String,
    pub symbol: String,
    pub balance: String,
    pub available: bool,
}

/// A connection grant for one (origin, chain). Created only through an
/// approved connection request; not a secret, survives lock/unlock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginGrant {
    pub origin: String,
    pub chain: Chain,
    pub network: String,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

/// Private key wrapper (32 bytes) with secrecy::Secret for automatic
/// zeroization and display-hiding.
pub struct PrivateKey(Secret<[u8; 32]>);

impl PrivateKey {
    pub fn new(k: [u8; 32]) -> Self {
        Self(Secret::new(k))
    }

    /// Scoped access to the underlying secret bytes so callers can't
    /// accidentally hold on to or clone key material outside a small scope.
    pub fn with_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        f(self.0.expose_secret())
    }

    /// Try to construct a PrivateKey from a byte slice (must be 32 bytes).
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, anyhow::Error> {
        if slice.len() != 32 {
            return Err(anyhow::anyhow!("Private key must be 32 bytes"));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&slice[..32]);
        Ok(PrivateKey::new(arr))
    }
}

impl Zeroize for PrivateKey {
    fn zeroize(&mut self) {
        let zero = [0u8; 32];
        self.0 = Secret::new(zero);
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// Solana secret key wrapper (64 bytes: seed || public key), same access
/// discipline as [`PrivateKey`].
pub struct SolanaSecretKey(Secret<[u8; 64]>);

impl SolanaSecretKey {
    pub fn new(k: [u8; 64]) -> Self {
        Self(Secret::new(k))
    }

    pub fn with_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; 64]) -> R,
    {
        f(self.0.expose_secret())
    }

    pub fn try_from_slice(slice: &[u8]) -> Result<Self, anyhow::Error> {
        if slice.len() != 64 {
            return Err(anyhow::anyhow!("Solana secret key must be 64 bytes"));
        }
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&slice[..64]);
        Ok(SolanaSecretKey::new(arr))
    }
}

impl Zeroize for SolanaSecretKey {
    fn zeroize(&mut self) {
        let zero = [0u8; 64];
        self.0 = Secret::new(zero);
    }
}

impl Drop for SolanaSecretKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for SolanaSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SolanaSecretKey([REDACTED])")
    }
}
