use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::domain::Chain;

/// Blockchain network configuration: one RPC endpoint plus an ordered list of
/// backups tried in sequence when the primary is unreachable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    /// Ordered fallback endpoints, tried after `rpc_url`.
    #[serde(default)]
    pub backup_rpc_urls: Vec<String>,
    /// Chain id for Ethereum-family networks; Solana clusters have none.
    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// Per-chain network tables, keyed by network name ("sepolia", "testnet", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainConfig {
    pub networks: HashMap<Chain, HashMap<String, NetworkConfig>>,
    /// Network selected per chain until the user switches.
    #[serde(default = "BlockchainConfig::default_networks")]
    pub default_networks: HashMap<Chain, String>,
    /// Blocks to await before a send is reported successful.
    #[serde(default = "BlockchainConfig::default_confirmations")]
    pub confirmations: usize,
    /// Per-request RPC timeout (seconds).
    #[serde(default = "BlockchainConfig::default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

impl BlockchainConfig {
    fn default_networks() -> HashMap<Chain, String> {
        // Development default per product decision: testnets, not mainnet.
        let mut map = HashMap::with_capacity(2);
        map.insert(Chain::Ethereum, "sepolia".to_string());
        map.insert(Chain::Solana, "testnet".to_string());
        map
    }

    fn default_confirmations() -> usize {
        1
    }

    fn default_rpc_timeout_secs() -> u64 {
        10
    }

    pub fn network(&self, chain: Chain, network: &str) -> Option<&NetworkConfig> {
        self.networks.get(&chain).and_then(|table| table.get(network))
    }

    pub fn default_network(&self, chain: Chain) -> &str {
        self.default_networks.get(&chain).map(String::as_str).unwrap_or("mainnet")
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        let mut ethereum = HashMap::with_capacity(2);
        ethereum.insert(
            "mainnet".to_string(),
            NetworkConfig {
                name: "Ethereum Mainnet".to_string(),
                rpc_url: env_or("ETHEREUM_MAINNET_RPC", "https://eth.llamarpc.com"),
                backup_rpc_urls: vec!["https://rpc.ankr.com/eth".to_string()],
                chain_id: Some(1),
            },
        );
        ethereum.insert(
            "sepolia".to_string(),
            NetworkConfig {
                name: "Sepolia Testnet".to_string(),
                rpc_url: env_or("ETHEREUM_SEPOLIA_RPC", "https://rpc.sepolia.org"),
                backup_rpc_urls: vec![
                    "https://rpc2.sepolia.org".to_string(),
                    "https://ethereum-sepolia.blockpi.network/v1/rpc/public".to_string(),
                ],
                chain_id: Some(11_155_111),
            },
        );

        let mut solana = HashMap::with_capacity(2);
        solana.insert(
            "mainnet".to_string(),
            NetworkConfig {
                name: "Solana Mainnet".to_string(),
                rpc_url: env_or("SOLANA_MAINNET_RPC", "https://api.mainnet-beta.solana.com"),
                backup_rpc_urls: Vec::new(),
                chain_id: None,
            },
        );
        solana.insert(
            "testnet".to_string(),
            NetworkConfig {
                name: "Solana Testnet".to_string(),
                rpc_url: env_or("SOLANA_TESTNET_RPC", "https://api.testnet.solana.com"),
                backup_rpc_urls: Vec::new(),
                chain_id: None,
            },
        );

        let mut networks = HashMap::with_capacity(2);
        networks.insert(Chain::Ethereum, ethereum);
        networks.insert(Chain::Solana, solana);

        Self {
            networks,
            default_networks: Self::default_networks(),
            confirmations: Self::default_confirmations(),
            rpc_timeout_secs: Self::default_rpc_timeout_secs(),
        }
    }
}

/// Approval-flow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Window for a human decision before a pending request resolves as
    /// rejected (seconds).
    #[serde(default = "ApprovalConfig::default_decision_timeout_secs")]
    pub decision_timeout_secs: u64,
}

impl ApprovalConfig {
    fn default_decision_timeout_secs() -> u64 {
        120
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { decision_timeout_secs: Self::default_decision_timeout_secs() }
    }
}

/// Security configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// PBKDF2 iteration count for the vault password KDF.
    #[serde(default = "SecurityConfig::default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    /// Minutes of inactivity before the external lock timer fires.
    #[serde(default = "SecurityConfig::default_auto_lock_minutes")]
    pub auto_lock_minutes: u64,

    /// Minimum password length accepted on create/import.
    #[serde(default = "SecurityConfig::default_min_password_length")]
    pub min_password_length: usize,
}

impl SecurityConfig {
    fn default_pbkdf2_iterations() -> u32 {
        100_000
    }

    fn default_auto_lock_minutes() -> u64 {
        5
    }

    fn default_min_password_length() -> usize {
        8
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: Self::default_pbkdf2_iterations(),
            auto_lock_minutes: Self::default_auto_lock_minutes(),
            min_password_length: Self::default_min_password_length(),
        }
    }
}

/// Gas tier multipliers (percent of base gas price).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasTierConfig {
    #[serde(default = "GasTierConfig::default_slow_pct")]
    pub slow_pct: u64,
    #[serde(default = "GasTierConfig::default_standard_pct")]
    pub standard_pct: u64,
    #[serde(default = "GasTierConfig::default_fast_pct")]
    pub fast_pct: u64,
}

impl GasTierConfig {
    fn default_slow_pct() -> u64 {
        100
    }

    fn default_standard_pct() -> u64 {
        120
    }

    fn default_fast_pct() -> u64 {
        150
    }
}

impl Default for GasTierConfig {
    fn default() -> Self {
        Self {
            slow_pct: Self::default_slow_pct(),
            standard_pct: Self::default_standard_pct(),
            fast_pct: Self::default_fast_pct(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: Option<u32>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_url: "sqlite://./data/wallet.db?mode=rwc".to_string(), max_connections: Some(5) }
    }
}

/// Top-level wallet configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub blockchain: BlockchainConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub gas_tiers: GasTierConfig,
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}
