//! Persistence boundary.
//!
//! Two stores back the wallet: the encrypted vault blob (a single row under a
//! fixed storage key) and the plaintext connected-sites map. Both are behind
//! traits so the background can run against SQLite on disk or fully in
//! memory (tests, ephemeral profiles).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::domain::OriginGrant;
use crate::core::errors::WalletError;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Fixed storage key for the one-and-only wallet blob.
pub const WALLET_STORAGE_KEY: &str = "wallet";

/// Ciphertext plus the parameters needed to decrypt it again. Everything here
/// is safe to persist; authentication lives inside the AEAD tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    pub ciphertext: Vec<u8>,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub schema_version: u8,
}

impl EncryptedBlob {
    pub fn current_schema_version() -> u8 {
        1
    }
}

/// Storage for the encrypted wallet blob.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Load the blob, `None` if no wallet has been created yet.
    async fn load_blob(&self) -> Result<Option<EncryptedBlob>, WalletError>;

    /// Persist the blob, replacing any previous one.
    async fn store_blob(&self, blob: &EncryptedBlob) -> Result<(), WalletError>;

    /// Delete the blob (wallet reset).
    async fn delete_blob(&self) -> Result<(), WalletError>;
}

/// Storage for connection grants. Writes are immediate (write-through): the
/// in-memory grant table is only updated after the store acknowledges, so
/// authorization state and storage cannot diverge.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn load_grants(&self) -> Result<Vec<OriginGrant>, WalletError>;

    async fn put_grant(&self, grant: &OriginGrant) -> Result<(), WalletError>;

    async fn delete_grant(&self, origin: &str) -> Result<(), WalletError>;

    /// Remove every grant (wallet reset).
    async fn clear_grants(&self) -> Result<(), WalletError>;
}
