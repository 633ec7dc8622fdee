use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{EncryptedBlob, GrantStore, SecretStore};
use crate::core::domain::OriginGrant;
use crate::core::errors::WalletError;

/// In-memory store for tests and ephemeral profiles. Same contract as
/// [`super::SqliteStore`], nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    blob: Mutex<Option<EncryptedBlob>>,
    grants: Mutex<HashMap<String, OriginGrant>>,
    /// When set, every write fails with `StorageError`. Lets tests exercise
    /// the write-through failure paths.
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    fn check_writable(&self) -> Result<(), WalletError> {
        if *self.fail_writes.lock() {
            return Err(WalletError::StorageError("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn load_blob(&self) -> Result<Option<EncryptedBlob>, WalletError> {
        Ok(self.blob.lock().clone())
    }

    async fn store_blob(&self, blob: &EncryptedBlob) -> Result<(), WalletError> {
        self.check_writable()?;
        *self.blob.lock() = Some(blob.clone());
        Ok(())
    }

    async fn delete_blob(&self) -> Result<(), WalletError> {
        self.check_writable()?;
        *self.blob.lock() = None;
        Ok(())
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn load_grants(&self) -> Result<Vec<OriginGrant>, WalletError> {
        Ok(self.grants.lock().values().cloned().collect())
    }

    async fn put_grant(&self, grant: &OriginGrant) -> Result<(), WalletError> {
        self.check_writable()?;
        self.grants.lock().insert(grant.origin.clone(), grant.clone());
        Ok(())
    }

    async fn delete_grant(&self, origin: &str) -> Result<(), WalletError> {
        self.check_writable()?;
        self.grants.lock().remove(origin);
        Ok(())
    }

    async fn clear_grants(&self) -> Result<(), WalletError> {
        self.check_writable()?;
        self.grants.lock().clear();
        Ok(())
    }
}
