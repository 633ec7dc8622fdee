//! Per-origin connection grants.
//!
//! Grants are not secrets: they survive lock/unlock and live in plaintext
//! storage. What matters is that memory and storage never diverge, so every
//! mutation is write-through: the store acknowledges before the in-memory
//! table changes, and a failed write leaves both sides untouched.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::domain::{Chain, OriginGrant};
use crate::core::errors::WalletError;
use crate::storage::GrantStore;

pub struct OriginAuthorizer {
    store: Arc<dyn GrantStore>,
    grants: RwLock<HashMap<String, OriginGrant>>,
}

impl OriginAuthorizer {
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store, grants: RwLock::new(HashMap::new()) }
    }

    /// Populate the in-memory table from storage. Called once at background
    /// start so grants survive process restarts.
    pub async fn load(&self) -> Result<(), WalletError> {
        let stored = self.store.load_grants().await?;
        let mut grants = self.grants.write();
        grants.clear();
        for grant in stored {
            grants.insert(grant.origin.clone(), grant);
        }
        debug!("Loaded {} connection grants", grants.len());
        Ok(())
    }

    pub fn is_connected(&self, origin: &str) -> bool {
        self.grants.read().contains_key(origin)
    }

    pub fn grant_for(&self, origin: &str) -> Option<OriginGrant> {
        self.grants.read().get(origin).cloned()
    }

    /// Record an approved connection. Persisted first; memory only changes
    /// after the write sticks.
    pub async fn grant(
        &self,
        origin: &str,
        chain: Chain,
        network: &str,
    ) -> Result<OriginGrant, WalletError> {
        let grant = OriginGrant {
            origin: origin.to_string(),
            chain,
            network: network.to_string(),
            connected_at: chrono::Utc::now(),
        };

        self.store.put_grant(&grant).await?;
        self.grants.write().insert(origin.to_string(), grant.clone());

        info!(origin = %origin, chain = %chain, "Connection granted");
        Ok(grant)
    }

    /// Remove a grant. Returns whether one existed.
    pub async fn revoke(&self, origin: &str) -> Result<bool, WalletError> {
        self.store.delete_grant(origin).await?;
        let removed = self.grants.write().remove(origin).is_some();
        if removed {
            info!(origin = %origin, "Connection revoked");
        }
        Ok(removed)
    }

    pub fn list(&self) -> Vec<OriginGrant> {
        let mut grants: Vec<OriginGrant> = self.grants.read().values().cloned().collect();
        grants.sort_by(|a, b| a.origin.cmp(&b.origin));
        grants
    }

    /// Drop every grant (wallet reset).
    pub async fn clear(&self) -> Result<(), WalletError> {
        self.store.clear_grants().await?;
        self.grants.write().clear();
        info!("All connection grants cleared");
        Ok(())
    }
}
