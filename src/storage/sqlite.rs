use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{EncryptedBlob, GrantStore, SecretStore, WALLET_STORAGE_KEY};
use crate::core::domain::{Chain, OriginGrant};
use crate::core::errors::WalletError;

/// SQLite-backed store. One pool serves both the vault blob and the
/// connected-sites table; schema is created on connect.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new() -> anyhow::Result<Self> {
        Self::new_with_url("sqlite://./data/wallet.db?mode=rwc").await
    }

    pub async fn new_with_url(database_url: &str) -> anyhow::Result<Self> {
        // normalize sqlite URLs: accept "sqlite:" or "sqlite://"
        let mut db_url = database_url.to_string();
        if db_url.starts_with("sqlite:") && !db_url.starts_with("sqlite://") {
            db_url = db_url.replacen("sqlite:", "sqlite://", 1);
        }

        // ensure the parent directory exists for file-backed databases
        if let Some(path) = db_url.strip_prefix("sqlite://") {
            let path_only = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
            if path_only != ":memory:" && !path_only.is_empty() {
                if let Some(parent) = std::path::Path::new(path_only).parent() {
                    if !parent.as_os_str().is_empty() {
                        if let Err(e) = std::fs::create_dir_all(parent) {
                            warn!("Failed to create database dir {:?}: {}", parent, e);
                        }
                    }
                }
            }
        }

        let connect_options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| anyhow::anyhow!("Invalid database URL: {}", e))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_options)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

        let store = Self { pool };
        store.initialize_schema().await?;

        info!("Wallet storage initialized");
        Ok(store)
    }

    async fn initialize_schema(&self) -> anyhow::Result<()> {
        debug!("Initializing database schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vault (
                storage_key TEXT PRIMARY KEY,
                ciphertext BLOB NOT NULL,
                salt BLOB NOT NULL,
                nonce BLOB NOT NULL,
                schema_version INTEGER NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create vault table: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS connected_sites (
                origin TEXT PRIMARY KEY,
                chain TEXT NOT NULL,
                network TEXT NOT NULL,
                connected_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create connected_sites table: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl SecretStore for SqliteStore {
    async fn load_blob(&self) -> Result<Option<EncryptedBlob>, WalletError> {
        let row = sqlx::query(
            "SELECT ciphertext, salt, nonce, schema_version FROM vault WHERE storage_key = ?",
        )
        .bind(WALLET_STORAGE_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| EncryptedBlob {
            ciphertext: row.get("ciphertext"),
            salt: row.get("salt"),
            nonce: row.get("nonce"),
            schema_version: row.get::<i64, _>("schema_version") as u8,
        }))
    }

    async fn store_blob(&self, blob: &EncryptedBlob) -> Result<(), WalletError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO vault
                (storage_key, ciphertext, salt, nonce, schema_version, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(WALLET_STORAGE_KEY)
        .bind(&blob.ciphertext)
        .bind(&blob.salt)
        .bind(&blob.nonce)
        .bind(blob.schema_version as i64)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        debug!("Stored encrypted wallet blob ({} bytes)", blob.ciphertext.len());
        Ok(())
    }

    async fn delete_blob(&self) -> Result<(), WalletError> {
        sqlx::query("DELETE FROM vault WHERE storage_key = ?")
            .bind(WALLET_STORAGE_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GrantStore for SqliteStore {
    async fn load_grants(&self) -> Result<Vec<OriginGrant>, WalletError> {
        let rows =
            sqlx::query("SELECT origin, chain, network, connected_at FROM connected_sites")
                .fetch_all(&self.pool)
                .await?;

        let mut grants = Vec::with_capacity(rows.len());
        for row in rows {
            let chain_str: String = row.get("chain");
            let chain = Chain::from_str(&chain_str)
                .map_err(|_| WalletError::StorageError(format!("Unknown chain: {}", chain_str)))?;
            grants.push(OriginGrant {
                origin: row.get("origin"),
                chain,
                network: row.get("network"),
                connected_at: row.get("connected_at"),
            });
        }
        Ok(grants)
    }

    async fn put_grant(&self, grant: &OriginGrant) -> Result<(), WalletError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO connected_sites (origin, chain, network, connected_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&grant.origin)
        .bind(grant.chain.as_str())
        .bind(&grant.network)
        .bind(grant.connected_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_grant(&self, origin: &str) -> Result<(), WalletError> {
        sqlx::query("DELETE FROM connected_sites WHERE origin = ?")
            .bind(origin)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_grants(&self) -> Result<(), WalletError> {
        sqlx::query("DELETE FROM connected_sites").execute(&self.pool).await?;
        Ok(())
    }
}
