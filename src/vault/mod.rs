//! SecretVault: the only component that ever holds decrypted key material.
//!
//! The vault owns the locked/unlocked lifecycle. Key bytes live in memory
//! only while unlocked, behind scoped-access wrappers, and are zeroized on
//! lock. Everything else in the wallet sees addresses or signed artifacts.

pub mod cipher;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::core::config::SecurityConfig;
use crate::core::derivation::{DerivedAccounts, KeyDerivation};
use crate::core::domain::{Chain, PrivateKey, SolanaSecretKey};
use crate::core::errors::WalletError;
use crate::core::validation::validate_password;
use crate::storage::SecretStore;
use self::cipher::VaultCipher;

/// Public addresses of the unlocked wallet, one account per chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddresses {
    pub ethereum_address: String,
    pub solana_address: String,
}

/// Persisted wallet payload, serialized then encrypted as one unit.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletBlob {
    mnemonic: String,
    accounts: BlobAccounts,
}

#[derive(Serialize, Deserialize)]
struct BlobAccounts {
    ethereum: BlobAccount,
    solana: BlobAccount,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobAccount {
    address: String,
    /// Hex-encoded key material (32 bytes for secp256k1, 64 for ed25519).
    secret: String,
}

/// Process-wide vault state. Mutated exclusively by the vault's own
/// operations; other components read through accessor methods.
struct VaultState {
    unlocked: Option<DerivedAccounts>,
    active_chain: Chain,
    active_network: String,
}

pub struct SecretVault {
    store: Arc<dyn SecretStore>,
    derivation: Arc<dyn KeyDerivation>,
    cipher: VaultCipher,
    security: SecurityConfig,
    state: RwLock<VaultState>,
}

impl SecretVault {
    pub fn new(
        store: Arc<dyn SecretStore>,
        derivation: Arc<dyn KeyDerivation>,
        security: SecurityConfig,
        active_chain: Chain,
        active_network: &str,
    ) -> Self {
        let cipher = VaultCipher::new(security.pbkdf2_iterations);
        Self {
            store,
            derivation,
            cipher,
            security,
            state: RwLock::new(VaultState {
                unlocked: None,
                active_chain,
                active_network: active_network.to_string(),
            }),
        }
    }

    /// Generate a fresh mnemonic for the creation wizard. Nothing is derived
    /// or persisted until `create` is called with it.
    pub fn generate_mnemonic(&self) -> Result<String, WalletError> {
        self.derivation.generate_mnemonic()
    }

    /// Create a wallet from `mnemonic`, encrypt it under `password`, persist
    /// it, and unlock. On any failure the vault stays locked: state is only
    /// populated after the store acknowledges the write.
    pub async fn create(
        &self,
        password: &str,
        mnemonic: &str,
    ) -> Result<WalletAddresses, WalletError> {
        validate_password(&self.security, password)?;

        let accounts = self.derivation.derive(mnemonic)?;
        let addresses = WalletAddresses {
            ethereum_address: accounts.ethereum_address.clone(),
            solana_address: accounts.solana_address.clone(),
        };

        let plaintext = Self::serialize_blob(mnemonic, &accounts)?;
        let blob = self.cipher.encrypt(password, &plaintext)?;
        self.store.store_blob(&blob).await?;

        {
            let mut state = self.state.write();
            state.unlocked = Some(accounts);
        }

        info!(ethereum = %addresses.ethereum_address, solana = %addresses.solana_address,
              "Wallet created");
        Ok(addresses)
    }

    /// Import an existing mnemonic. Identical to `create` except for intent;
    /// derivation determinism guarantees the same addresses come back.
    pub async fn import(
        &self,
        mnemonic: &str,
        password: &str,
    ) -> Result<WalletAddresses, WalletError> {
        let addresses = self.create(password, mnemonic).await?;
        info!("Wallet imported");
        Ok(addresses)
    }

    /// Unlock with `password`. Fails with `NotFound` when no wallet exists
    /// and `InvalidPassword` when decryption does not authenticate.
    pub async fn unlock(&self, password: &str) -> Result<WalletAddresses, WalletError> {
        let blob = self
            .store
            .load_blob()
            .await?
            .ok_or_else(|| WalletError::NotFound("No wallet found".to_string()))?;

        let plaintext = self.cipher.decrypt(password, &blob)?;
        let accounts = Self::deserialize_blob(&plaintext)?;

        let addresses = WalletAddresses {
            ethereum_address: accounts.ethereum_address.clone(),
            solana_address: accounts.solana_address.clone(),
        };

        {
            let mut state = self.state.write();
            state.unlocked = Some(accounts);
        }

        info!("Wallet unlocked");
        Ok(addresses)
    }

    /// Clear key material. Always succeeds; dropping the account structs
    /// zeroizes the secrets synchronously.
    pub fn lock(&self) {
        let mut state = self.state.write();
        if state.unlocked.take().is_some() {
            info!("Wallet locked");
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.read().unlocked.is_some()
    }

    /// Whether an encrypted wallet blob exists in storage.
    pub async fn exists(&self) -> Result<bool, WalletError> {
        Ok(self.store.load_blob().await?.is_some())
    }

    /// Addresses of the unlocked wallet.
    pub fn addresses(&self) -> Result<WalletAddresses, WalletError> {
        let state = self.state.read();
        let accounts = state.unlocked.as_ref().ok_or(WalletError::Locked)?;
        Ok(WalletAddresses {
            ethereum_address: accounts.ethereum_address.clone(),
            solana_address: accounts.solana_address.clone(),
        })
    }

    /// Copy of the Ethereum signing key for immediate use. The copy zeroizes
    /// on drop; callers keep it alive for one signing operation only.
    pub fn ethereum_key(&self) -> Result<PrivateKey, WalletError> {
        let state = self.state.read();
        let accounts = state.unlocked.as_ref().ok_or(WalletError::Locked)?;
        accounts
            .ethereum_private_key
            .with_secret(|bytes| PrivateKey::try_from_slice(bytes))
            .map_err(|e| WalletError::InternalError(e.to_string()))
    }

    /// Copy of the Solana secret key, same discipline as `ethereum_key`.
    pub fn solana_key(&self) -> Result<SolanaSecretKey, WalletError> {
        let state = self.state.read();
        let accounts = state.unlocked.as_ref().ok_or(WalletError::Locked)?;
        accounts
            .solana_secret_key
            .with_secret(|bytes| SolanaSecretKey::try_from_slice(bytes))
            .map_err(|e| WalletError::InternalError(e.to_string()))
    }

    /// Export key material for the given chain. Deliberately rare: explicit
    /// user action behind its own command, never part of the approval flow,
    /// and always logged.
    pub fn export_private_key(&self, chain: Chain) -> Result<Zeroizing<String>, WalletError> {
        let state = self.state.read();
        let accounts = state.unlocked.as_ref().ok_or(WalletError::Locked)?;

        warn!(chain = %chain, "Exporting private key material");
        let encoded = match chain {
            Chain::Ethereum => accounts
                .ethereum_private_key
                .with_secret(|bytes| Zeroizing::new(format!("0x{}", hex::encode(bytes)))),
            Chain::Solana => accounts
                .solana_secret_key
                .with_secret(|bytes| Zeroizing::new(bs58::encode(bytes).into_string())),
        };
        Ok(encoded)
    }

    /// Delete the stored wallet and lock. Grants are cleared by the caller;
    /// the vault only owns the secret side.
    pub async fn reset(&self) -> Result<(), WalletError> {
        self.store.delete_blob().await?;
        self.lock();
        info!("Wallet reset");
        Ok(())
    }

    pub fn active_chain(&self) -> Chain {
        self.state.read().active_chain
    }

    pub fn active_network(&self) -> String {
        self.state.read().active_network.clone()
    }

    /// Advance the active (chain, network) pair. Called only after the
    /// provider registry has successfully swapped endpoints.
    pub fn set_active_network(&self, chain: Chain, network: &str) {
        let mut state = self.state.write();
        state.active_chain = chain;
        state.active_network = network.to_string();
        debug!(chain = %chain, network = %network, "Active network updated");
    }

    fn serialize_blob(
        mnemonic: &str,
        accounts: &DerivedAccounts,
    ) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        let blob = WalletBlob {
            mnemonic: mnemonic.to_string(),
            accounts: BlobAccounts {
                ethereum: BlobAccount {
                    address: accounts.ethereum_address.clone(),
                    secret: accounts
                        .ethereum_private_key
                        .with_secret(|bytes| hex::encode(bytes)),
                },
                solana: BlobAccount {
                    address: accounts.solana_address.clone(),
                    secret: accounts.solana_secret_key.with_secret(|bytes| hex::encode(bytes)),
                },
            },
        };
        let bytes = serde_json::to_vec(&blob)
            .map_err(|e| WalletError::InternalError(format!("Failed to serialize wallet: {}", e)))?;
        Ok(Zeroizing::new(bytes))
    }

    fn deserialize_blob(plaintext: &[u8]) -> Result<DerivedAccounts, WalletError> {
        // The blob authenticated, so a parse failure here is a schema problem,
        // not a password problem.
        let blob: WalletBlob = serde_json::from_slice(plaintext)
            .map_err(|e| WalletError::StorageError(format!("Malformed wallet blob: {}", e)))?;

        let eth_bytes = Zeroizing::new(hex::decode(&blob.accounts.ethereum.secret).map_err(
            |e| WalletError::StorageError(format!("Malformed ethereum key encoding: {}", e)),
        )?);
        let sol_bytes = Zeroizing::new(hex::decode(&blob.accounts.solana.secret).map_err(
            |e| WalletError::StorageError(format!("Malformed solana key encoding: {}", e)),
        )?);

        let ethereum_private_key = PrivateKey::try_from_slice(&eth_bytes)
            .map_err(|e| WalletError::StorageError(e.to_string()))?;
        let solana_secret_key = SolanaSecretKey::try_from_slice(&sol_bytes)
            .map_err(|e| WalletError::StorageError(e.to_string()))?;

        Ok(DerivedAccounts {
            ethereum_address: blob.accounts.ethereum.address,
            ethereum_private_key,
            solana_address: blob.accounts.solana.address,
            solana_secret_key,
        })
    }
}
