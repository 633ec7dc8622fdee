//! Password-based authenticated encryption for the wallet blob.
//!
//! PBKDF2-HMAC-SHA256 stretches the password into an AES-256-GCM key; salt
//! and nonce are fresh per encryption and stored beside the ciphertext. The
//! GCM tag authenticates both the ciphertext and a fixed domain AAD, so a
//! blob from another context never decrypts here.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::core::errors::WalletError;
use crate::storage::EncryptedBlob;

/// Domain tag bound into the AEAD. Changing it invalidates every stored blob.
const VAULT_AAD: &[u8] = b"PEDALS-VAULT-V1";

pub struct VaultCipher {
    iterations: u32,
}

impl VaultCipher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Encrypt `plaintext` under `password` with a fresh salt and nonce.
    pub fn encrypt(&self, password: &str, plaintext: &[u8]) -> Result<EncryptedBlob, WalletError> {
        let mut salt = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let mut key_bytes = self.derive_key(password, &salt);
        let cipher = Aes256Gcm::new_from_slice(key_bytes.as_ref())
            .map_err(|_| WalletError::InternalError("Failed to create AES cipher".to_string()))?;
        key_bytes.zeroize();

        let nonce = aes_gcm::Nonce::from(nonce_bytes);
        let ciphertext = cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad: VAULT_AAD })
            .map_err(|_| WalletError::InternalError("Encryption failed".to_string()))?;

        Ok(EncryptedBlob {
            ciphertext,
            salt: salt.to_vec(),
            nonce: nonce_bytes.to_vec(),
            schema_version: EncryptedBlob::current_schema_version(),
        })
    }

    /// Decrypt a stored blob. Any authentication failure maps to
    /// `InvalidPassword`: a caller must not be able to tell a wrong password
    /// from tampered ciphertext.
    pub fn decrypt(
        &self,
        password: &str,
        blob: &EncryptedBlob,
    ) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        if blob.nonce.len() != 12 {
            return Err(WalletError::InvalidPassword);
        }

        let mut key_bytes = self.derive_key(password, &blob.salt);
        let cipher = Aes256Gcm::new_from_slice(key_bytes.as_ref())
            .map_err(|_| WalletError::InternalError("Failed to create AES cipher".to_string()))?;
        key_bytes.zeroize();

        let mut nonce_bytes = [0u8; 12];
        nonce_bytes.copy_from_slice(&blob.nonce);
        let nonce = aes_gcm::Nonce::from(nonce_bytes);

        let plaintext = cipher
            .decrypt(&nonce, Payload { msg: blob.ciphertext.as_ref(), aad: VAULT_AAD })
            .map_err(|_| WalletError::InvalidPassword)?;

        Ok(Zeroizing::new(plaintext))
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
        let mut key = Zeroizing::new([0u8; 32]);
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, key.as_mut());
        key
    }
}
