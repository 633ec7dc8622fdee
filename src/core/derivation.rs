//! HD account derivation
//!
//! Both chain accounts come from the same BIP39 seed:
//! - Ethereum: BIP44 path m/44'/60'/0'/0/0 (secp256k1, via ethers)
//! - Solana: SLIP-0010 path m/44'/501'/0'/0' (ed25519, hardened-only)
//!
//! Derivation is deterministic: the same mnemonic always yields the same
//! address pair. The algorithms themselves are standard; this module only
//! wires the ecosystem crates together behind the `KeyDerivation` seam.

use bip39::{Language, Mnemonic};
use ethers::signers::{coins_bip39::English, MnemonicBuilder, Signer};
use ethers::utils::to_checksum;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::core::domain::{PrivateKey, SolanaSecretKey};
use crate::core::errors::WalletError;

type HmacSha512 = Hmac<Sha512>;

/// Ethereum derivation path: m/44'/60'/0'/0/0
pub const ETHEREUM_PATH: &str = "m/44'/60'/0'/0/0";

/// Solana derivation path indices (all hardened): m/44'/501'/0'/0'
const SOLANA_PATH: [u32; 4] = [44, 501, 0, 0];

/// Accounts derived from one mnemonic. Addresses are public; key material
/// stays behind the scoped-access wrappers.
#[derive(Debug)]
pub struct DerivedAccounts {
    pub ethereum_address: String,
    pub ethereum_private_key: PrivateKey,
    pub solana_address: String,
    pub solana_secret_key: SolanaSecretKey,
}

/// Seam for mnemonic generation and account derivation. The vault treats the
/// implementation as a black box; tests can substitute a fixture.
pub trait KeyDerivation: Send + Sync {
    /// Generate a fresh 12-word BIP39 mnemonic (128-bit entropy).
    fn generate_mnemonic(&self) -> Result<String, WalletError>;

    /// Derive both chain accounts from `mnemonic`.
    fn derive(&self, mnemonic: &str) -> Result<DerivedAccounts, WalletError>;
}

/// Standard BIP44 + SLIP-0010 derivation.
pub struct Bip44Derivation;

impl KeyDerivation for Bip44Derivation {
    fn generate_mnemonic(&self) -> Result<String, WalletError> {
        let mut entropy = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut entropy);

        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy).map_err(|e| {
            WalletError::DerivationError(format!("Failed to generate mnemonic: {}", e))
        })?;
        Ok(mnemonic.to_string())
    }

    fn derive(&self, mnemonic: &str) -> Result<DerivedAccounts, WalletError> {
        let parsed = Mnemonic::parse_in(Language::English, mnemonic)
            .map_err(|e| WalletError::DerivationError(format!("Invalid mnemonic: {}", e)))?;

        let (ethereum_address, ethereum_private_key) = derive_ethereum(&parsed.to_string())?;

        let seed = Zeroizing::new(parsed.to_seed(""));
        let (solana_address, solana_secret_key) = derive_solana(seed.as_ref())?;

        Ok(DerivedAccounts {
            ethereum_address,
            ethereum_private_key,
            solana_address,
            solana_secret_key,
        })
    }
}

/// Derive the Ethereum account at m/44'/60'/0'/0/0.
fn derive_ethereum(mnemonic: &str) -> Result<(String, PrivateKey), WalletError> {
    let wallet = MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .derivation_path(ETHEREUM_PATH)
        .map_err(|e| WalletError::DerivationError(format!("Failed to set derivation path: {}", e)))?
        .build()
        .map_err(|e| WalletError::DerivationError(format!("Failed to build wallet: {}", e)))?;

    let address = to_checksum(&wallet.address(), None);

    let key_bytes = wallet.signer().to_bytes();
    let private_key = PrivateKey::try_from_slice(key_bytes.as_slice())
        .map_err(|e| WalletError::DerivationError(e.to_string()))?;

    Ok((address, private_key))
}

/// Derive the Solana account at m/44'/501'/0'/0' per SLIP-0010.
fn derive_solana(seed: &[u8]) -> Result<(String, SolanaSecretKey), WalletError> {
    // Master key: HMAC-SHA512("ed25519 seed", seed)
    let mut mac = HmacSha512::new_from_slice(b"ed25519 seed")
        .map_err(|e| WalletError::DerivationError(format!("HMAC initialization failed: {}", e)))?;
    mac.update(seed);
    let result = mac.finalize().into_bytes();

    let mut key = Zeroizing::new([0u8; 32]);
    let mut chain_code = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&result[..32]);
    chain_code.copy_from_slice(&result[32..]);

    // ed25519 supports hardened derivation only: 0x00 || key || index'
    for index in SOLANA_PATH {
        let hardened = 0x8000_0000u32 | index;
        let mut mac = HmacSha512::new_from_slice(&*chain_code).map_err(|e| {
            WalletError::DerivationError(format!("HMAC initialization failed: {}", e))
        })?;
        mac.update(&[0x00]);
        mac.update(&*key);
        mac.update(&hardened.to_be_bytes());
        let derived = mac.finalize().into_bytes();
        key.copy_from_slice(&derived[..32]);
        chain_code.copy_from_slice(&derived[32..]);
    }

    let signing_key = ed25519_dalek::SigningKey::from_bytes(&key);
    let verifying_key = signing_key.verifying_key();
    let address = bs58::encode(verifying_key.as_bytes()).into_string();

    // 64-byte secret: seed || public key, the layout Solana tooling expects.
    let mut secret = Zeroizing::new([0u8; 64]);
    secret[..32].copy_from_slice(&*key);
    secret[32..].copy_from_slice(verifying_key.as_bytes());
    let secret_key = SolanaSecretKey::new(*secret);

    Ok((address, secret_key))
}
