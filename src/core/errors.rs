use std::fmt;

/// Custom error type for wallet operations.
///
/// Every error that crosses the command-protocol boundary maps to a stable
/// code string (see [`WalletError::code`]) so pages and UI screens can branch
/// on the failure kind instead of parsing prose.
#[derive(Debug, Clone)]
pub enum WalletError {
    /// Operation needs an unlocked vault.
    Locked,
    /// Decryption of the stored wallet blob failed. Deliberately does not
    /// distinguish a wrong password from ciphertext corruption.
    InvalidPassword,
    /// No wallet blob, or no pending request with the given id.
    NotFound(String),
    /// The requesting origin holds no connection grant.
    NotConnected(String),
    /// The user rejected the request, or the approval surface was closed
    /// without a decision.
    UserRejected,
    /// Every candidate RPC endpoint for the (chain, network) failed.
    ProviderUnavailable(String),
    /// Node reported the sender cannot cover value + fees.
    InsufficientFunds(String),
    /// Mnemonic parsing or key derivation errors.
    DerivationError(String),
    /// Storage-related errors.
    StorageError(String),
    /// Functionality that is deliberately not implemented.
    NotImplemented(String),
    /// Node-level rejection of a submitted transaction.
    Rejected(String),
    /// Input validation errors.
    ValidationError(String),
    /// Internal errors.
    InternalError(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::Locked => write!(f, "Wallet is locked"),
            WalletError::InvalidPassword => write!(f, "Incorrect password or corrupted data"),
            WalletError::NotFound(msg) => write!(f, "Not found: {}", msg),
            WalletError::NotConnected(msg) => write!(f, "Origin not connected: {}", msg),
            WalletError::UserRejected => write!(f, "Request rejected by user"),
            WalletError::ProviderUnavailable(msg) => write!(f, "Provider unavailable: {}", msg),
            WalletError::InsufficientFunds(msg) => write!(f, "Insufficient funds: {}", msg),
            WalletError::DerivationError(msg) => write!(f, "Key derivation error: {}", msg),
            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            WalletError::Rejected(msg) => write!(f, "Transaction rejected: {}", msg),
            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

impl WalletError {
    /// Stable code crossing the command boundary. Documented API surface:
    /// dApps branch on these strings, so variants map 1:1 and never change.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::Locked => "Locked",
            WalletError::InvalidPassword => "InvalidPassword",
            WalletError::NotFound(_) => "NotFound",
            WalletError::NotConnected(_) => "NotConnected",
            WalletError::UserRejected => "UserRejected",
            WalletError::ProviderUnavailable(_) => "ProviderUnavailable",
            WalletError::InsufficientFunds(_) => "InsufficientFunds",
            WalletError::DerivationError(_) => "DerivationError",
            WalletError::StorageError(_) => "StorageError",
            WalletError::NotImplemented(_) => "NotImplemented",
            WalletError::Rejected(_) => "Rejected",
            WalletError::ValidationError(_) => "ValidationError",
            WalletError::InternalError(_) => "InternalError",
        }
    }

    /// Rebuild an error from a wire code, e.g. on the page side of the relay.
    /// Unknown codes collapse to `InternalError` so a page never crashes on a
    /// response from a newer background.
    pub fn from_code(code: &str, detail: &str) -> Self {
        match code {
            "Locked" => WalletError::Locked,
            "InvalidPassword" => WalletError::InvalidPassword,
            "NotFound" => WalletError::NotFound(detail.to_string()),
            "NotConnected" => WalletError::NotConnected(detail.to_string()),
            "UserRejected" => WalletError::UserRejected,
            "ProviderUnavailable" => WalletError::ProviderUnavailable(detail.to_string()),
            "InsufficientFunds" => WalletError::InsufficientFunds(detail.to_string()),
            "DerivationError" => WalletError::DerivationError(detail.to_string()),
            "StorageError" => WalletError::StorageError(detail.to_string()),
            "NotImplemented" => WalletError::NotImplemented(detail.to_string()),
            "Rejected" => WalletError::Rejected(detail.to_string()),
            "ValidationError" => WalletError::ValidationError(detail.to_string()),
            _ => WalletError::InternalError(detail.to_string()),
        }
    }

    /// Whether a caller may transparently retry against another endpoint.
    /// Terminal outcomes (wrong password, user rejection, node rejection)
    /// must surface verbatim instead.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::ProviderUnavailable(_))
    }
}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        WalletError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::ValidationError(err.to_string())
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(err: sqlx::Error) -> Self {
        WalletError::StorageError(err.to_string())
    }
}
