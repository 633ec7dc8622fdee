//! The command protocol spoken at the background boundary.
//!
//! Every message is a closed tagged variant: adding a command means adding a
//! variant here and an arm in the dispatch, never string-matching. Replies
//! are `{success, error?, ...fields}` where `error` is one of the stable
//! codes from [`WalletError::code`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::domain::{Chain, TxIntent};
use crate::core::errors::WalletError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Command {
    GenerateMnemonic,
    CreateWallet {
        password: String,
        mnemonic: String,
    },
    ImportWallet {
        mnemonic: String,
        password: String,
    },
    UnlockWallet {
        password: String,
    },
    LockWallet,
    CheckWalletStatus,
    GetAccounts,
    GetTokens {
        chain: Chain,
        network: String,
    },
    GetGasPrice {
        chain: Chain,
        network: String,
    },
    EstimateTransaction {
        chain: Chain,
        network: String,
        transaction: TxIntent,
    },
    SendTransaction {
        transaction: TxIntent,
        /// Present when the request came from a page through the relay;
        /// absent for the wallet's own send screen.
        #[serde(default)]
        origin: Option<String>,
    },
    UpdateNetwork {
        chain: Chain,
        network: String,
    },
    ConnectRequest {
        origin: String,
    },
    ConnectionApproved {
        request_id: Uuid,
    },
    ConnectionRejected {
        request_id: Uuid,
    },
    TransactionApproved {
        request_id: Uuid,
    },
    TransactionRejected {
        request_id: Uuid,
    },
    GetPendingRequest {
        request_id: Uuid,
    },
    GetConnectedSites,
    DisconnectSite {
        origin: String,
    },
    ExportPrivateKey {
        chain: Chain,
    },
}

impl Command {
    /// Wire tag of this command, as serialized into the `type` field.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::GenerateMnemonic => "GENERATE_MNEMONIC",
            Command::CreateWallet { .. } => "CREATE_WALLET",
            Command::ImportWallet { .. } => "IMPORT_WALLET",
            Command::UnlockWallet { .. } => "UNLOCK_WALLET",
            Command::LockWallet => "LOCK_WALLET",
            Command::CheckWalletStatus => "CHECK_WALLET_STATUS",
            Command::GetAccounts => "GET_ACCOUNTS",
            Command::GetTokens { .. } => "GET_TOKENS",
            Command::GetGasPrice { .. } => "GET_GAS_PRICE",
            Command::EstimateTransaction { .. } => "ESTIMATE_TRANSACTION",
            Command::SendTransaction { .. } => "SEND_TRANSACTION",
            Command::UpdateNetwork { .. } => "UPDATE_NETWORK",
            Command::ConnectRequest { .. } => "CONNECT_REQUEST",
            Command::ConnectionApproved { .. } => "CONNECTION_APPROVED",
            Command::ConnectionRejected { .. } => "CONNECTION_REJECTED",
            Command::TransactionApproved { .. } => "TRANSACTION_APPROVED",
            Command::TransactionRejected { .. } => "TRANSACTION_REJECTED",
            Command::GetPendingRequest { .. } => "GET_PENDING_REQUEST",
            Command::GetConnectedSites => "GET_CONNECTED_SITES",
            Command::DisconnectSite { .. } => "DISCONNECT_SITE",
            Command::ExportPrivateKey { .. } => "EXPORT_PRIVATE_KEY",
        }
    }
}

/// Reply envelope. `data` fields are flattened next to `success` so the wire
/// shape matches what pages and popup screens historically consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
    pub success: bool,
    /// Stable error code, present when `success == false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable detail for logs and dialogs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

impl CommandReply {
    /// Success reply. `data` must serialize to a JSON object (or null).
    pub fn ok(data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                // Non-object payloads get wrapped instead of dropped.
                let mut map = serde_json::Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        Self { success: true, error: None, message: None, data }
    }

    pub fn err(error: &WalletError) -> Self {
        Self {
            success: false,
            error: Some(error.code().to_string()),
            message: Some(error.to_string()),
            data: serde_json::Map::new(),
        }
    }

    pub fn from_result(result: Result<Value, WalletError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::err(&e),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Reconstruct the typed error from a failure reply.
    pub fn as_error(&self) -> Option<WalletError> {
        if self.success {
            return None;
        }
        let code = self.error.as_deref().unwrap_or("InternalError");
        let detail = self.message.as_deref().unwrap_or_default();
        Some(WalletError::from_code(code, detail))
    }
}
