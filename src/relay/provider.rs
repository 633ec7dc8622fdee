//! The provider object injected into untrusted pages.
//!
//! Implements the `request({method, params})` surface a dApp expects from
//! `window.ethereum`: account connection, cached reads, transaction
//! submission, and the `accountsChanged` / `chainChanged` / `disconnect`
//! event stream. All privileged work goes through the relay; the provider
//! itself holds nothing but its origin and a cache of public data.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::channel::RelayChannel;
use crate::background::{Command, WalletEvent};
use crate::core::domain::TxIntent;
use crate::core::errors::WalletError;

/// Events re-emitted to page listeners.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProviderEvent {
    AccountsChanged { accounts: Vec<String> },
    ChainChanged { chain_id: String },
    Disconnect,
}

#[derive(Default)]
struct ProviderState {
    connected: bool,
    accounts: Vec<String>,
    chain_id: Option<String>,
}

pub struct PageProvider {
    relay: RelayChannel,
    origin: String,
    state: Arc<Mutex<ProviderState>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl PageProvider {
    pub fn new(relay: RelayChannel, origin: &str) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            relay,
            origin: origin.to_string(),
            state: Arc::new(Mutex::new(ProviderState::default())),
            events,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    /// Mirror background push events into page events. Spawned once per
    /// provider; the task ends when the background sender is dropped.
    pub fn attach_wallet_events(&self, mut wallet_events: broadcast::Receiver<WalletEvent>) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let origin = self.origin.clone();
        tokio::spawn(async move {
            while let Ok(event) = wallet_events.recv().await {
                match event {
                    WalletEvent::Disconnected { origin: event_origin }
                        if event_origin == origin =>
                    {
                        {
                            let mut state = state.lock();
                            state.connected = false;
                            state.accounts.clear();
                        }
                        let _ = events.send(ProviderEvent::Disconnect);
                        let _ = events
                            .send(ProviderEvent::AccountsChanged { accounts: Vec::new() });
                    }
                    WalletEvent::Disconnected { .. } => {}
                    WalletEvent::ChainChanged { chain_id, .. } => {
                        if let Some(id) = chain_id {
                            let hex = format!("0x{:x}", id);
                            state.lock().chain_id = Some(hex.clone());
                            let _ = events.send(ProviderEvent::ChainChanged { chain_id: hex });
                        }
                    }
                    WalletEvent::AccountsChanged { accounts } => {
                        let forward = {
                            let mut state = state.lock();
                            if state.connected {
                                state.accounts = accounts.clone();
                                true
                            } else {
                                false
                            }
                        };
                        if forward {
                            let _ = events.send(ProviderEvent::AccountsChanged { accounts });
                        }
                    }
                }
            }
        });
    }

    /// The page-facing entry point. Stable error codes per documented
    /// taxonomy, so dApps can branch on `UserRejected` vs `NotConnected` vs
    /// provider failure.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        debug!(origin = %self.origin, method = %method, "Provider request");
        match method {
            "eth_requestAccounts" => self.connect().await,
            "eth_accounts" => Ok(json!(self.state.lock().accounts.clone())),
            "eth_chainId" => {
                let chain_id = self.state.lock().chain_id.clone();
                chain_id
                    .map(Value::String)
                    .ok_or_else(|| WalletError::NotConnected(self.origin.clone()))
            }
            "eth_sendTransaction" => self.send_transaction(params).await,
            other => Err(WalletError::NotImplemented(format!("Method {} not supported", other))),
        }
    }

    async fn connect(&self) -> Result<Value, WalletError> {
        {
            let state = self.state.lock();
            if state.connected {
                // Already connected: same answer, no approval round trip.
                return Ok(json!(state.accounts.clone()));
            }
        }

        let reply = self
            .relay
            .forward(&self.origin, Command::ConnectRequest { origin: self.origin.clone() })
            .await?;

        if let Some(error) = reply.as_error() {
            return Err(error);
        }

        let accounts: Vec<String> = reply
            .get("accounts")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        let chain_id = reply.get("chainId").and_then(Value::as_str).map(str::to_string);

        {
            let mut state = self.state.lock();
            state.connected = true;
            state.accounts = accounts.clone();
            state.chain_id = chain_id.clone();
        }

        self.emit(ProviderEvent::AccountsChanged { accounts: accounts.clone() });
        if let Some(chain_id) = chain_id {
            self.emit(ProviderEvent::ChainChanged { chain_id });
        }

        Ok(json!(accounts))
    }

    async fn send_transaction(&self, params: Value) -> Result<Value, WalletError> {
        let intent: TxIntent = match params {
            // eth_sendTransaction params: [txObject]
            Value::Array(mut items) if !items.is_empty() => {
                serde_json::from_value(items.remove(0))
                    .map_err(|e| WalletError::ValidationError(format!("Bad transaction: {}", e)))?
            }
            other => serde_json::from_value(other)
                .map_err(|e| WalletError::ValidationError(format!("Bad transaction: {}", e)))?,
        };

        let reply = self
            .relay
            .forward(
                &self.origin,
                Command::SendTransaction { transaction: intent, origin: None },
            )
            .await?;

        if let Some(error) = reply.as_error() {
            return Err(error);
        }

        reply
            .get("hash")
            .cloned()
            .ok_or_else(|| WalletError::InternalError("Response missing hash".to_string()))
    }

    fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }
}
