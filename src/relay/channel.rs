//! The page <-> background transport.
//!
//! Models the content-relay hop of the extension: it stamps every forwarded
//! request with a fresh correlation id and the caller's origin, and
//! guarantees at most one delivered response per request (the response
//! travels on a oneshot channel keyed by that id). Only the two page-safe
//! commands cross this boundary; privileged commands are refused here, the
//! same way the content script only ever forwards connect and send messages.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::background::{Background, Command, CommandReply};
use crate::core::errors::WalletError;

struct Envelope {
    id: Uuid,
    origin: String,
    command: Command,
    respond_to: oneshot::Sender<CommandReply>,
}

#[derive(Clone)]
pub struct RelayChannel {
    tx: mpsc::Sender<Envelope>,
    response_timeout: Duration,
}

impl RelayChannel {
    /// Start the relay loop over `background`. Each received request runs in
    /// its own task, so a request suspended on an approval never blocks the
    /// others. `response_timeout` must exceed the broker's decision timeout:
    /// the broker, not the relay, is the component that resolves stalled
    /// approvals.
    pub fn spawn(background: Arc<Background>, response_timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<Envelope>(64);

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let background = background.clone();
                tokio::spawn(async move {
                    let Envelope { id, origin, command, respond_to } = envelope;
                    debug!(request_id = %id, origin = %origin, command = command.tag(),
                           "Relaying page request");
                    let reply = background.handle(command).await;
                    // The receiver may have timed out; delivery stays
                    // at-most-once either way.
                    if respond_to.send(reply).is_err() {
                        warn!(request_id = %id, "Relay caller gone before response");
                    }
                });
            }
        });

        Self { tx, response_timeout }
    }

    /// Forward a page command under `origin`. The origin field inside the
    /// command is overwritten with the relay-observed one, so a page cannot
    /// impersonate another origin.
    pub async fn forward(
        &self,
        origin: &str,
        command: Command,
    ) -> Result<CommandReply, WalletError> {
        let command = match command {
            Command::ConnectRequest { .. } => {
                Command::ConnectRequest { origin: origin.to_string() }
            }
            Command::SendTransaction { transaction, .. } => {
                Command::SendTransaction { transaction, origin: Some(origin.to_string()) }
            }
            other => {
                return Err(WalletError::ValidationError(format!(
                    "Command {} is not page-accessible",
                    other.tag()
                )));
            }
        };

        let id = Uuid::new_v4();
        let (respond_to, response) = oneshot::channel();
        let envelope = Envelope { id, origin: origin.to_string(), command, respond_to };

        self.tx
            .send(envelope)
            .await
            .map_err(|_| WalletError::InternalError("Background is gone".to_string()))?;

        // The broker guarantees resolution well inside this window; the
        // timeout is a final backstop so a page promise can never hang.
        match tokio::time::timeout(self.response_timeout, response).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(WalletError::InternalError("Response channel dropped".to_string())),
            Err(_) => Err(WalletError::InternalError("Relay response timed out".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::pending::PendingSummary;
    use crate::background::ApprovalSurface;
    use crate::core::config::WalletConfig;
    use crate::core::derivation::Bip44Derivation;
    use crate::core::domain::TxIntent;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    struct SilentSurface;

    #[async_trait]
    impl ApprovalSurface for SilentSurface {
        async fn open(&self, _request: &PendingSummary) -> Result<(), WalletError> {
            Ok(())
        }

        async fn close(&self, _request_id: Uuid) {}
    }

    async fn relay() -> RelayChannel {
        let mut config = WalletConfig::default();
        config.security.pbkdf2_iterations = 1_000;
        config.blockchain.rpc_timeout_secs = 1;
        let store = Arc::new(MemoryStore::new());
        let background = Background::new(
            config,
            store.clone(),
            store,
            Arc::new(Bip44Derivation),
            Arc::new(SilentSurface),
        )
        .await
        .unwrap();
        RelayChannel::spawn(background, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_privileged_commands_refused() {
        let relay = relay().await;
        let result = relay
            .forward("https://dapp.example", Command::UnlockWallet { password: "x".to_string() })
            .await;
        assert!(matches!(result.unwrap_err(), WalletError::ValidationError(_)));

        let result = relay.forward("https://dapp.example", Command::GetAccounts).await;
        assert!(matches!(result.unwrap_err(), WalletError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_origin_is_stamped_by_relay() {
        let relay = relay().await;
        // The page claims someone else's origin; the relay overwrites it.
        // The wallet is locked, so the reply code proves the request reached
        // the background (Locked) rather than being refused at the relay.
        let reply = relay
            .forward(
                "https://real.example",
                Command::ConnectRequest { origin: "https://forged.example".to_string() },
            )
            .await
            .unwrap();
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("Locked"));
    }

    #[tokio::test]
    async fn test_send_transaction_gets_exactly_one_reply() {
        let relay = relay().await;
        let reply = relay
            .forward(
                "https://dapp.example",
                Command::SendTransaction {
                    transaction: TxIntent::new("0x742d35Cc6634C0532925a3b8D400e8B78fFe4860", "1"),
                    origin: None,
                },
            )
            .await
            .unwrap();
        // Authorization precedes the vault check: an unconnected origin sees
        // NotConnected even while the wallet is locked.
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("NotConnected"));
    }
}
