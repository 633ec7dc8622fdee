//! The request/approval state machine.
//!
//! Per request the lifecycle is `Received -> AwaitingDecision -> Resolved`.
//! `Received` validates the origin and the vault-unlocked precondition and
//! short-circuits already-authorized connections. `AwaitingDecision` parks
//! the caller in the [`PendingRegistry`] behind the single visible approval
//! surface. `Resolved` is terminal: exactly one of approval, rejection or
//! timeout wins, later attempts find nothing to resolve.
//!
//! The broker fails closed everywhere: a surface that cannot open, a closed
//! prompt, a decision timeout and a background teardown all resolve the
//! suspended caller as rejected rather than leaving it hanging.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::authorizer::OriginAuthorizer;
use super::pending::{
    ApprovalOutcome, Decision, InsertOutcome, PendingRegistry, RequestKind, TxPayload,
};
use super::surface::ApprovalSurface;
use crate::core::config::BlockchainConfig;
use crate::core::domain::TxIntent;
use crate::core::errors::WalletError;
use crate::core::validation::validate_origin;
use crate::service::TransactionService;
use crate::vault::SecretVault;

pub struct ApprovalBroker {
    vault: Arc<SecretVault>,
    authorizer: Arc<OriginAuthorizer>,
    transactions: Arc<TransactionService>,
    surface: Arc<dyn ApprovalSurface>,
    pending: Arc<PendingRegistry>,
    blockchain: BlockchainConfig,
    decision_timeout: Duration,
}

impl ApprovalBroker {
    pub fn new(
        vault: Arc<SecretVault>,
        authorizer: Arc<OriginAuthorizer>,
        transactions: Arc<TransactionService>,
        surface: Arc<dyn ApprovalSurface>,
        blockchain: BlockchainConfig,
        decision_timeout: Duration,
    ) -> Self {
        Self {
            vault,
            authorizer,
            transactions,
            surface,
            pending: Arc::new(PendingRegistry::new()),
            blockchain,
            decision_timeout,
        }
    }

    pub fn pending(&self) -> &Arc<PendingRegistry> {
        &self.pending
    }

    /// A page asks to connect. Short-circuits when the origin already holds
    /// a grant; otherwise suspends until the human decides.
    pub async fn request_connection(&self, origin: &str) -> Result<ApprovalOutcome, WalletError> {
        validate_origin(origin)?;
        if !self.vault.is_unlocked() {
            return Err(WalletError::Locked);
        }

        if self.authorizer.is_connected(origin) {
            debug!(origin = %origin, "Origin already connected, skipping approval");
            return self.connected_outcome();
        }

        let (responder, receiver) = oneshot::channel();
        let outcome = self.pending.insert(RequestKind::Connect, origin, None, responder);
        self.admit(outcome).await;

        self.await_decision(receiver).await
    }

    /// A page asks to send a transaction. Only the decision to sign is up
    /// for approval: unconnected origins fail immediately and never open a
    /// surface.
    pub async fn request_transaction(
        &self,
        origin: &str,
        intent: TxIntent,
    ) -> Result<ApprovalOutcome, WalletError> {
        validate_origin(origin)?;
        if !self.authorizer.is_connected(origin) {
            return Err(WalletError::NotConnected(origin.to_string()));
        }
        if !self.vault.is_unlocked() {
            return Err(WalletError::Locked);
        }

        // Capture (chain, network) now so the decision executes against what
        // the approval surface displayed.
        let payload = TxPayload {
            chain: self.vault.active_chain(),
            network: self.vault.active_network(),
            intent,
        };

        let (responder, receiver) = oneshot::channel();
        let outcome =
            self.pending.insert(RequestKind::Transaction, origin, Some(payload), responder);
        self.admit(outcome).await;

        self.await_decision(receiver).await
    }

    /// Apply a decision command from the approval surface. `expected_kind`
    /// guards against a CONNECTION_* command resolving a transaction request
    /// and vice versa. Unknown ids return `NotFound`: a second resolution of
    /// the same request is a reply-level no-op, never a double-send.
    pub async fn resolve(
        &self,
        request_id: Uuid,
        decision: Decision,
        expected_kind: Option<RequestKind>,
    ) -> Result<(), WalletError> {
        if let Some(expected) = expected_kind {
            match self.pending.kind_of(request_id) {
                Some(kind) if kind == expected => {}
                Some(_) => {
                    return Err(WalletError::ValidationError(
                        "Decision does not match pending request kind".to_string(),
                    ))
                }
                None => {
                    return Err(WalletError::NotFound("No pending request".to_string()));
                }
            }
        }

        let Some((request, next)) = self.pending.resolve_take(request_id) else {
            return Err(WalletError::NotFound("No pending request".to_string()));
        };
        self.surface.close(request_id).await;

        match decision {
            Decision::Rejected => {
                info!(request_id = %request_id, origin = %request.origin, "Request rejected");
                request.notify_all(|| Err(WalletError::UserRejected));
            }
            Decision::Approved => {
                let result = match request.kind {
                    RequestKind::Connect => self.approve_connection(&request.origin).await,
                    RequestKind::Transaction => match &request.payload {
                        Some(payload) => self
                            .transactions
                            .send(payload.chain, &payload.network, &payload.intent)
                            .await
                            .map(ApprovalOutcome::Submitted),
                        None => Err(WalletError::InternalError(
                            "Transaction request without payload".to_string(),
                        )),
                    },
                };
                match &result {
                    Ok(_) => {
                        info!(request_id = %request_id, origin = %request.origin, "Request approved")
                    }
                    Err(e) => {
                        warn!(request_id = %request_id, "Approved request failed: {}", e)
                    }
                }
                request.notify_all(|| result.clone());
            }
        }

        self.open_next(next).await;
        Ok(())
    }

    /// The approval surface was dismissed without a decision (window manager
    /// close, popup teardown). Treated as an implicit rejection; a no-op if
    /// the request already resolved.
    pub async fn surface_closed(&self, request_id: Uuid) {
        match self.resolve(request_id, Decision::Rejected, None).await {
            Ok(()) => info!(request_id = %request_id, "Surface closed without decision, rejected"),
            Err(_) => debug!(request_id = %request_id, "Surface close for settled request"),
        }
    }

    /// Background teardown: every suspended caller resolves as rejected so
    /// no page hangs on a vanished process.
    pub async fn shutdown(&self) {
        let drained = self.pending.drain_all();
        if drained.is_empty() {
            return;
        }
        warn!("Shutting down with {} unresolved approval request(s)", drained.len());
        for request in drained {
            self.surface.close(request.id).await;
            request.notify_all(|| Err(WalletError::UserRejected));
        }
    }

    async fn admit(&self, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Visible(id) => {
                self.open_next(Some(id)).await;
                self.spawn_decision_timeout(id);
            }
            InsertOutcome::Queued(id) => {
                debug!(request_id = %id, "Approval surface busy, request queued");
                self.spawn_decision_timeout(id);
            }
            InsertOutcome::Attached(id) => {
                debug!(request_id = %id, "Attached to in-flight connection request");
            }
        }
    }

    async fn await_decision(
        &self,
        receiver: oneshot::Receiver<Result<ApprovalOutcome, WalletError>>,
    ) -> Result<ApprovalOutcome, WalletError> {
        // The registry guarantees a terminal notification (decision, timeout,
        // closure or shutdown); a dropped sender means the broker itself died.
        match receiver.await {
            Ok(result) => result,
            Err(_) => Err(WalletError::InternalError("Approval channel dropped".to_string())),
        }
    }

    async fn approve_connection(&self, origin: &str) -> Result<ApprovalOutcome, WalletError> {
        // The vault may have locked while the prompt was up.
        if !self.vault.is_unlocked() {
            return Err(WalletError::Locked);
        }
        let chain = self.vault.active_chain();
        let network = self.vault.active_network();
        self.authorizer.grant(origin, chain, &network).await?;
        self.connected_outcome()
    }

    fn connected_outcome(&self) -> Result<ApprovalOutcome, WalletError> {
        let accounts = self.vault.addresses()?;
        let chain = self.vault.active_chain();
        let network = self.vault.active_network();
        let chain_id = self.blockchain.network(chain, &network).and_then(|n| n.chain_id);
        Ok(ApprovalOutcome::Connected { accounts, chain, network, chain_id })
    }

    /// Promote `next` onto the surface.
    async fn open_next(&self, next: Option<Uuid>) {
        advance_surface(self.pending.as_ref(), self.surface.as_ref(), next).await;
    }

    /// The timeout task only ever rejects, so it captures the registry and
    /// the surface instead of the whole broker.
    fn spawn_decision_timeout(&self, request_id: Uuid) {
        let pending = Arc::clone(&self.pending);
        let surface = Arc::clone(&self.surface);
        let timeout = self.decision_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // A missing entry just means the user decided in time.
            if reject_expired(pending.as_ref(), surface.as_ref(), request_id).await {
                info!(request_id = %request_id, "Approval timed out, resolved as rejected");
            }
        });
    }
}

/// Walk the queue starting at `next` until a prompt opens. A request whose
/// prompt cannot be shown resolves as rejected and its successor is tried,
/// so the queue never stalls on a broken surface.
async fn advance_surface(
    pending: &PendingRegistry,
    surface: &dyn ApprovalSurface,
    mut next: Option<Uuid>,
) {
    while let Some(id) = next {
        let Some(summary) = pending.summary(id) else {
            break;
        };
        match surface.open(&summary).await {
            Ok(()) => break,
            Err(e) => {
                warn!(request_id = %id, "Failed to open approval surface: {}", e);
                match pending.resolve_take(id) {
                    Some((request, follow)) => {
                        request.notify_all(|| Err(WalletError::UserRejected));
                        next = follow;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Resolve `id` as rejected without the full broker: the timeout path.
/// Returns whether an entry was actually resolved.
async fn reject_expired(
    pending: &PendingRegistry,
    surface: &dyn ApprovalSurface,
    id: Uuid,
) -> bool {
    let Some((request, next)) = pending.resolve_take(id) else {
        return false;
    };
    surface.close(id).await;
    request.notify_all(|| Err(WalletError::UserRejected));
    advance_surface(pending, surface, next).await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::pending::PendingSummary;
    use crate::blockchain::ChainProviderRegistry;
    use crate::core::config::{GasTierConfig, SecurityConfig};
    use crate::core::derivation::Bip44Derivation;
    use crate::core::domain::Chain;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    /// Surface fake that records prompts and can be told to fail.
    #[derive(Default)]
    struct RecordingSurface {
        opened: Mutex<Vec<PendingSummary>>,
        closed: Mutex<Vec<Uuid>>,
        fail_open: Mutex<bool>,
    }

    impl RecordingSurface {
        fn opened_ids(&self) -> Vec<Uuid> {
            self.opened.lock().iter().map(|s| s.request_id).collect()
        }

        fn last_opened(&self) -> Option<PendingSummary> {
            self.opened.lock().last().cloned()
        }
    }

    #[async_trait]
    impl ApprovalSurface for RecordingSurface {
        async fn open(&self, request: &PendingSummary) -> Result<(), WalletError> {
            if *self.fail_open.lock() {
                return Err(WalletError::InternalError("popup blocked".to_string()));
            }
            self.opened.lock().push(request.clone());
            Ok(())
        }

        async fn close(&self, request_id: Uuid) {
            self.closed.lock().push(request_id);
        }
    }

    struct Fixture {
        broker: Arc<ApprovalBroker>,
        surface: Arc<RecordingSurface>,
        authorizer: Arc<OriginAuthorizer>,
        vault: Arc<SecretVault>,
    }

    async fn fixture(unlock: bool, decision_timeout: Duration) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let vault = Arc::new(SecretVault::new(
            store.clone(),
            Arc::new(Bip44Derivation),
            SecurityConfig { pbkdf2_iterations: 1_000, ..SecurityConfig::default() },
            Chain::Ethereum,
            "sepolia",
        ));
        if unlock {
            vault.create("Str0ng!Pass", TEST_MNEMONIC).await.unwrap();
        }

        let mut blockchain = crate::core::config::BlockchainConfig::default();
        for table in blockchain.networks.values_mut() {
            for network in table.values_mut() {
                network.rpc_url = "http://127.0.0.1:59978".to_string();
                network.backup_rpc_urls.clear();
            }
        }
        blockchain.rpc_timeout_secs = 1;

        let registry = Arc::new(ChainProviderRegistry::new(blockchain.clone()));
        let transactions = Arc::new(TransactionService::new(
            registry,
            vault.clone(),
            GasTierConfig::default(),
        ));
        let authorizer = Arc::new(OriginAuthorizer::new(store));
        let surface = Arc::new(RecordingSurface::default());
        let broker = Arc::new(ApprovalBroker::new(
            vault.clone(),
            authorizer.clone(),
            transactions,
            surface.clone(),
            blockchain,
            decision_timeout,
        ));
        Fixture { broker, surface, authorizer, vault }
    }

    fn long_timeout() -> Duration {
        Duration::from_secs(60)
    }

    #[tokio::test]
    async fn test_connection_approved_grants_and_returns_accounts() {
        let fx = fixture(true, long_timeout()).await;
        let broker = fx.broker.clone();

        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://dapp.example").await }
        });

        // Wait for the surface to show the request.
        let request_id = loop {
            if let Some(summary) = fx.surface.last_opened() {
                break summary.request_id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        broker.resolve(request_id, Decision::Approved, Some(RequestKind::Connect)).await.unwrap();

        let outcome = task.await.unwrap().unwrap();
        match outcome {
            ApprovalOutcome::Connected { accounts, chain_id, .. } => {
                assert_eq!(
                    accounts.ethereum_address,
                    "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
                );
                assert_eq!(chain_id, Some(11_155_111));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(fx.authorizer.is_connected("https://dapp.example"));
        assert!(fx.broker.pending().is_empty());
    }

    #[tokio::test]
    async fn test_connection_rejected() {
        let fx = fixture(true, long_timeout()).await;
        let broker = fx.broker.clone();

        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://dapp.example").await }
        });

        let request_id = loop {
            if let Some(summary) = fx.surface.last_opened() {
                break summary.request_id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        broker.resolve(request_id, Decision::Rejected, Some(RequestKind::Connect)).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result.unwrap_err(), WalletError::UserRejected));
        assert!(!fx.authorizer.is_connected("https://dapp.example"));
    }

    #[tokio::test]
    async fn test_connected_origin_short_circuits() {
        let fx = fixture(true, long_timeout()).await;
        fx.authorizer.grant("https://dapp.example", Chain::Ethereum, "sepolia").await.unwrap();

        let outcome = fx.broker.request_connection("https://dapp.example").await.unwrap();
        assert!(matches!(outcome, ApprovalOutcome::Connected { .. }));
        // No surface was ever opened.
        assert!(fx.surface.opened_ids().is_empty());
    }

    #[tokio::test]
    async fn test_locked_vault_fails_fast() {
        let fx = fixture(false, long_timeout()).await;
        let result = fx.broker.request_connection("https://dapp.example").await;
        assert!(matches!(result.unwrap_err(), WalletError::Locked));
        assert!(fx.surface.opened_ids().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_origin_rejected_before_anything() {
        let fx = fixture(true, long_timeout()).await;
        let result = fx.broker.request_connection("not-an-origin").await;
        assert!(matches!(result.unwrap_err(), WalletError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_unconnected_transaction_fails_without_surface() {
        let fx = fixture(true, long_timeout()).await;
        let intent = TxIntent::new("0x742d35Cc6634C0532925a3b8D400e8B78fFe4860", "0.1");

        let result = fx.broker.request_transaction("https://dapp.example", intent).await;
        assert!(matches!(result.unwrap_err(), WalletError::NotConnected(_)));
        assert!(fx.surface.opened_ids().is_empty());
        assert!(fx.broker.pending().is_empty());
    }

    #[tokio::test]
    async fn test_approved_transaction_relays_service_error_verbatim() {
        let fx = fixture(true, long_timeout()).await;
        fx.authorizer.grant("https://dapp.example", Chain::Ethereum, "sepolia").await.unwrap();
        let broker = fx.broker.clone();

        let task = tokio::spawn({
            let broker = broker.clone();
            let intent = TxIntent::new("0x742d35Cc6634C0532925a3b8D400e8B78fFe4860", "0.1");
            async move { broker.request_transaction("https://dapp.example", intent).await }
        });

        let request_id = loop {
            if let Some(summary) = fx.surface.last_opened() {
                break summary.request_id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        broker
            .resolve(request_id, Decision::Approved, Some(RequestKind::Transaction))
            .await
            .unwrap();

        // The registry endpoints are dark, so approval surfaces the provider
        // failure to the original caller instead of fabricating success.
        let result = task.await.unwrap();
        assert!(matches!(result.unwrap_err(), WalletError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_second_resolution_is_noop() {
        let fx = fixture(true, long_timeout()).await;
        let broker = fx.broker.clone();

        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://dapp.example").await }
        });

        let request_id = loop {
            if let Some(summary) = fx.surface.last_opened() {
                break summary.request_id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        broker.resolve(request_id, Decision::Rejected, None).await.unwrap();
        let second = broker.resolve(request_id, Decision::Approved, None).await;
        assert!(matches!(second.unwrap_err(), WalletError::NotFound(_)));

        // The caller saw exactly the first outcome.
        assert!(matches!(task.await.unwrap().unwrap_err(), WalletError::UserRejected));
    }

    #[tokio::test]
    async fn test_kind_mismatch_refused() {
        let fx = fixture(true, long_timeout()).await;
        let broker = fx.broker.clone();

        let _task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://dapp.example").await }
        });

        let request_id = loop {
            if let Some(summary) = fx.surface.last_opened() {
                break summary.request_id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        let result =
            broker.resolve(request_id, Decision::Approved, Some(RequestKind::Transaction)).await;
        assert!(matches!(result.unwrap_err(), WalletError::ValidationError(_)));
        // Still pending: the mismatched command resolved nothing.
        assert_eq!(fx.broker.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_decision_timeout_resolves_rejected() {
        let fx = fixture(true, Duration::from_millis(50)).await;
        let broker = fx.broker.clone();

        let result = broker.request_connection("https://dapp.example").await;
        assert!(matches!(result.unwrap_err(), WalletError::UserRejected));
        assert!(fx.broker.pending().is_empty());
    }

    #[tokio::test]
    async fn test_surface_closed_is_implicit_rejection() {
        let fx = fixture(true, long_timeout()).await;
        let broker = fx.broker.clone();

        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://dapp.example").await }
        });

        let request_id = loop {
            if let Some(summary) = fx.surface.last_opened() {
                break summary.request_id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        broker.surface_closed(request_id).await;
        assert!(matches!(task.await.unwrap().unwrap_err(), WalletError::UserRejected));

        // Closing again is harmless.
        broker.surface_closed(request_id).await;
    }

    #[tokio::test]
    async fn test_concurrent_origins_queue_one_visible_surface() {
        let fx = fixture(true, long_timeout()).await;
        let broker = fx.broker.clone();

        let task_a = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://a.example").await }
        });
        // Ensure arrival order.
        let id_a = loop {
            if let Some(summary) = fx.surface.last_opened() {
                break summary.request_id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        let task_b = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://b.example").await }
        });
        // Give B time to enqueue; only one surface may be open.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fx.surface.opened_ids().len(), 1);
        assert_eq!(fx.broker.pending().len(), 2);

        broker.resolve(id_a, Decision::Approved, Some(RequestKind::Connect)).await.unwrap();
        assert!(task_a.await.unwrap().is_ok());

        // B's surface opens only after A resolves.
        let id_b = loop {
            let opened = fx.surface.opened_ids();
            if opened.len() == 2 {
                break opened[1];
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        assert_eq!(fx.surface.last_opened().unwrap().origin, "https://b.example");

        broker.resolve(id_b, Decision::Rejected, Some(RequestKind::Connect)).await.unwrap();
        assert!(matches!(task_b.await.unwrap().unwrap_err(), WalletError::UserRejected));
    }

    #[tokio::test]
    async fn test_same_origin_concurrent_connects_share_one_surface() {
        let fx = fixture(true, long_timeout()).await;
        let broker = fx.broker.clone();

        let task_a = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://dapp.example").await }
        });
        let request_id = loop {
            if let Some(summary) = fx.surface.last_opened() {
                break summary.request_id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        let task_b = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://dapp.example").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // One entry, one surface, two suspended callers.
        assert_eq!(fx.broker.pending().len(), 1);
        assert_eq!(fx.surface.opened_ids().len(), 1);

        broker.resolve(request_id, Decision::Approved, Some(RequestKind::Connect)).await.unwrap();
        assert!(task_a.await.unwrap().is_ok());
        assert!(task_b.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_unopenable_surface_fails_closed() {
        let fx = fixture(true, long_timeout()).await;
        *fx.surface.fail_open.lock() = true;

        let result = fx.broker.request_connection("https://dapp.example").await;
        assert!(matches!(result.unwrap_err(), WalletError::UserRejected));
        assert!(fx.broker.pending().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_releases_all_suspended_callers() {
        let fx = fixture(true, long_timeout()).await;
        let broker = fx.broker.clone();

        let task_a = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://a.example").await }
        });
        let task_b = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://b.example").await }
        });
        while fx.broker.pending().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        broker.shutdown().await;
        assert!(matches!(task_a.await.unwrap().unwrap_err(), WalletError::UserRejected));
        assert!(matches!(task_b.await.unwrap().unwrap_err(), WalletError::UserRejected));
        assert!(fx.broker.pending().is_empty());
    }

    #[tokio::test]
    async fn test_lock_during_pending_approval_fails_closed() {
        let fx = fixture(true, long_timeout()).await;
        let broker = fx.broker.clone();

        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.request_connection("https://dapp.example").await }
        });
        let request_id = loop {
            if let Some(summary) = fx.surface.last_opened() {
                break summary.request_id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        // Auto-lock fires while the prompt is on screen.
        fx.vault.lock();
        broker.resolve(request_id, Decision::Approved, Some(RequestKind::Connect)).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result.unwrap_err(), WalletError::Locked));
        assert!(!fx.authorizer.is_connected("https://dapp.example"));
    }
}
