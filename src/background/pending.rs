//! Registry of suspended cross-context calls.
//!
//! A `PendingRequest` is the explicit form of "a page is waiting on a human":
//! it owns the responder half of each suspended caller and is keyed by the
//! correlation id shown to the approval surface. The registry enforces the
//! two structural invariants of the approval flow:
//!
//! - exactly one terminal resolution per request: `resolve_take` removes the
//!   entry, so a second resolution attempt finds nothing and becomes a no-op;
//! - one visible surface at a time: requests created while another is on
//!   screen queue in arrival order, and same-origin connection requests
//!   attach to the existing entry instead of duplicating it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::core::domain::{Chain, TxIntent, TxReceipt};
use crate::core::errors::WalletError;
use crate::vault::WalletAddresses;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Connect,
    Transaction,
}

/// The user's verdict as reported by the approval surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

/// What a suspended caller receives once its request resolves favourably.
#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
    Connected { accounts: WalletAddresses, chain: Chain, network: String, chain_id: Option<u64> },
    Submitted(TxReceipt),
}

pub type Responder = oneshot::Sender<Result<ApprovalOutcome, WalletError>>;

/// Transaction payload captured at request time, so the decision executes
/// against the (chain, network) the user actually saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxPayload {
    pub chain: Chain,
    pub network: String,
    pub intent: TxIntent,
}

pub struct PendingRequest {
    pub id: Uuid,
    pub kind: RequestKind,
    pub origin: String,
    pub payload: Option<TxPayload>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    responders: Vec<Responder>,
}

impl PendingRequest {
    /// Deliver `build()`'s value to every attached caller. Build is invoked
    /// once per responder because resolution results are not `Clone` across
    /// the error arm.
    pub fn notify_all<F>(self, build: F)
    where
        F: Fn() -> Result<ApprovalOutcome, WalletError>,
    {
        for responder in self.responders {
            // A caller that gave up (relay timeout) just drops its receiver.
            let _ = responder.send(build());
        }
    }
}

/// Serializable view for the approval surface and GET_PENDING_REQUEST.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSummary {
    pub request_id: Uuid,
    pub kind: RequestKind,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TxPayload>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Where a freshly inserted request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First in line: the caller must open the approval surface for it.
    Visible(Uuid),
    /// Another request holds the surface; this one waits in arrival order.
    Queued(Uuid),
    /// Same-origin connection already awaiting a decision; the caller was
    /// attached to it and must not open anything.
    Attached(Uuid),
}

impl InsertOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            InsertOutcome::Visible(id) | InsertOutcome::Queued(id) | InsertOutcome::Attached(id) => {
                *id
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, PendingRequest>,
    visible: Option<Uuid>,
    queue: VecDeque<Uuid>,
    connect_by_origin: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct PendingRegistry {
    inner: Mutex<Inner>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a suspended caller. Connection requests coalesce per origin;
    /// everything else gets its own entry.
    pub fn insert(
        &self,
        kind: RequestKind,
        origin: &str,
        payload: Option<TxPayload>,
        responder: Responder,
    ) -> InsertOutcome {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if kind == RequestKind::Connect {
            if let Some(&existing) = inner.connect_by_origin.get(origin) {
                if let Some(entry) = inner.entries.get_mut(&existing) {
                    entry.responders.push(responder);
                    return InsertOutcome::Attached(existing);
                }
                // Stale index entry; fall through and create fresh.
                inner.connect_by_origin.remove(origin);
            }
        }

        let id = Uuid::new_v4();
        let request = PendingRequest {
            id,
            kind,
            origin: origin.to_string(),
            payload,
            created_at: chrono::Utc::now(),
            responders: vec![responder],
        };
        inner.entries.insert(id, request);
        if kind == RequestKind::Connect {
            inner.connect_by_origin.insert(origin.to_string(), id);
        }

        if inner.visible.is_none() {
            inner.visible = Some(id);
            InsertOutcome::Visible(id)
        } else {
            inner.queue.push_back(id);
            InsertOutcome::Queued(id)
        }
    }

    /// Remove `id` and return it together with the next request that should
    /// take the surface, if `id` was the visible one. Returns `None` when the
    /// request was already resolved: that makes any second resolution attempt
    /// a no-op by construction.
    pub fn resolve_take(&self, id: Uuid) -> Option<(PendingRequest, Option<Uuid>)> {
        let mut inner = self.inner.lock();
        let request = inner.entries.remove(&id)?;

        if request.kind == RequestKind::Connect {
            inner.connect_by_origin.remove(&request.origin);
        }

        let next = if inner.visible == Some(id) {
            inner.visible = None;
            // Skip queue entries that vanished (e.g. drained on teardown).
            loop {
                match inner.queue.pop_front() {
                    Some(candidate) if inner.entries.contains_key(&candidate) => {
                        inner.visible = Some(candidate);
                        break Some(candidate);
                    }
                    Some(_) => continue,
                    None => break None,
                }
            }
        } else {
            inner.queue.retain(|queued| *queued != id);
            None
        };

        Some((request, next))
    }

    pub fn summary(&self, id: Uuid) -> Option<PendingSummary> {
        let inner = self.inner.lock();
        inner.entries.get(&id).map(|request| PendingSummary {
            request_id: request.id,
            kind: request.kind,
            origin: request.origin.clone(),
            transaction: request.payload.clone(),
            created_at: request.created_at,
        })
    }

    pub fn kind_of(&self, id: Uuid) -> Option<RequestKind> {
        self.inner.lock().entries.get(&id).map(|request| request.kind)
    }

    pub fn visible_id(&self) -> Option<Uuid> {
        self.inner.lock().visible
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Remove everything (background teardown). Callers must notify each
    /// returned request so no suspended page hangs.
    pub fn drain_all(&self) -> Vec<PendingRequest> {
        let mut inner = self.inner.lock();
        inner.visible = None;
        inner.queue.clear();
        inner.connect_by_origin.clear();
        inner.entries.drain().map(|(_, request)| request).collect()
    }
}
