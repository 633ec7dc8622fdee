use async_trait::async_trait;
use uuid::Uuid;

use super::pending::PendingSummary;
use crate::core::errors::WalletError;

/// Whatever renders the user-facing approval prompt: the extension popup in
/// production, a channel-backed fake in tests. The broker guarantees at most
/// one open surface at a time and pairs every `open` with either a decision
/// command or a `close`.
///
/// Implementations must call
/// [`crate::background::ApprovalBroker::surface_closed`] when the prompt is
/// dismissed by any means other than the in-UI buttons (window manager close,
/// navigation, crash of the popup process), otherwise the suspended caller is
/// only released by the decision timeout.
#[async_trait]
pub trait ApprovalSurface: Send + Sync {
    /// Show the prompt for `request`. An error here means the prompt could
    /// not be displayed at all; the broker then resolves the request as
    /// rejected instead of leaving it waiting on a surface nobody sees.
    async fn open(&self, request: &PendingSummary) -> Result<(), WalletError>;

    /// Dismiss the prompt for `request_id` if it is still showing. Must be
    /// idempotent.
    async fn close(&self, request_id: Uuid);
}
