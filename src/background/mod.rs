//! The privileged background context: command protocol, origin grants and
//! the request/approval state machine.

pub mod authorizer;
pub mod broker;
pub mod command;
pub mod handler;
pub mod pending;
pub mod surface;

pub use authorizer::OriginAuthorizer;
pub use broker::ApprovalBroker;
pub use command::{Command, CommandReply};
pub use handler::{Background, WalletEvent};
pub use pending::{ApprovalOutcome, Decision, PendingRegistry, PendingSummary, RequestKind};
pub use surface::ApprovalSurface;
