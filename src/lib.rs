//! pedals-wallet: browser-extension wallet core.
//!
//! Derives and custodies key material for Ethereum and Solana and mediates
//! signing requests between untrusted pages and the user's secret store.
//! Three isolation contexts talk through correlated message passing: the
//! page (`relay::PageProvider`), the content relay (`relay::RelayChannel`)
//! and the privileged background (`background::Background`), which owns the
//! vault, the origin grants and the approval state machine.

pub mod background;
pub mod blockchain;
pub mod core;
pub mod relay;
pub mod service;
pub mod storage;
pub mod vault;

pub use crate::background::{Background, Command, CommandReply};
pub use crate::core::errors::WalletError;
pub use crate::relay::{PageProvider, RelayChannel};
pub use crate::vault::SecretVault;

/// Install a tracing subscriber honoring `RUST_LOG`. For binaries and tests
/// embedding the background service; calling it twice is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
