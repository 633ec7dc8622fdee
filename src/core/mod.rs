pub mod config;
pub mod derivation;
pub mod domain;
pub mod errors;
pub mod validation;

pub use config::WalletConfig;
pub use domain::Chain;
pub use errors::WalletError;
