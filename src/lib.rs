//! Multisig wallet core: owner keys, the transaction state machine,
//! signature collection, node and relay adapters, and background sync.

pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod node;
pub mod observability;
pub mod relay;
pub mod repository;
pub mod resilience;
pub mod sync;
pub mod tokens;
pub mod wallet;

pub use config::WalletConfig;
pub use error::{WalletError, WalletResult};
pub use lifecycle::{Shutdown, StopSignal, WalletCore};
