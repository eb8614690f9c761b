//! Synchronisation with the node and relay.
//!
//! # Data Flow
//! ```text
//! service.rs (workers, repeater, stop)
//!     → pending.rs    (receipts → success / failed)
//!     → balances.rs   (ether + ERC-20 balances)
//!     → tokens::registry (token list merge)
//! deployment.rs       (relay safe creation, one per wallet)
//! ```
//!
//! # Design Decisions
//! - Workers are plain tokio tasks stopped through `StopSignal`
//! - All retries go through `resilience::run_until`

pub mod balances;
pub mod deployment;
pub mod pending;
pub mod service;

pub use balances::{AccountBalanceSync, BalanceBook, TrackedSafe};
pub use deployment::{DeployedSafe, SafeDeployment};
pub use pending::PendingTransactionSync;
pub use service::SynchronisationService;
