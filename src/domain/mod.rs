//! Wallet domain model.
//!
//! # Data Flow
//! ```text
//! application layer → transaction.rs (draft, copy-with changes)
//!     → signatures.rs (verify + collect owner signatures)
//!     → relay submission → pending → success/failed
//! ```

pub mod ids;
pub mod signatures;
pub mod transaction;

pub use ids::{AccountId, BlockHash, TransactionHash, TransactionId, WalletId, ETHER_TOKEN};
pub use signatures::SignatureCollector;
pub use transaction::{
    FeeEstimate, Operation, Signature, Transaction, TransactionStatus, TransactionType,
};
