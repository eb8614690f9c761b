//! Transaction relay access.
//!
//! # Data Flow
//! ```text
//! wallet / deployment / sync → TransactionRelay trait
//!     → client.rs (reqwest, status classification)
//!     → types.rs (lenient numeric decoding)
//!     → relay HTTP API v1
//! ```

pub mod client;
pub mod types;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::domain::TransactionHash;
use crate::error::NetworkError;

pub use client::HttpRelayClient;
pub use types::{
    EstimateTransactionRequest, EstimateTransactionResponse, GasPriceResponse, RelaySignature,
    SafeCreationRequest, SafeCreationResponse, SubmitTransactionRequest,
};

/// Service that deploys safes and executes signed safe transactions.
#[async_trait]
pub trait TransactionRelay: Send + Sync {
    /// Ask the relay to prepare a deployment transaction for a new safe.
    async fn create_safe_creation_transaction(
        &self,
        request: &SafeCreationRequest,
    ) -> Result<SafeCreationResponse, NetworkError>;

    /// Tell the relay the safe is funded and deployment may start.
    async fn start_safe_creation(&self, safe: Address) -> Result<(), NetworkError>;

    /// Deployment transaction hash, `None` until the relay has broadcast it.
    async fn safe_creation_transaction_hash(
        &self,
        safe: Address,
    ) -> Result<Option<TransactionHash>, NetworkError>;

    async fn gas_price(&self) -> Result<GasPriceResponse, NetworkError>;

    async fn submit_transaction(
        &self,
        request: &SubmitTransactionRequest,
    ) -> Result<TransactionHash, NetworkError>;

    async fn estimate_transaction(
        &self,
        request: &EstimateTransactionRequest,
    ) -> Result<EstimateTransactionResponse, NetworkError>;

    /// Whether the relay gave up on a submitted transaction.
    ///
    /// Relays without such a query never report drops.
    async fn is_transaction_dropped(&self, _hash: TransactionHash) -> Result<bool, NetworkError> {
        Ok(false)
    }
}
