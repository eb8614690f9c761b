//! Ethereum node access.
//!
//! # Data Flow
//! ```text
//! sync / wallet services → EthereumNode trait
//!     → client.rs (alloy provider, failover, timeout)
//!     → JSON-RPC endpoint(s)
//! contracts.rs → ABI-encoded eth_call for ERC-20 and safe state
//! ```
//!
//! # Design Decisions
//! - Services depend on the trait, never on alloy providers directly
//! - Every failure is classified as unavailable, server or client

pub mod client;
pub mod contracts;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use crate::domain::TransactionHash;
use crate::error::NetworkError;

pub use client::RpcNodeClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failure,
}

/// A mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TransactionHash,
    pub block_number: Option<u64>,
    pub status: ReceiptStatus,
}

/// Read-only view of the chain.
#[async_trait]
pub trait EthereumNode: Send + Sync {
    /// Balance in wei.
    async fn get_balance(&self, address: Address) -> Result<U256, NetworkError>;

    /// `None` while the transaction is not mined.
    async fn get_transaction_receipt(
        &self,
        hash: TransactionHash,
    ) -> Result<Option<Receipt>, NetworkError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, NetworkError>;
}
