//! Token metadata.
//!
//! # Data Flow
//! ```text
//! token list service → client.rs (GET /) → registry.rs (merge) → balance sync
//! ```

pub mod client;
pub mod registry;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

pub use client::HttpTokenListClient;
pub use registry::{TokenRegistry, TokenStatus};

/// An ERC-20 token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    /// Ticker, e.g. "GNO".
    pub code: String,
    pub name: String,
    pub decimals: u8,
}

/// One entry of the published token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenListItem {
    #[serde(flatten)]
    pub token: Token,
    /// Shown to new users without opting in.
    #[serde(default)]
    pub default: bool,
}

/// Source of the published token list.
#[async_trait]
pub trait TokenList: Send + Sync {
    async fn items(&self) -> Result<Vec<TokenListItem>, NetworkError>;
}
