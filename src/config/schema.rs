//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Root configuration for the wallet core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Ethereum node JSON-RPC settings.
    pub node: NodeConfig,

    /// Transaction relay service settings.
    pub relay: RelayConfig,

    /// Token list service settings.
    pub token_list: TokenListConfig,

    /// Retry and background synchronisation settings.
    pub sync: SyncConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Safes whose balances are kept in sync.
    pub wallets: Vec<TrackedWallet>,
}

/// Ethereum node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID used for EIP-155 signatures (1 mainnet, 4 rinkeby).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 4,
            rpc_timeout_secs: 10,
        }
    }
}

/// Relay service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the relay, e.g. "https://safe-relay.rinkeby.gnosis.pm".
    pub url: String,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Token list service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenListConfig {
    /// URL serving the JSON token list.
    pub url: String,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TokenListConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Retry and synchronisation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// First delay between retry attempts in milliseconds.
    pub retry_interval_ms: u64,

    /// Cap for the growing retry delay in milliseconds.
    pub max_retry_delay_ms: u64,

    /// Interval of the pending transaction repeater in seconds.
    pub token_sync_interval_secs: u64,

    /// Attempts per pending transaction update round.
    pub token_sync_max_retries: u32,

    /// Attempts when waiting for one specific transaction.
    pub pending_poll_max_attempts: u32,
}

impl SyncConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn token_sync_interval(&self) -> Duration {
        Duration::from_secs(self.token_sync_interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 3_000,
            max_retry_delay_ms: 60_000,
            token_sync_interval_secs: 10,
            token_sync_max_retries: 3,
            pending_poll_max_attempts: 20,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A safe whose balances are synchronised in the background.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackedWallet {
    /// Stable wallet identifier.
    pub id: Uuid,

    /// Safe contract address.
    pub address: String,

    /// ERC-20 contract addresses to track besides ether.
    #[serde(default)]
    pub tokens: Vec<String>,
}
