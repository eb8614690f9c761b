//! JSON-RPC node client with timeout and failover.
//!
//! # Responsibilities
//! - Connect to the primary and failover JSON-RPC endpoints
//! - Query balances, receipts and contract state
//! - Classify transport and RPC failures into `NetworkError`

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use async_trait::async_trait;
use tokio::time::timeout;

use crate::config::NodeConfig;
use crate::domain::TransactionHash;
use crate::error::{NetworkError, WalletError, WalletResult};
use crate::node::{EthereumNode, Receipt, ReceiptStatus};
use crate::observability::metrics;

/// JSON-RPC error codes that mean the request itself was wrong.
const CLIENT_RPC_CODES: std::ops::RangeInclusive<i64> = -32602..=-32600;

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Node client over one or more alloy HTTP providers.
#[derive(Clone)]
pub struct RpcNodeClient {
    /// Primary first, then failovers.
    providers: Vec<DynProvider>,
    rpc_url: String,
    timeout_duration: Duration,
}

impl RpcNodeClient {
    pub fn new(config: &NodeConfig) -> WalletResult<Self> {
        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            WalletError::Config(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let mut providers: Vec<DynProvider> =
            vec![Arc::new(ProviderBuilder::new().connect_http(primary_url))];

        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => providers.push(Arc::new(ProviderBuilder::new().connect_http(url))),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            failovers = providers.len() - 1,
            chain_id = config.chain_id,
            "Node client initialized"
        );

        Ok(Self {
            providers,
            rpc_url: config.rpc_url.clone(),
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
        })
    }

    /// Try each provider in order until one answers.
    ///
    /// Client errors are returned immediately; another endpoint would
    /// reject the same request.
    async fn with_failover<T, F, Fut>(&self, method: &'static str, f: F) -> Result<T, NetworkError>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut last_error = NetworkError::Unavailable("no RPC providers configured".into());

        for (i, provider) in self.providers.iter().enumerate() {
            let error = match timeout(self.timeout_duration, f(provider.clone())).await {
                Ok(Ok(result)) => {
                    metrics::record_remote_call("node", method, true);
                    return Ok(result);
                }
                Ok(Err(e)) => classify_rpc_error(&e),
                Err(_) => NetworkError::Unavailable(format!(
                    "{} timed out after {:?}",
                    method, self.timeout_duration
                )),
            };

            metrics::record_remote_call("node", method, false);
            tracing::warn!(provider_idx = i, method, error = %error, "RPC error, trying next provider");
            if matches!(error, NetworkError::Client(_)) {
                return Err(error);
            }
            last_error = error;
        }

        Err(last_error)
    }
}

#[async_trait]
impl EthereumNode for RpcNodeClient {
    async fn get_balance(&self, address: Address) -> Result<U256, NetworkError> {
        self.with_failover("eth_getBalance", |p| async move {
            p.get_balance(address).await
        })
        .await
    }

    async fn get_transaction_receipt(
        &self,
        hash: TransactionHash,
    ) -> Result<Option<Receipt>, NetworkError> {
        let receipt = self
            .with_failover("eth_getTransactionReceipt", |p| async move {
                p.get_transaction_receipt(hash.as_b256()).await
            })
            .await?;

        Ok(receipt.map(|r| Receipt {
            transaction_hash: TransactionHash(r.transaction_hash),
            block_number: r.block_number,
            status: if r.status() {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Failure
            },
        }))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, NetworkError> {
        self.with_failover("eth_call", |p| {
            let request = TransactionRequest::default()
                .to(to)
                .input(TransactionInput::new(data.clone()));
            async move { p.call(request).await }
        })
        .await
    }
}

impl std::fmt::Debug for RpcNodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcNodeClient")
            .field("rpc_url", &self.rpc_url)
            .field("providers", &self.providers.len())
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}

/// Map an alloy transport error onto the wallet taxonomy.
pub(crate) fn classify_rpc_error(error: &TransportError) -> NetworkError {
    match error {
        RpcError::ErrorResp(payload) if CLIENT_RPC_CODES.contains(&payload.code) => {
            NetworkError::Client(payload.to_string())
        }
        RpcError::ErrorResp(payload) => NetworkError::Server(payload.to_string()),
        RpcError::NullResp => NetworkError::Server("null response".into()),
        RpcError::SerError(e) => NetworkError::Client(e.to_string()),
        RpcError::DeserError { err, .. } => NetworkError::Client(err.to_string()),
        RpcError::Transport(TransportErrorKind::HttpError(http)) if http.status >= 500 => {
            NetworkError::Server(http.to_string())
        }
        RpcError::Transport(TransportErrorKind::HttpError(http)) => {
            NetworkError::Client(http.to_string())
        }
        RpcError::Transport(kind) => NetworkError::Unavailable(kind.to_string()),
        other => NetworkError::Client(other.to_string()),
    }
}
