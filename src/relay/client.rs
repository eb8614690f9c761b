//! HTTP relay client.
//!
//! # Responsibilities
//! - Map the six relay operations onto the v1 REST endpoints
//! - Classify failures: transport → unavailable, 5xx → server,
//!   4xx or undecodable body → client

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::RelayConfig;
use crate::domain::TransactionHash;
use crate::error::{NetworkError, WalletError, WalletResult};
use crate::observability::metrics;
use crate::relay::types::{
    EstimateTransactionRequest, EstimateTransactionResponse, GasPriceResponse,
    SafeCreationRequest, SafeCreationResponse, SafeFundedResponse, SubmitTransactionRequest,
    SubmitTransactionResponse, WireEstimateResponse, WireGasPrice, WireSafeCreationResponse,
};
use crate::relay::TransactionRelay;

#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    client: Client,
    base_url: url::Url,
}

impl HttpRelayClient {
    pub fn new(config: &RelayConfig) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WalletError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(&config.url, client)
    }

    pub fn with_client(base_url: &str, client: Client) -> WalletResult<Self> {
        let mut base_url: url::Url = base_url
            .parse()
            .map_err(|e| WalletError::Config(format!("Invalid relay URL '{}': {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, NetworkError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| NetworkError::Client(format!("invalid relay path '{}': {}", path, e)))?;
        Ok(self.client.request(method, url))
    }

    /// Send and return the raw body of a successful response.
    async fn send(&self, name: &'static str, request: RequestBuilder) -> Result<String, NetworkError> {
        let result = self.send_inner(request).await;
        metrics::record_remote_call("relay", name, result.is_ok());
        if let Err(e) = &result {
            tracing::warn!(method = name, error = %e, "Relay request failed");
        }
        result
    }

    async fn send_inner(&self, request: RequestBuilder) -> Result<String, NetworkError> {
        let resp = request.send().await.map_err(classify_transport_error)?;
        let status = resp.status();
        let text = resp.text().await.map_err(classify_transport_error)?;

        if status.is_server_error() {
            return Err(NetworkError::Server(format!("relay returned {}: {}", status, text)));
        }
        if !status.is_success() {
            return Err(NetworkError::Client(format!("relay returned {}: {}", status, text)));
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        name: &'static str,
        request: RequestBuilder,
    ) -> Result<T, NetworkError> {
        let text = self.send(name, request).await?;
        decode(&text)
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, NetworkError> {
    serde_json::from_str(text)
        .map_err(|e| NetworkError::Client(format!("unexpected relay response: {}", e)))
}

fn classify_transport_error(error: reqwest::Error) -> NetworkError {
    if error.is_decode() {
        NetworkError::Client(error.to_string())
    } else {
        NetworkError::Unavailable(error.to_string())
    }
}

#[async_trait]
impl TransactionRelay for HttpRelayClient {
    async fn create_safe_creation_transaction(
        &self,
        request: &SafeCreationRequest,
    ) -> Result<SafeCreationResponse, NetworkError> {
        let http = self.request(Method::POST, "api/v1/safes/")?.json(request);
        let wire: WireSafeCreationResponse = self.send_json("create_safe", http).await?;
        SafeCreationResponse::try_from(wire)
    }

    async fn start_safe_creation(&self, safe: Address) -> Result<(), NetworkError> {
        let http = self.request(Method::PUT, &format!("api/v1/safes/{}/funded/", safe))?;
        self.send("start_safe_creation", http).await.map(|_| ())
    }

    async fn safe_creation_transaction_hash(
        &self,
        safe: Address,
    ) -> Result<Option<TransactionHash>, NetworkError> {
        let http = self.request(Method::GET, &format!("api/v1/safes/{}/funded/", safe))?;
        let funded: SafeFundedResponse = self.send_json("safe_creation_hash", http).await?;
        Ok(funded.tx_hash)
    }

    async fn gas_price(&self) -> Result<GasPriceResponse, NetworkError> {
        let http = self.request(Method::GET, "api/v1/gas-station/")?;
        let wire: WireGasPrice = self.send_json("gas_price", http).await?;
        GasPriceResponse::try_from(wire)
    }

    async fn submit_transaction(
        &self,
        request: &SubmitTransactionRequest,
    ) -> Result<TransactionHash, NetworkError> {
        let path = format!("api/v1/safes/{}/transactions/", request.safe);
        let http = self.request(Method::POST, &path)?.json(request);
        let response: SubmitTransactionResponse = self.send_json("submit_transaction", http).await?;
        Ok(response.transaction_hash)
    }

    async fn estimate_transaction(
        &self,
        request: &EstimateTransactionRequest,
    ) -> Result<EstimateTransactionResponse, NetworkError> {
        let path = format!("api/v1/safes/{}/transactions/estimate/", request.safe);
        let http = self.request(Method::POST, &path)?.json(request);
        let wire: WireEstimateResponse = self.send_json("estimate_transaction", http).await?;
        EstimateTransactionResponse::try_from(wire)
    }
}
