//! HTTP token list client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::TokenListConfig;
use crate::error::{NetworkError, WalletError, WalletResult};
use crate::observability::metrics;
use crate::tokens::{TokenList, TokenListItem};

#[derive(Debug, Clone)]
pub struct HttpTokenListClient {
    client: Client,
    url: url::Url,
}

impl HttpTokenListClient {
    pub fn new(config: &TokenListConfig) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WalletError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(&config.url, client)
    }

    pub fn with_client(url: &str, client: Client) -> WalletResult<Self> {
        let url = url
            .parse()
            .map_err(|e| WalletError::Config(format!("Invalid token list URL '{}': {}", url, e)))?;
        Ok(Self { client, url })
    }

    async fn fetch(&self) -> Result<Vec<TokenListItem>, NetworkError> {
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| NetworkError::Unavailable(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| NetworkError::Unavailable(e.to_string()))?;

        if status.is_server_error() {
            return Err(NetworkError::Server(format!("token list returned {}: {}", status, text)));
        }
        if !status.is_success() {
            return Err(NetworkError::Client(format!("token list returned {}: {}", status, text)));
        }
        serde_json::from_str(&text)
            .map_err(|e| NetworkError::Client(format!("unexpected token list: {}", e)))
    }
}

#[async_trait]
impl TokenList for HttpTokenListClient {
    async fn items(&self) -> Result<Vec<TokenListItem>, NetworkError> {
        let result = self.fetch().await;
        metrics::record_remote_call("token_list", "items", result.is_ok());
        match &result {
            Ok(items) => tracing::debug!(count = items.len(), "Fetched token list"),
            Err(e) => tracing::warn!(error = %e, "Token list request failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_wire_format() {
        let body = r#"[
            {"address": "0x975be7f72cea31fd83d0cb2a197f9136f38696b7", "code": "GNO", "name": "Gnosis", "decimals": 18, "default": true},
            {"address": "0x6810e776880c02933d47db1b9fc05908e5386b96", "code": "RDN", "name": "Raiden", "decimals": 18}
        ]"#;
        let items: Vec<TokenListItem> = serde_json::from_str(body).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].default);
        assert!(!items[1].default);
        assert_eq!(items[1].token.code, "RDN");
    }
}
