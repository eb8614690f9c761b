//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs and addresses
//! - Validate value ranges (delays > 0 so retry loops cannot spin)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WalletConfig → Result<(), Vec<ValidationError>>

use alloy::primitives::Address;
use std::fmt;

use crate::config::schema::WalletConfig;
use crate::crypto::signature::MAX_EIP155_CHAIN_ID;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "node.rpc_url", &config.node.rpc_url);
    for (i, url) in config.node.failover_urls.iter().enumerate() {
        check_url(&mut errors, &format!("node.failover_urls[{}]", i), url);
    }
    check_url(&mut errors, "relay.url", &config.relay.url);
    check_url(&mut errors, "token_list.url", &config.token_list.url);

    if config.node.chain_id == 0 {
        errors.push(ValidationError::new("node.chain_id", "must be non-zero"));
    } else if config.node.chain_id > MAX_EIP155_CHAIN_ID {
        errors.push(ValidationError::new(
            "node.chain_id",
            format!("must be <= {}", MAX_EIP155_CHAIN_ID),
        ));
    }
    if config.node.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("node.rpc_timeout_secs", "must be > 0"));
    }
    if config.relay.timeout_secs == 0 {
        errors.push(ValidationError::new("relay.timeout_secs", "must be > 0"));
    }

    let sync = &config.sync;
    if sync.retry_interval_ms == 0 {
        errors.push(ValidationError::new("sync.retry_interval_ms", "must be > 0"));
    }
    if sync.max_retry_delay_ms < sync.retry_interval_ms {
        errors.push(ValidationError::new(
            "sync.max_retry_delay_ms",
            "must be >= sync.retry_interval_ms",
        ));
    }
    if sync.token_sync_interval_secs == 0 {
        errors.push(ValidationError::new("sync.token_sync_interval_secs", "must be > 0"));
    }
    if sync.token_sync_max_retries == 0 {
        errors.push(ValidationError::new("sync.token_sync_max_retries", "must be > 0"));
    }
    if sync.pending_poll_max_attempts == 0 {
        errors.push(ValidationError::new("sync.pending_poll_max_attempts", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    for (i, wallet) in config.wallets.iter().enumerate() {
        check_address(&mut errors, &format!("wallets[{}].address", i), &wallet.address);
        for (j, token) in wallet.tokens.iter().enumerate() {
            check_address(&mut errors, &format!("wallets[{}].tokens[{}]", i, j), token);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<Address>().is_err() {
        errors.push(ValidationError::new(field, "invalid address"));
    }
}
