//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every service from a validated `WalletConfig`
//! - Hand each service its collaborators explicitly
//!
//! # Design Decisions
//! - Fail fast: every config is validated, including ones built in code
//! - Components initialize in dependency order, adapters first

use std::sync::Arc;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, WalletConfig};
use crate::crypto::KeyService;
use crate::error::WalletResult;
use crate::node::{EthereumNode, RpcNodeClient};
use crate::relay::{HttpRelayClient, TransactionRelay};
use crate::repository::{InMemoryTransactionRepository, TransactionRepository};
use crate::resilience::RetryPolicy;
use crate::sync::{
    AccountBalanceSync, BalanceBook, PendingTransactionSync, SafeDeployment,
    SynchronisationService, TrackedSafe,
};
use crate::tokens::{HttpTokenListClient, TokenList, TokenRegistry};
use crate::wallet::WalletService;

/// Fully wired wallet core.
pub struct WalletCore {
    pub keys: Arc<KeyService>,
    pub node: Arc<dyn EthereumNode>,
    pub relay: Arc<dyn TransactionRelay>,
    pub repository: Arc<dyn TransactionRepository>,
    pub wallet: WalletService,
    pub deployment: SafeDeployment,
    pub sync: SynchronisationService,
    pub balances: BalanceBook,
}

impl WalletCore {
    /// Build against the HTTP node, relay and token list from `config`.
    pub fn from_config(config: &WalletConfig) -> WalletResult<Self> {
        let node: Arc<dyn EthereumNode> = Arc::new(RpcNodeClient::new(&config.node)?);
        let relay: Arc<dyn TransactionRelay> = Arc::new(HttpRelayClient::new(&config.relay)?);
        let token_list: Arc<dyn TokenList> = Arc::new(HttpTokenListClient::new(&config.token_list)?);
        let repository: Arc<dyn TransactionRepository> =
            Arc::new(InMemoryTransactionRepository::new());
        Self::with_adapters(config, node, relay, token_list, repository)
    }

    pub fn with_adapters(
        config: &WalletConfig,
        node: Arc<dyn EthereumNode>,
        relay: Arc<dyn TransactionRelay>,
        token_list: Arc<dyn TokenList>,
        repository: Arc<dyn TransactionRepository>,
    ) -> WalletResult<Self> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let keys = Arc::new(KeyService::new(Some(config.node.chain_id)));
        let registry = TokenRegistry::new();
        let book = BalanceBook::new();

        let balances = Arc::new(AccountBalanceSync::new(node.clone(), registry.clone(), book.clone()));
        for wallet in &config.wallets {
            balances.track(TrackedSafe::try_from(wallet)?);
        }

        let pending = Arc::new(PendingTransactionSync::new(
            repository.clone(),
            node.clone(),
            relay.clone(),
            RetryPolicy::from_config(&config.sync, Some(config.sync.pending_poll_max_attempts)),
        ));
        let wallet = WalletService::new(
            keys.clone(),
            relay.clone(),
            node.clone(),
            repository.clone(),
            pending.clone(),
        );
        let deployment = SafeDeployment::new(keys.clone(), relay.clone(), node.clone(), &config.sync);
        let sync = SynchronisationService::new(
            config.sync.clone(),
            token_list,
            registry,
            balances,
            pending,
        );

        tracing::info!(
            chain_id = config.node.chain_id,
            tracked_wallets = config.wallets.len(),
            "Wallet core initialized"
        );

        Ok(Self {
            keys,
            node,
            relay,
            repository,
            wallet,
            deployment,
            sync,
            balances: book,
        })
    }
}
