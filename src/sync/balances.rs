//! Account balance synchronisation.
//!
//! # Responsibilities
//! - Track which safes and tokens have balances worth refreshing
//! - Read ether balances with `eth_getBalance` and token balances with
//!   `balanceOf`
//! - Keep the latest value per account in a shared `BalanceBook`

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use futures_util::future::join_all;

use crate::config::TrackedWallet;
use crate::domain::{AccountId, WalletId};
use crate::error::{WalletError, WalletResult};
use crate::lifecycle::StopSignal;
use crate::node::{contracts, EthereumNode};
use crate::tokens::TokenRegistry;

/// A safe whose balances are synchronised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSafe {
    pub wallet_id: WalletId,
    pub address: Address,
    /// Tokens tracked for this safe only, besides the enabled registry tokens.
    pub tokens: Vec<Address>,
}

impl TryFrom<&TrackedWallet> for TrackedSafe {
    type Error = WalletError;

    fn try_from(wallet: &TrackedWallet) -> Result<Self, Self::Error> {
        let parse = |value: &str| {
            value
                .parse::<Address>()
                .map_err(|e| WalletError::Config(format!("invalid address '{}': {}", value, e)))
        };
        Ok(Self {
            wallet_id: WalletId(wallet.id),
            address: parse(&wallet.address)?,
            tokens: wallet
                .tokens
                .iter()
                .map(|t| parse(t))
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Latest known balance per account.
#[derive(Debug, Clone, Default)]
pub struct BalanceBook {
    inner: Arc<DashMap<AccountId, U256>>,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: &AccountId) -> Option<U256> {
        self.inner.get(account).map(|r| *r.value())
    }

    pub fn set(&self, account: AccountId, balance: U256) {
        self.inner.insert(account, balance);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

pub struct AccountBalanceSync {
    node: Arc<dyn EthereumNode>,
    registry: TokenRegistry,
    book: BalanceBook,
    safes: DashMap<WalletId, TrackedSafe>,
}

impl AccountBalanceSync {
    pub fn new(node: Arc<dyn EthereumNode>, registry: TokenRegistry, book: BalanceBook) -> Self {
        Self {
            node,
            registry,
            book,
            safes: DashMap::new(),
        }
    }

    pub fn track(&self, safe: TrackedSafe) {
        tracing::debug!(wallet_id = %safe.wallet_id, safe = %safe.address, "Tracking safe balances");
        self.safes.insert(safe.wallet_id, safe);
    }

    pub fn book(&self) -> &BalanceBook {
        &self.book
    }

    /// Refresh every tracked account.
    ///
    /// All accounts are queried even if some fail; successful balances are
    /// stored and the first failure is returned. Nothing is stored once
    /// `stop` has fired.
    pub async fn update_accounts_balances(&self, stop: &StopSignal) -> WalletResult<()> {
        let enabled = self.registry.enabled();
        let mut accounts = Vec::new();
        for safe in self.safes.iter() {
            accounts.push((AccountId::ether(safe.wallet_id), safe.address, None));
            let mut tokens: Vec<Address> = safe.tokens.iter().chain(&enabled).copied().collect();
            tokens.sort();
            tokens.dedup();
            for token in tokens {
                accounts.push((
                    AccountId::new(token.to_string(), safe.wallet_id),
                    safe.address,
                    Some(token),
                ));
            }
        }

        let node = self.node.as_ref();
        let results = join_all(accounts.into_iter().map(|(account, owner, token)| async move {
            let balance = match token {
                None => node.get_balance(owner).await,
                Some(token) => contracts::erc20_balance_of(node, token, owner).await,
            };
            (account, balance)
        }))
        .await;

        if stop.is_stopped() {
            tracing::debug!("Stop requested, discarding balances");
            return Ok(());
        }

        let mut first_error = None;
        let mut updated = 0usize;
        for (account, balance) in results {
            match balance {
                Ok(balance) => {
                    self.book.set(account, balance);
                    updated += 1;
                }
                Err(e) => {
                    tracing::warn!(token = %account.token, wallet_id = %account.wallet_id, error = %e, "Balance update failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        tracing::debug!(updated, "Account balances updated");

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionHash;
    use crate::error::NetworkError;
    use crate::node::Receipt;
    use crate::tokens::{Token, TokenListItem};
    use alloy::primitives::Bytes;
    use async_trait::async_trait;

    const GOOD_TOKEN: Address = Address::repeat_byte(0x70);
    const BAD_TOKEN: Address = Address::repeat_byte(0x66);

    struct StubNode;

    #[async_trait]
    impl EthereumNode for StubNode {
        async fn get_balance(&self, _address: Address) -> Result<U256, NetworkError> {
            Ok(U256::from(1_000))
        }

        async fn get_transaction_receipt(
            &self,
            _hash: TransactionHash,
        ) -> Result<Option<Receipt>, NetworkError> {
            Ok(None)
        }

        async fn call(&self, to: Address, _data: Bytes) -> Result<Bytes, NetworkError> {
            if to == BAD_TOKEN {
                return Err(NetworkError::Unavailable("reset".into()));
            }
            Ok(Bytes::from(U256::from(42).to_be_bytes::<32>().to_vec()))
        }
    }

    #[tokio::test]
    async fn test_updates_ether_and_tokens() {
        let registry = TokenRegistry::new();
        registry.merge(vec![TokenListItem {
            token: Token {
                address: GOOD_TOKEN,
                code: "GNO".into(),
                name: "Gnosis".into(),
                decimals: 18,
            },
            default: true,
        }]);
        let sync = AccountBalanceSync::new(Arc::new(StubNode), registry, BalanceBook::new());
        let wallet_id = WalletId::new();
        sync.track(TrackedSafe {
            wallet_id,
            address: Address::repeat_byte(0x01),
            tokens: vec![GOOD_TOKEN],
        });

        sync.update_accounts_balances(&StopSignal::never()).await.unwrap();

        let book = sync.book();
        assert_eq!(book.len(), 2);
        assert_eq!(book.balance(&AccountId::ether(wallet_id)), Some(U256::from(1_000)));
        assert_eq!(
            book.balance(&AccountId::new(GOOD_TOKEN.to_string(), wallet_id)),
            Some(U256::from(42))
        );
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes() {
        let sync = AccountBalanceSync::new(Arc::new(StubNode), TokenRegistry::new(), BalanceBook::new());
        let wallet_id = WalletId::new();
        sync.track(TrackedSafe {
            wallet_id,
            address: Address::repeat_byte(0x01),
            tokens: vec![BAD_TOKEN],
        });

        let err = sync.update_accounts_balances(&StopSignal::never()).await.unwrap_err();
        assert!(err.is_transient(false));
        assert_eq!(sync.book().balance(&AccountId::ether(wallet_id)), Some(U256::from(1_000)));
    }

    #[test]
    fn test_tracked_safe_from_config() {
        let wallet = TrackedWallet {
            id: uuid::Uuid::new_v4(),
            address: "0x092CC1854399ADc38Dad4f846E369C40D0a40307".into(),
            tokens: vec!["bogus".into()],
        };
        assert!(matches!(TrackedSafe::try_from(&wallet), Err(WalletError::Config(_))));
    }
}
