//! Concurrent token registry.
//!
//! # Merge rules
//! - Listed tokens are inserted or have their metadata refreshed
//! - A token the user enabled keeps its status across merges
//! - Tokens that vanished from the list are dropped unless enabled

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::DashMap;

use crate::tokens::{Token, TokenListItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// Known, balance not shown.
    Regular,
    /// Balance tracked for every wallet.
    Enabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub token: Token,
    pub status: TokenStatus,
}

#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    inner: Arc<DashMap<Address, TokenEntry>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, items: Vec<TokenListItem>) {
        let listed: HashSet<Address> = items.iter().map(|i| i.token.address).collect();
        let mut added = 0usize;

        for item in items {
            match self.inner.get_mut(&item.token.address) {
                Some(mut entry) => entry.token = item.token,
                None => {
                    let status = if item.default {
                        TokenStatus::Enabled
                    } else {
                        TokenStatus::Regular
                    };
                    self.inner.insert(
                        item.token.address,
                        TokenEntry {
                            token: item.token,
                            status,
                        },
                    );
                    added += 1;
                }
            }
        }

        let before = self.inner.len();
        self.inner
            .retain(|address, entry| listed.contains(address) || entry.status == TokenStatus::Enabled);
        tracing::debug!(
            added,
            removed = before - self.inner.len(),
            total = self.inner.len(),
            "Merged token list"
        );
    }

    pub fn set_status(&self, address: &Address, status: TokenStatus) -> bool {
        match self.inner.get_mut(address) {
            Some(mut entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, address: &Address) -> Option<TokenEntry> {
        self.inner.get(address).map(|r| r.value().clone())
    }

    /// Addresses of tokens whose balances are tracked.
    pub fn enabled(&self) -> Vec<Address> {
        let mut enabled: Vec<Address> = self
            .inner
            .iter()
            .filter(|r| r.status == TokenStatus::Enabled)
            .map(|r| *r.key())
            .collect();
        enabled.sort();
        enabled
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
