//! Identifier types for strong typing.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Process-unique transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a wallet (one safe contract and its owners).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletId(pub Uuid);

impl WalletId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Token code used for the native currency.
pub const ETHER_TOKEN: &str = "ETH";

/// A token balance held by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId {
    /// `ETH` for ether, otherwise the token contract address.
    pub token: String,
    pub wallet_id: WalletId,
}

impl AccountId {
    pub fn new(token: impl Into<String>, wallet_id: WalletId) -> Self {
        Self {
            token: token.into(),
            wallet_id,
        }
    }

    pub fn ether(wallet_id: WalletId) -> Self {
        Self::new(ETHER_TOKEN, wallet_id)
    }

    pub fn is_ether(&self) -> bool {
        self.token == ETHER_TOKEN
    }

    /// Contract address of an ERC-20 account; `None` for ether.
    pub fn token_address(&self) -> Option<Address> {
        if self.is_ether() {
            return None;
        }
        self.token.parse().ok()
    }
}

macro_rules! hash_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub B256);

        impl $name {
            pub fn as_b256(&self) -> B256 {
                self.0
            }
        }

        impl From<B256> for $name {
            fn from(value: B256) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = alloy::hex::FromHexError;

            /// Accepts upper, lower or mixed case, with or without `0x`.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<B256>().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

hash_type!(
    /// Hash of a broadcast Ethereum transaction.
    TransactionHash
);

hash_type!(
    /// Hash of a mined block.
    BlockHash
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_equality_is_bytewise() {
        let lower: TransactionHash =
            "0x5d8e2b0e2a3d3c4f0f06d8d2ec0cb1fc2f0a4f1e1c5b9f64c23b38d7a9a1f0e2".parse().unwrap();
        let upper: TransactionHash =
            "0x5D8E2B0E2A3D3C4F0F06D8D2EC0CB1FC2F0A4F1E1C5B9F64C23B38D7A9A1F0E2".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(
            lower.to_string(),
            "0x5d8e2b0e2a3d3c4f0f06d8d2ec0cb1fc2f0a4f1e1c5b9f64c23b38d7a9a1f0e2"
        );
        assert!("0x1234".parse::<TransactionHash>().is_err());
    }

    #[test]
    fn test_account_id_token_address() {
        let wallet = WalletId::new();
        assert_eq!(AccountId::ether(wallet).token_address(), None);

        let token = AccountId::new("0x975be7f72cea31fd83d0cb2a197f9136f38696b7", wallet);
        assert!(!token.is_ether());
        assert!(token.token_address().is_some());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TransactionId::new(), TransactionId::new());
    }
}
