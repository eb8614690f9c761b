//! Secure key store.
//!
//! # Security
//! - Owned exclusively by the key service; never handed to other components
//! - Keys are never logged or serialized

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use dashmap::DashMap;

/// In-process store of signing keys indexed by their address.
#[derive(Default)]
pub struct SecureKeyStore {
    keys: DashMap<Address, PrivateKeySigner>,
}

impl SecureKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, signer: PrivateKeySigner) -> Address {
        let address = signer.address();
        self.keys.insert(address, signer);
        address
    }

    pub(crate) fn signer(&self, address: &Address) -> Option<PrivateKeySigner> {
        self.keys.get(address).map(|r| r.value().clone())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.keys.contains_key(address)
    }

    pub fn remove(&self, address: &Address) -> bool {
        self.keys.remove(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for SecureKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureKeyStore")
            .field("accounts", &self.keys.len())
            .field("keys", &"[REDACTED]")
            .finish()
    }
}
