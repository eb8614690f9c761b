//! Owner signature collection.
//!
//! # Responsibilities
//! - Verify each owner signature against the transaction pre-image
//! - Keep at most one signature per owner (newer replaces older)
//! - Produce the ascending-signer order the safe contract requires

use alloy::primitives::{Address, Bytes};

use crate::crypto::{recover_address, EthSignature};
use crate::domain::transaction::{Signature, Transaction};
use crate::error::{CryptoError, WalletResult};
use crate::observability::metrics;

/// Verifies and orders owner signatures for one transaction pre-image.
#[derive(Debug, Clone)]
pub struct SignatureCollector {
    preimage: Vec<u8>,
}

impl SignatureCollector {
    pub fn new(preimage: Vec<u8>) -> Self {
        Self { preimage }
    }

    pub fn for_transaction(tx: &Transaction) -> WalletResult<Self> {
        Ok(Self::new(tx.preimage()?))
    }

    /// Add or replace `owner`'s signature.
    ///
    /// A signature that does not recover to `owner` is rejected with
    /// `SignatureMismatch` and the transaction is returned untouched
    /// through the error path.
    pub fn add(
        &self,
        tx: Transaction,
        signature: &EthSignature,
        owner: Address,
    ) -> WalletResult<Transaction> {
        let recovered = recover_address(&self.preimage, signature).inspect_err(|_| {
            metrics::record_signature("unrecoverable");
        })?;
        if recovered != owner {
            metrics::record_signature("mismatch");
            tracing::warn!(
                tx_id = %tx.id(),
                expected = %owner,
                recovered = %recovered,
                "Rejected signature from wrong signer"
            );
            return Err(CryptoError::SignatureMismatch {
                expected: owner,
                recovered,
            }
            .into());
        }

        let tx = tx.add_signature(Signature {
            data: Bytes::copy_from_slice(&signature.to_bytes()?),
            address: owner,
        })?;
        metrics::record_signature("accepted");
        tracing::debug!(tx_id = %tx.id(), owner = %owner, "Signature accepted");
        Ok(tx)
    }

    /// Distinct owners whose stored signature verifies against the pre-image.
    pub fn valid_signers(&self, tx: &Transaction) -> Vec<Address> {
        let mut signers: Vec<Address> = tx
            .signatures()
            .iter()
            .filter(|s| self.verifies(s))
            .map(|s| s.address)
            .collect();
        signers.sort();
        signers.dedup();
        signers
    }

    pub fn is_complete(&self, tx: &Transaction, threshold: usize) -> bool {
        self.valid_signers(tx).len() >= threshold
    }

    /// Valid signatures sorted by ascending signer address bytes.
    pub fn canonical_order(&self, tx: &Transaction) -> Vec<Signature> {
        let mut ordered: Vec<Signature> = tx
            .signatures()
            .iter()
            .filter(|s| self.verifies(s))
            .cloned()
            .collect();
        ordered.sort_by(|a, b| a.address.cmp(&b.address));
        ordered.dedup_by(|a, b| a.address == b.address);
        ordered
    }

    fn verifies(&self, signature: &Signature) -> bool {
        EthSignature::from_bytes(&signature.data)
            .and_then(|sig| recover_address(&self.preimage, &sig))
            .map(|recovered| recovered == signature.address)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyService;
    use crate::domain::ids::{AccountId, TransactionId, WalletId};
    use crate::domain::transaction::{FeeEstimate, TransactionType};
    use crate::error::WalletError;
    use alloy::primitives::{address, I256, U256};

    // Anvil development keys #0..#2
    const OWNER_KEYS: [&str; 3] = [
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
        "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    ];

    fn setup() -> (KeyService, Vec<Address>, Transaction) {
        let keys = KeyService::new(Some(4));
        let owners = OWNER_KEYS
            .iter()
            .map(|k| keys.import_private_key(k).unwrap())
            .collect();

        let wallet_id = WalletId::new();
        let tx = Transaction::new(
            TransactionId::new(),
            TransactionType::Transfer,
            wallet_id,
            AccountId::ether(wallet_id),
        )
        .change_sender(address!("092cc1854399adc38dad4f846e369c40d0a40307"))
        .unwrap()
        .change_recipient(address!("70997970c51812dc3a010c7d01b50e0d17dc79c8"))
        .unwrap()
        .change_amount(I256::try_from(1_000).unwrap())
        .unwrap()
        .change_fee_estimate(FeeEstimate {
            gas: U256::from(50_000),
            data_gas: U256::from(10_000),
            gas_price: U256::from(1_000_000_000u64),
            gas_token: Address::ZERO,
        })
        .unwrap()
        .change_nonce("0")
        .unwrap();
        (keys, owners, tx)
    }

    #[test]
    fn test_threshold_two_of_three() {
        let (keys, owners, tx) = setup();
        let collector = SignatureCollector::for_transaction(&tx).unwrap();
        let preimage = tx.preimage().unwrap();

        let sig0 = keys.sign(&preimage, &owners[0]).unwrap();
        let tx = collector.add(tx, &sig0, owners[0]).unwrap();
        assert!(!collector.is_complete(&tx, 2));

        let sig1 = keys.sign(&preimage, &owners[1]).unwrap();
        let tx = collector.add(tx, &sig1, owners[1]).unwrap();
        assert!(collector.is_complete(&tx, 2));

        let sig2 = keys.sign(&preimage, &owners[2]).unwrap();
        let tx = collector.add(tx, &sig2, owners[2]).unwrap();
        assert!(collector.is_complete(&tx, 2));
        assert_eq!(tx.signatures().len(), 3);

        // A second signature from an existing owner replaces, not appends
        let tx = collector.add(tx, &sig1, owners[1]).unwrap();
        assert_eq!(tx.signatures().len(), 3);
        assert_eq!(collector.valid_signers(&tx).len(), 3);
    }

    #[test]
    fn test_mismatched_signature_rejected() {
        let (keys, owners, tx) = setup();
        let collector = SignatureCollector::for_transaction(&tx).unwrap();
        let preimage = tx.preimage().unwrap();

        let forged = keys.sign(&preimage, &owners[0]).unwrap();
        let err = collector.add(tx.clone(), &forged, owners[1]).unwrap_err();
        match err {
            WalletError::Crypto(CryptoError::SignatureMismatch { expected, recovered }) => {
                assert_eq!(expected, owners[1]);
                assert_eq!(recovered, owners[0]);
            }
            other => panic!("unexpected error {other:?}"),
        }

        // Signature over a different payload does not verify either
        let other_payload = keys.sign(b"something else", &owners[0]).unwrap();
        assert!(collector.add(tx, &other_payload, owners[0]).is_err());
    }

    #[test]
    fn test_canonical_order_is_ascending() {
        let (keys, owners, tx) = setup();
        let collector = SignatureCollector::for_transaction(&tx).unwrap();
        let preimage = tx.preimage().unwrap();

        // Insert in descending address order
        let mut by_address = owners.clone();
        by_address.sort();
        by_address.reverse();

        let mut tx = tx;
        for owner in &by_address {
            let sig = keys.sign(&preimage, owner).unwrap();
            tx = collector.add(tx, &sig, *owner).unwrap();
        }

        let ordered = collector.canonical_order(&tx);
        assert_eq!(ordered.len(), 3);
        for pair in ordered.windows(2) {
            assert!(pair[0].address < pair[1].address);
        }
    }

    #[test]
    fn test_stale_signatures_do_not_count() {
        let (keys, owners, tx) = setup();
        let preimage = tx.preimage().unwrap();
        let collector = SignatureCollector::for_transaction(&tx).unwrap();
        let sig = keys.sign(&preimage, &owners[0]).unwrap();
        let tx = collector.add(tx, &sig, owners[0]).unwrap();

        // Same transaction with a different nonce has a different pre-image
        let changed = tx.clone().change_nonce("1").unwrap();
        let new_collector = SignatureCollector::for_transaction(&changed).unwrap();
        assert!(!new_collector.is_complete(&changed, 1));
        assert!(new_collector.canonical_order(&changed).is_empty());
    }
}
