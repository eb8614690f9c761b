//! Key generation, derivation and signing.
//!
//! # Security
//! - Private keys live only in the [`SecureKeyStore`] and in
//!   [`ExternallyOwnedAccount`] values handed out by generation/derivation
//! - Keys and mnemonic words are never logged
//! - Signatures use RFC6979 deterministic nonces, so identical input from an
//!   identical key yields byte-identical output

use alloy::consensus::{SignableTransaction, TxLegacy};
use alloy::primitives::{keccak256, uint, Address, Bytes, TxKind, B256, U256};
use alloy::signers::local::coins_bip39::{English, Mnemonic};
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use alloy::signers::SignerSync;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::signature::{recover_address, EthSignature};
use crate::crypto::store::SecureKeyStore;
use crate::error::{CryptoError, WalletResult};

/// BIP44 path of the first Ethereum account.
pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Number of words in generated recovery phrases.
pub const MNEMONIC_WORD_COUNT: usize = 12;

/// Half of the secp256k1 group order; the relay only accepts low-s values.
const SECP256K1_HALF_N: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// A key pair plus the recovery phrase it was derived from, if any.
pub struct ExternallyOwnedAccount {
    signer: PrivateKeySigner,
    mnemonic: Option<String>,
}

impl ExternallyOwnedAccount {
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Recovery phrase words, for accounts derived from a mnemonic.
    pub fn mnemonic_words(&self) -> Option<Vec<&str>> {
        self.mnemonic.as_deref().map(|m| m.split_whitespace().collect())
    }

    /// Raw private key bytes, for export flows only.
    pub fn export_private_key(&self) -> B256 {
        self.signer.to_bytes()
    }
}

impl std::fmt::Debug for ExternallyOwnedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternallyOwnedAccount")
            .field("address", &self.address())
            .field("signer", &"[REDACTED]")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Raw fields of a contract creation transaction prepared by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationTransaction {
    pub from: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas: u64,
    pub gas_price: u128,
    pub nonce: u64,
}

/// Generates, derives and uses owner keys.
#[derive(Debug)]
pub struct KeyService {
    /// Chain id for EIP-155 `v` values; `None` signs with legacy 27/28.
    chain_id: Option<u64>,
    store: SecureKeyStore,
}

impl KeyService {
    pub fn new(chain_id: Option<u64>) -> Self {
        Self {
            chain_id,
            store: SecureKeyStore::new(),
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    /// Create a fresh recovery phrase and store the derived key.
    ///
    /// Entropy comes from the operating system; failing to obtain it is fatal.
    pub fn generate_account(&self) -> WalletResult<ExternallyOwnedAccount> {
        let mnemonic = Mnemonic::<English>::new_with_count(&mut OsRng, MNEMONIC_WORD_COUNT)
            .map_err(|e| CryptoError::EntropyUnavailable(e.to_string()))?;
        let account = Self::derive_account(&mnemonic.to_phrase())?;
        self.import_account(&account);

        tracing::info!(address = %account.address(), "Generated owner account");
        Ok(account)
    }

    /// Deterministically derive the account for a recovery phrase.
    ///
    /// Does not touch the key store; see [`KeyService::import_account`].
    pub fn derive_account(phrase: &str) -> Result<ExternallyOwnedAccount, CryptoError> {
        let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase.as_str())
            .derivation_path(DERIVATION_PATH)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid derivation path: {}", e)))?
            .build()
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid recovery phrase: {}", e)))?;

        Ok(ExternallyOwnedAccount {
            signer,
            mnemonic: Some(phrase),
        })
    }

    /// Load a hex-encoded private key (with or without `0x`) into the store.
    pub fn import_private_key(&self, private_key_hex: &str) -> Result<Address, CryptoError> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid private key format: {}", e)))?;
        Ok(self.store.insert(signer))
    }

    pub fn import_account(&self, account: &ExternallyOwnedAccount) -> Address {
        self.store.insert(account.signer.clone())
    }

    pub fn has_account(&self, address: &Address) -> bool {
        self.store.contains(address)
    }

    pub fn remove_account(&self, address: &Address) -> bool {
        let removed = self.store.remove(address);
        if removed {
            tracing::info!(address = %address, "Removed owner account");
        }
        removed
    }

    /// Sign `keccak256(payload)` with the stored key of `address`.
    pub fn sign(&self, payload: &[u8], address: &Address) -> Result<EthSignature, CryptoError> {
        let signer = self
            .store
            .signer(address)
            .ok_or_else(|| CryptoError::InvalidKey(format!("No key stored for {}", address)))?;
        self.sign_with(&signer, payload)
    }

    fn sign_with(&self, signer: &PrivateKeySigner, payload: &[u8]) -> Result<EthSignature, CryptoError> {
        let signature = signer
            .sign_hash_sync(&keccak256(payload))
            .map_err(|e| CryptoError::InvalidKey(format!("Signing failed: {}", e)))?;
        EthSignature::from_signature(&signature, self.chain_id)
    }

    pub fn recover_address(&self, payload: &[u8], signature: &EthSignature) -> Result<Address, CryptoError> {
        recover_address(payload, signature)
    }

    /// Derive the address of a contract deployed by a relay-signed creation
    /// transaction, without trusting the relay's own claim.
    ///
    /// The deployer is recovered from the signature over the unsigned legacy
    /// transaction, and must match `tx.from`; the contract address then
    /// follows the `keccak(rlp([sender, nonce]))` rule.
    pub fn contract_address(
        &self,
        signature: &EthSignature,
        tx: &CreationTransaction,
    ) -> Result<Address, CryptoError> {
        let unsigned = TxLegacy {
            chain_id: signature.chain_id(),
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas,
            to: TxKind::Create,
            value: tx.value,
            input: tx.data.clone(),
        };
        let sender = signature
            .to_signature()?
            .recover_address_from_prehash(&unsigned.signature_hash())
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;

        if sender != tx.from {
            return Err(CryptoError::RecoveryFailed(format!(
                "creation signature recovers to {}, transaction claims {}",
                sender, tx.from
            )));
        }
        Ok(sender.create(tx.nonce))
    }

    /// Random `s` value handed to the relay for a safe creation signature.
    pub fn ecdsa_random_s(&self) -> Result<U256, CryptoError> {
        loop {
            let mut bytes = [0u8; 32];
            OsRng
                .try_fill_bytes(&mut bytes)
                .map_err(|e| CryptoError::EntropyUnavailable(e.to_string()))?;
            let s = U256::from_be_bytes(bytes) % SECP256K1_HALF_N;
            if !s.is_zero() {
                return Ok(s);
            }
        }
    }
}
