//! ECDSA signature values and recovery.

use alloy::primitives::{keccak256, Address, Signature, U256};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Length of a packed `r ‖ s ‖ v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Largest chain id whose EIP-155 `v` still fits in a `u64`.
pub const MAX_EIP155_CHAIN_ID: u64 = (u64::MAX - 36) / 2;

/// A secp256k1 signature with an explicit Ethereum `v` value.
///
/// `v` is either `27/28` (legacy), `0/1` (raw parity) or EIP-155 encoded
/// (`parity + chain_id * 2 + 35`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthSignature {
    pub r: U256,
    pub s: U256,
    pub v: u64,
}

impl EthSignature {
    /// Encode a raw signature with the `v` convention of the given chain.
    pub fn from_signature(signature: &Signature, chain_id: Option<u64>) -> Result<Self, CryptoError> {
        let parity = signature.v() as u64;
        let v = match chain_id {
            Some(id) => id
                .checked_mul(2)
                .and_then(|v| v.checked_add(35 + parity))
                .ok_or(CryptoError::UnsupportedChainId(id))?,
            None => 27 + parity,
        };
        Ok(Self {
            r: signature.r(),
            s: signature.s(),
            v,
        })
    }

    /// Y-parity bit encoded in `v`.
    pub fn y_parity(&self) -> Result<bool, CryptoError> {
        match self.v {
            0 | 1 => Ok(self.v == 1),
            27 | 28 => Ok(self.v == 28),
            v if v >= 35 => Ok((v - 35) % 2 == 1),
            v => Err(CryptoError::RecoveryFailed(format!("invalid v value {}", v))),
        }
    }

    /// Chain id bound into an EIP-155 `v`, if any.
    pub fn chain_id(&self) -> Option<u64> {
        (self.v >= 35).then(|| (self.v - 35) / 2)
    }

    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        Ok(Signature::new(self.r, self.s, self.y_parity()?))
    }

    /// Pack as `r ‖ s ‖ v` with `v` normalized to 27/28.
    pub fn to_bytes(&self) -> Result<[u8; SIGNATURE_LENGTH], CryptoError> {
        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        out[32..64].copy_from_slice(&self.s.to_be_bytes::<32>());
        out[64] = 27 + self.y_parity()? as u8;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(CryptoError::RecoveryFailed(format!(
                "expected {} signature bytes, got {}",
                SIGNATURE_LENGTH,
                bytes.len()
            )));
        }
        Ok(Self {
            r: U256::from_be_slice(&bytes[..32]),
            s: U256::from_be_slice(&bytes[32..64]),
            v: bytes[64] as u64,
        })
    }
}

/// Recover the signer of `keccak256(payload)`.
pub fn recover_address(payload: &[u8], signature: &EthSignature) -> Result<Address, CryptoError> {
    signature
        .to_signature()?
        .recover_address_from_prehash(&keccak256(payload))
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}
