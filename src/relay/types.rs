//! Relay request and response types.
//!
//! The relay encodes big integers either as JSON numbers or as decimal
//! strings depending on the endpoint, so every numeric response field is
//! read through `Numeric`.

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::crypto::{CreationTransaction, EthSignature};
use crate::domain::{FeeEstimate, Operation, Signature, TransactionHash};
use crate::error::NetworkError;

/// Integer that may arrive as a JSON number or a (decimal or `0x`) string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Int(u64),
    Text(String),
}

impl Numeric {
    pub fn to_u256(&self, field: &str) -> Result<U256, NetworkError> {
        match self {
            Numeric::Int(n) => Ok(U256::from(*n)),
            Numeric::Text(s) => {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => U256::from_str_radix(hex, 16),
                    None => U256::from_str_radix(s, 10),
                };
                parsed.map_err(|_| {
                    NetworkError::Client(format!("field '{}' is not an integer: {:?}", field, s))
                })
            }
        }
    }

    pub fn to_u64(&self, field: &str) -> Result<u64, NetworkError> {
        let value = self.to_u256(field)?;
        u64::try_from(value)
            .map_err(|_| NetworkError::Client(format!("field '{}' out of range: {}", field, value)))
    }

    pub fn to_u128(&self, field: &str) -> Result<u128, NetworkError> {
        let value = self.to_u256(field)?;
        u128::try_from(value)
            .map_err(|_| NetworkError::Client(format!("field '{}' out of range: {}", field, value)))
    }
}

/// `{r, s, v}` as the relay sends and accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySignature {
    pub r: String,
    pub s: String,
    pub v: u64,
}

impl From<&EthSignature> for RelaySignature {
    fn from(sig: &EthSignature) -> Self {
        Self {
            r: sig.r.to_string(),
            s: sig.s.to_string(),
            v: sig.v,
        }
    }
}

impl TryFrom<&Signature> for RelaySignature {
    type Error = NetworkError;

    fn try_from(sig: &Signature) -> Result<Self, Self::Error> {
        let parsed = EthSignature::from_bytes(&sig.data)
            .map_err(|e| NetworkError::Client(format!("malformed owner signature: {}", e)))?;
        Ok(Self::from(&parsed))
    }
}

// ---- safe creation ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeCreationRequest {
    pub owners: Vec<Address>,
    pub threshold: usize,
    /// Decimal string of the client-chosen `s`.
    pub s: String,
}

impl SafeCreationRequest {
    pub fn new(owners: Vec<Address>, threshold: usize, random_s: U256) -> Self {
        Self {
            owners,
            threshold,
            s: random_s.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCreationSignature {
    r: Numeric,
    s: Numeric,
    v: Numeric,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCreationTx {
    from: Address,
    value: Numeric,
    #[serde(default)]
    data: Bytes,
    gas: Numeric,
    gas_price: Numeric,
    nonce: Numeric,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSafeCreationResponse {
    signature: WireCreationSignature,
    tx: WireCreationTx,
    safe: Address,
    payment: Numeric,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeCreationResponse {
    pub signature: EthSignature,
    pub tx: CreationTransaction,
    /// Address the relay claims the safe will be deployed at.
    pub safe: Address,
    /// Wei the safe must hold before deployment starts.
    pub payment: U256,
}

impl TryFrom<WireSafeCreationResponse> for SafeCreationResponse {
    type Error = NetworkError;

    fn try_from(wire: WireSafeCreationResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            signature: EthSignature {
                r: wire.signature.r.to_u256("signature.r")?,
                s: wire.signature.s.to_u256("signature.s")?,
                v: wire.signature.v.to_u64("signature.v")?,
            },
            tx: CreationTransaction {
                from: wire.tx.from,
                value: wire.tx.value.to_u256("tx.value")?,
                data: wire.tx.data,
                gas: wire.tx.gas.to_u64("tx.gas")?,
                gas_price: wire.tx.gas_price.to_u128("tx.gasPrice")?,
                nonce: wire.tx.nonce.to_u64("tx.nonce")?,
            },
            safe: wire.safe,
            payment: wire.payment.to_u256("payment")?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SafeFundedResponse {
    #[serde(default)]
    pub tx_hash: Option<TransactionHash>,
}

// ---- gas station ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireGasPrice {
    fast: Numeric,
    fastest: Numeric,
    standard: Numeric,
    safe_low: Numeric,
}

/// Gas prices in wei for the four speed tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPriceResponse {
    pub fast: U256,
    pub fastest: U256,
    pub standard: U256,
    pub safe_low: U256,
}

impl GasPriceResponse {
    /// Parse a gas-station body; every tier must be a positive integer.
    pub fn parse(body: &str) -> Result<Self, NetworkError> {
        let wire: WireGasPrice = serde_json::from_str(body)
            .map_err(|e| NetworkError::Client(format!("invalid gas price response: {}", e)))?;
        Self::try_from(wire)
    }
}

impl TryFrom<WireGasPrice> for GasPriceResponse {
    type Error = NetworkError;

    fn try_from(wire: WireGasPrice) -> Result<Self, Self::Error> {
        let positive = |value: &Numeric, field: &str| -> Result<U256, NetworkError> {
            let parsed = value.to_u256(field)?;
            if parsed.is_zero() {
                return Err(NetworkError::Client(format!("field '{}' must be positive", field)));
            }
            Ok(parsed)
        };
        Ok(Self {
            fast: positive(&wire.fast, "fast")?,
            fastest: positive(&wire.fastest, "fastest")?,
            standard: positive(&wire.standard, "standard")?,
            safe_low: positive(&wire.safe_low, "safeLow")?,
        })
    }
}

// ---- estimation ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EstimateTransactionRequest {
    #[serde(skip)]
    pub safe: Address,
    pub to: Address,
    /// Decimal wei amount.
    pub value: String,
    /// `0x`-prefixed call data, `0x` when empty.
    pub data: Bytes,
    pub operation: u8,
}

impl EstimateTransactionRequest {
    pub fn new(safe: Address, to: Address, value: U256, data: Bytes, operation: Operation) -> Self {
        Self {
            safe,
            to,
            value: value.to_string(),
            data,
            operation: operation.as_u8(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireEstimateResponse {
    safe_tx_gas: Numeric,
    data_gas: Numeric,
    gas_price: Numeric,
    #[serde(default)]
    gas_token: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateTransactionResponse {
    pub safe_tx_gas: U256,
    pub data_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
}

impl TryFrom<WireEstimateResponse> for EstimateTransactionResponse {
    type Error = NetworkError;

    fn try_from(wire: WireEstimateResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            safe_tx_gas: wire.safe_tx_gas.to_u256("safeTxGas")?,
            data_gas: wire.data_gas.to_u256("dataGas")?,
            gas_price: wire.gas_price.to_u256("gasPrice")?,
            gas_token: wire.gas_token.unwrap_or(Address::ZERO),
        })
    }
}

impl From<EstimateTransactionResponse> for FeeEstimate {
    fn from(estimate: EstimateTransactionResponse) -> Self {
        FeeEstimate {
            gas: estimate.safe_tx_gas,
            data_gas: estimate.data_gas,
            gas_price: estimate.gas_price,
            gas_token: estimate.gas_token,
        }
    }
}

// ---- submission ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionRequest {
    #[serde(skip)]
    pub safe: Address,
    pub to: Address,
    pub value: String,
    pub data: Bytes,
    pub operation: u8,
    /// Ascending by signer address.
    pub signatures: Vec<RelaySignature>,
    pub safe_tx_gas: String,
    pub data_gas: String,
    pub gas_price: String,
    pub gas_token: Address,
    pub nonce: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitTransactionResponse {
    pub transaction_hash: TransactionHash,
}
