//! The transaction aggregate and its state machine.
//!
//! # States
//! ```text
//! Draft → Signing → Pending → Success
//!                           → Failed
//! Draft/Signing → Rejected   (explicit cancellation)
//! Draft/Signing → Discarded  (local abandonment)
//! ```
//!
//! # Design Decisions
//! - Every mutation consumes the value and returns the updated one, so a
//!   reader holding a clone never observes a half-applied change
//! - Re-applying the current status is a no-op, anything else off the graph
//!   is an `IllegalTransition`
//! - Terminal transactions reject all further mutation

use alloy::primitives::{keccak256, Address, Bytes, B256, I256, U256};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{AccountId, TransactionHash, TransactionId, WalletId};
use crate::error::StateError;
use crate::observability::metrics;

/// What a transaction does, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Transfer,
    ContractCall,
    WalletRecovery,
    ReplaceRecoveryPhrase,
    ConnectBrowserExtension,
    ReplaceBrowserExtension,
    DisconnectBrowserExtension,
}

/// Call type executed by the safe contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    Call,
    DelegateCall,
    Create,
}

impl Operation {
    /// On-chain `Enum.Operation` value.
    pub fn as_u8(&self) -> u8 {
        match self {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
            Operation::Create => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Draft,
    Signing,
    Pending,
    Success,
    Failed,
    Rejected,
    Discarded,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Success
                | TransactionStatus::Failed
                | TransactionStatus::Rejected
                | TransactionStatus::Discarded
        )
    }

    /// Edges of the transition graph (self-loops excluded).
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Draft, Signing)
                | (Signing, Pending)
                | (Pending, Success)
                | (Pending, Failed)
                | (Draft, Rejected)
                | (Signing, Rejected)
                | (Draft, Discarded)
                | (Signing, Discarded)
        )
    }

    /// Position along the lifecycle; terminal states share the last step.
    pub fn progress(&self) -> u8 {
        match self {
            TransactionStatus::Draft => 0,
            TransactionStatus::Signing => 1,
            TransactionStatus::Pending => 2,
            _ => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Draft => "draft",
            TransactionStatus::Signing => "signing",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Discarded => "discarded",
        }
    }
}

/// Relay quote for executing a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub gas: U256,
    pub data_gas: U256,
    pub gas_price: U256,
    /// Zero address when fees are paid in ether.
    pub gas_token: Address,
}

impl FeeEstimate {
    pub fn total(&self) -> U256 {
        self.gas
            .saturating_add(self.data_gas)
            .saturating_mul(self.gas_price)
    }
}

/// An owner signature over the transaction pre-image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Packed `r ‖ s ‖ v`.
    pub data: Bytes,
    pub address: Address,
}

/// One wallet transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    tx_type: TransactionType,
    wallet_id: WalletId,
    account_id: AccountId,
    amount: I256,
    fee: I256,
    fee_estimate: Option<FeeEstimate>,
    sender: Option<Address>,
    recipient: Option<Address>,
    data: Bytes,
    operation: Operation,
    nonce: Option<String>,
    signatures: Vec<Signature>,
    transaction_hash: Option<TransactionHash>,
    status: TransactionStatus,
}

impl Transaction {
    pub fn new(
        id: TransactionId,
        tx_type: TransactionType,
        wallet_id: WalletId,
        account_id: AccountId,
    ) -> Self {
        Self {
            id,
            tx_type,
            wallet_id,
            account_id,
            amount: I256::ZERO,
            fee: I256::ZERO,
            fee_estimate: None,
            sender: None,
            recipient: None,
            data: Bytes::new(),
            operation: Operation::Call,
            nonce: None,
            signatures: Vec::new(),
            transaction_hash: None,
            status: TransactionStatus::Draft,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn tx_type(&self) -> TransactionType {
        self.tx_type
    }

    pub fn wallet_id(&self) -> WalletId {
        self.wallet_id
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn amount(&self) -> I256 {
        self.amount
    }

    pub fn fee(&self) -> I256 {
        self.fee
    }

    pub fn fee_estimate(&self) -> Option<&FeeEstimate> {
        self.fee_estimate.as_ref()
    }

    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    pub fn recipient(&self) -> Option<Address> {
        self.recipient
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn transaction_hash(&self) -> Option<TransactionHash> {
        self.transaction_hash
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn change_amount(mut self, amount: I256) -> Result<Self, StateError> {
        self.ensure_editable("amount")?;
        self.amount = amount;
        Ok(self)
    }

    /// Book the fee. Fees are debits and must be non-positive.
    pub fn change_fee(mut self, fee: I256) -> Result<Self, StateError> {
        self.ensure_not_terminal()?;
        if fee.is_positive() {
            return Err(StateError::PositiveFee(fee.to_string()));
        }
        self.fee = fee;
        Ok(self)
    }

    pub fn change_fee_estimate(mut self, estimate: FeeEstimate) -> Result<Self, StateError> {
        self.ensure_editable("fee_estimate")?;
        self.fee_estimate = Some(estimate);
        Ok(self)
    }

    pub fn change_sender(mut self, sender: Address) -> Result<Self, StateError> {
        self.ensure_editable("sender")?;
        self.sender = Some(sender);
        Ok(self)
    }

    pub fn change_recipient(mut self, recipient: Address) -> Result<Self, StateError> {
        self.ensure_editable("recipient")?;
        self.recipient = Some(recipient);
        Ok(self)
    }

    pub fn change_data(mut self, data: Bytes) -> Result<Self, StateError> {
        self.ensure_editable("data")?;
        self.data = data;
        Ok(self)
    }

    pub fn change_operation(mut self, operation: Operation) -> Result<Self, StateError> {
        self.ensure_editable("operation")?;
        self.operation = operation;
        Ok(self)
    }

    pub fn change_nonce(mut self, nonce: impl Into<String>) -> Result<Self, StateError> {
        self.ensure_editable("nonce")?;
        self.nonce = Some(nonce.into());
        Ok(self)
    }

    /// Insert the signature, replacing any earlier one from the same address.
    ///
    /// Performs no cryptographic check; see `SignatureCollector`.
    pub fn add_signature(mut self, signature: Signature) -> Result<Self, StateError> {
        if !matches!(self.status, TransactionStatus::Draft | TransactionStatus::Signing) {
            return Err(StateError::FrozenField {
                field: "signatures",
                status: self.status,
            });
        }
        match self
            .signatures
            .iter_mut()
            .find(|s| s.address == signature.address)
        {
            Some(existing) => *existing = signature,
            None => self.signatures.push(signature),
        }
        Ok(self)
    }

    /// Set the broadcast hash. Setting the same hash again is a no-op.
    pub fn set_hash(mut self, hash: TransactionHash) -> Result<Self, StateError> {
        match self.transaction_hash {
            Some(existing) if existing == hash => Ok(self),
            Some(_) => Err(StateError::HashAlreadySet),
            None => {
                self.ensure_not_terminal()?;
                self.transaction_hash = Some(hash);
                Ok(self)
            }
        }
    }

    pub fn change_status(mut self, next: TransactionStatus) -> Result<Self, StateError> {
        if next == self.status {
            return Ok(self);
        }
        if !self.status.can_transition_to(next) {
            return Err(StateError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        match next {
            TransactionStatus::Signing => self.ensure_ready_for_signing()?,
            TransactionStatus::Pending if self.transaction_hash.is_none() => {
                return Err(StateError::MissingFields("transaction_hash"));
            }
            _ => {}
        }

        tracing::debug!(
            tx_id = %self.id,
            from = self.status.as_str(),
            to = next.as_str(),
            "Transaction status changed"
        );
        metrics::record_transition(next.as_str());
        self.status = next;
        Ok(self)
    }

    /// Packed pre-image the owners sign:
    /// `0x19 ‖ 0x00 ‖ safe ‖ to ‖ value ‖ data ‖ operation ‖ safeTxGas ‖
    /// dataGas ‖ gasPrice ‖ gasToken ‖ nonce`.
    pub fn preimage(&self) -> Result<Vec<u8>, StateError> {
        let safe = self.sender.ok_or(StateError::MissingFields("sender"))?;
        let to = self.recipient.ok_or(StateError::MissingFields("recipient"))?;
        let estimate = self
            .fee_estimate
            .ok_or(StateError::MissingFields("fee_estimate"))?;
        let nonce = self.parsed_nonce()?;
        let value = self.amount.unsigned_abs();

        let mut out = Vec::with_capacity(2 + 20 * 3 + 32 * 5 + 1 + self.data.len());
        out.extend_from_slice(&[0x19, 0x00]);
        out.extend_from_slice(safe.as_slice());
        out.extend_from_slice(to.as_slice());
        out.extend_from_slice(&value.to_be_bytes::<32>());
        out.extend_from_slice(&self.data);
        out.push(self.operation.as_u8());
        out.extend_from_slice(&estimate.gas.to_be_bytes::<32>());
        out.extend_from_slice(&estimate.data_gas.to_be_bytes::<32>());
        out.extend_from_slice(&estimate.gas_price.to_be_bytes::<32>());
        out.extend_from_slice(estimate.gas_token.as_slice());
        out.extend_from_slice(&nonce.to_be_bytes::<32>());
        Ok(out)
    }

    pub fn preimage_hash(&self) -> Result<B256, StateError> {
        Ok(keccak256(self.preimage()?))
    }

    pub fn parsed_nonce(&self) -> Result<U256, StateError> {
        let nonce = self
            .nonce
            .as_deref()
            .ok_or(StateError::MissingFields("nonce"))?;
        U256::from_str_radix(nonce, 10).map_err(|_| StateError::InvalidNonce(nonce.to_string()))
    }

    fn ensure_editable(&self, field: &'static str) -> Result<(), StateError> {
        if self.status != TransactionStatus::Draft {
            return Err(StateError::FrozenField {
                field,
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_not_terminal(&self) -> Result<(), StateError> {
        if self.status.is_terminal() {
            return Err(StateError::IllegalTransition {
                from: self.status,
                to: self.status,
            });
        }
        Ok(())
    }

    fn ensure_ready_for_signing(&self) -> Result<(), StateError> {
        if self.sender.is_none() {
            return Err(StateError::MissingFields("sender"));
        }
        if self.nonce.is_none() {
            return Err(StateError::MissingFields("nonce"));
        }
        if self.recipient.is_none() && self.data.is_empty() {
            return Err(StateError::MissingFields("recipient or data"));
        }
        Ok(())
    }
}
