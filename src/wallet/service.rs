//! Transaction lifecycle orchestration.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, I256};

use crate::crypto::{EthSignature, KeyService};
use crate::domain::{
    AccountId, FeeEstimate, Operation, SignatureCollector, Transaction, TransactionHash,
    TransactionId, TransactionStatus, TransactionType, WalletId,
};
use crate::error::{NetworkError, StateError, WalletResult};
use crate::node::{contracts, EthereumNode};
use crate::relay::{
    EstimateTransactionRequest, RelaySignature, SubmitTransactionRequest, TransactionRelay,
};
use crate::repository::TransactionRepository;
use crate::sync::PendingTransactionSync;

/// Field updates for a draft; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftChanges {
    pub recipient: Option<Address>,
    pub amount: Option<I256>,
    pub data: Option<Bytes>,
    pub operation: Option<Operation>,
}

pub struct WalletService {
    keys: Arc<KeyService>,
    relay: Arc<dyn TransactionRelay>,
    node: Arc<dyn EthereumNode>,
    repository: Arc<dyn TransactionRepository>,
    pending: Arc<PendingTransactionSync>,
}

impl WalletService {
    pub fn new(
        keys: Arc<KeyService>,
        relay: Arc<dyn TransactionRelay>,
        node: Arc<dyn EthereumNode>,
        repository: Arc<dyn TransactionRepository>,
        pending: Arc<PendingTransactionSync>,
    ) -> Self {
        Self {
            keys,
            relay,
            node,
            repository,
            pending,
        }
    }

    pub fn find(&self, id: TransactionId) -> WalletResult<Transaction> {
        Ok(self
            .repository
            .find_by_id(id)
            .ok_or(StateError::UnknownTransaction(id))?)
    }

    pub fn create_draft(
        &self,
        tx_type: TransactionType,
        wallet_id: WalletId,
        account_id: AccountId,
        safe: Address,
    ) -> WalletResult<TransactionId> {
        let id = self.repository.next_id();
        let tx = Transaction::new(id, tx_type, wallet_id, account_id).change_sender(safe)?;
        self.repository.save(&tx);
        tracing::info!(tx_id = %id, wallet_id = %wallet_id, tx_type = ?tx_type, "Draft created");
        Ok(id)
    }

    pub fn update_draft(&self, id: TransactionId, changes: DraftChanges) -> WalletResult<Transaction> {
        let mut tx = self.find(id)?;
        if let Some(recipient) = changes.recipient {
            tx = tx.change_recipient(recipient)?;
        }
        if let Some(amount) = changes.amount {
            tx = tx.change_amount(amount)?;
        }
        if let Some(data) = changes.data {
            tx = tx.change_data(data)?;
        }
        if let Some(operation) = changes.operation {
            tx = tx.change_operation(operation)?;
        }
        self.repository.save(&tx);
        Ok(tx)
    }

    /// Fetch the relay's fee quote and the safe's current nonce.
    pub async fn estimate(&self, id: TransactionId) -> WalletResult<FeeEstimate> {
        let tx = self.find(id)?;
        let safe = tx.sender().ok_or(StateError::MissingFields("sender"))?;
        let request = EstimateTransactionRequest::new(
            safe,
            tx.recipient().unwrap_or(Address::ZERO),
            tx.amount().unsigned_abs(),
            tx.data().clone(),
            tx.operation(),
        );

        let estimate: FeeEstimate = self.relay.estimate_transaction(&request).await?.into();
        let nonce = contracts::safe_nonce(self.node.as_ref(), safe).await?;

        // Re-read: the draft may have changed while the relay answered.
        let tx = self
            .find(id)?
            .change_fee_estimate(estimate)?
            .change_nonce(nonce.to_string())?;
        self.repository.save(&tx);
        tracing::info!(tx_id = %id, total_fee = %estimate.total(), nonce = %nonce, "Transaction estimated");
        Ok(estimate)
    }

    pub fn start_signing(&self, id: TransactionId) -> WalletResult<Transaction> {
        let tx = self.find(id)?.change_status(TransactionStatus::Signing)?;
        self.repository.save(&tx);
        Ok(tx)
    }

    /// Sign with a locally held owner key.
    pub fn sign_as_owner(&self, id: TransactionId, owner: Address) -> WalletResult<Transaction> {
        let tx = self.find(id)?;
        let collector = SignatureCollector::for_transaction(&tx)?;
        let signature = self.keys.sign(&tx.preimage()?, &owner)?;
        let tx = collector.add(tx, &signature, owner)?;
        self.repository.save(&tx);
        Ok(tx)
    }

    /// Add a signature produced elsewhere, e.g. by the browser extension.
    pub fn add_signature(
        &self,
        id: TransactionId,
        signature: &[u8],
        owner: Address,
    ) -> WalletResult<Transaction> {
        let tx = self.find(id)?;
        let collector = SignatureCollector::for_transaction(&tx)?;
        let tx = collector.add(tx, &EthSignature::from_bytes(signature)?, owner)?;
        self.repository.save(&tx);
        Ok(tx)
    }

    /// Send a fully signed transaction to the relay and start watching it.
    pub async fn submit(&self, id: TransactionId, threshold: usize) -> WalletResult<TransactionHash> {
        let tx = self.find(id)?;
        if tx.status() != TransactionStatus::Signing {
            return Err(StateError::IllegalTransition {
                from: tx.status(),
                to: TransactionStatus::Pending,
            }
            .into());
        }

        let collector = SignatureCollector::for_transaction(&tx)?;
        let have = collector.valid_signers(&tx).len();
        if have < threshold {
            return Err(StateError::ThresholdNotReached {
                have,
                need: threshold,
            }
            .into());
        }

        let request = submit_request(&tx, &collector)?;
        let hash = self.relay.submit_transaction(&request).await?;
        tracing::info!(tx_id = %id, hash = %hash, "Relay accepted transaction");

        let tx = self
            .repository
            .find_by_id(id)
            .filter(|stored| stored.status() == TransactionStatus::Signing)
            .and_then(|stored| stored.set_hash(hash).ok())
            .and_then(|stored| stored.change_status(TransactionStatus::Pending).ok())
            .ok_or_else(|| {
                tracing::error!(
                    tx_id = %id,
                    hash = %hash,
                    "Transaction changed while the relay was submitting it"
                );
                StateError::BroadcastNotRecorded { id, hash }
            })?;
        self.repository.save(&tx);
        self.pending.watch(id);
        tracing::info!(tx_id = %id, hash = %hash, signatures = have, "Transaction submitted");
        Ok(hash)
    }

    pub fn reject(&self, id: TransactionId) -> WalletResult<Transaction> {
        let tx = self.find(id)?.change_status(TransactionStatus::Rejected)?;
        self.repository.save(&tx);
        tracing::info!(tx_id = %id, "Transaction rejected");
        Ok(tx)
    }

    /// Abandon a draft or signing transaction and delete it.
    pub fn discard(&self, id: TransactionId) -> WalletResult<()> {
        let tx = self.find(id)?.change_status(TransactionStatus::Discarded)?;
        self.repository.remove(&tx);
        self.pending.unwatch(&id);
        tracing::info!(tx_id = %id, "Transaction discarded");
        Ok(())
    }
}

fn submit_request(
    tx: &Transaction,
    collector: &SignatureCollector,
) -> WalletResult<SubmitTransactionRequest> {
    let estimate = tx
        .fee_estimate()
        .ok_or(StateError::MissingFields("fee_estimate"))?;
    let signatures = collector
        .canonical_order(tx)
        .iter()
        .map(RelaySignature::try_from)
        .collect::<Result<Vec<_>, NetworkError>>()?;

    Ok(SubmitTransactionRequest {
        safe: tx.sender().ok_or(StateError::MissingFields("sender"))?,
        to: tx.recipient().unwrap_or(Address::ZERO),
        value: tx.amount().unsigned_abs().to_string(),
        data: tx.data().clone(),
        operation: tx.operation().as_u8(),
        signatures,
        safe_tx_gas: estimate.gas.to_string(),
        data_gas: estimate.data_gas.to_string(),
        gas_price: estimate.gas_price.to_string(),
        gas_token: estimate.gas_token,
        nonce: tx.parsed_nonce()?.to_string(),
    })
}
