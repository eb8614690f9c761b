//! Pending transaction synchronisation.
//!
//! # Responsibilities
//! - Remember which transactions await a mined receipt
//! - Poll the node and move them to `success` or `failed`
//! - Fail transactions the relay reports dropped once polling gives up
//!
//! # Design Decisions
//! - Status writes for one transaction are serialised through a per-id
//!   entry lock, and the stored status is read again right before saving;
//!   a transaction that stopped being pending in between is left alone
//! - Only forward transitions are written; re-applying the current status
//!   does not touch the repository
//! - Nothing is written once the caller's stop signal has fired

use std::sync::Arc;

use alloy::primitives::I256;
use dashmap::{DashMap, DashSet};

use crate::domain::{TransactionId, TransactionStatus};
use crate::error::{StateError, WalletResult};
use crate::lifecycle::StopSignal;
use crate::node::{EthereumNode, ReceiptStatus};
use crate::observability::metrics;
use crate::relay::TransactionRelay;
use crate::repository::TransactionRepository;
use crate::resilience::{run_until, Attempt, RetryOutcome, RetryPolicy};

pub struct PendingTransactionSync {
    repository: Arc<dyn TransactionRepository>,
    node: Arc<dyn EthereumNode>,
    relay: Arc<dyn TransactionRelay>,
    watched: DashSet<TransactionId>,
    settling: DashMap<TransactionId, ()>,
    policy: RetryPolicy,
}

impl PendingTransactionSync {
    /// `policy` supplies the delays for one-shot waits; its attempt cap is
    /// replaced per call.
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        node: Arc<dyn EthereumNode>,
        relay: Arc<dyn TransactionRelay>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            repository,
            node,
            relay,
            watched: DashSet::new(),
            settling: DashMap::new(),
            policy,
        }
    }

    pub fn watch(&self, id: TransactionId) {
        if self.watched.insert(id) {
            tracing::debug!(tx_id = %id, "Watching pending transaction");
        }
        metrics::record_pending_transactions(self.watched.len());
    }

    pub fn unwatch(&self, id: &TransactionId) {
        self.watched.remove(id);
        metrics::record_pending_transactions(self.watched.len());
    }

    pub fn is_watched(&self, id: &TransactionId) -> bool {
        self.watched.contains(id)
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    /// Poll receipts for every watched transaction once.
    ///
    /// Returns how many are still pending. The first node error aborts the
    /// pass; transactions already updated stay updated.
    pub async fn update_pending_transactions(&self, stop: &StopSignal) -> WalletResult<usize> {
        let ids: Vec<TransactionId> = self.watched.iter().map(|id| *id).collect();
        let mut still_pending = 0usize;

        for id in ids {
            if stop.is_stopped() {
                break;
            }
            match self.poll_once(id, stop).await? {
                Some(status) if !status.is_terminal() => still_pending += 1,
                Some(_) => {}
                None => tracing::debug!(tx_id = %id, "Watched transaction no longer stored"),
            }
        }
        Ok(still_pending)
    }

    /// Poll one transaction until it leaves `pending` or attempts run out.
    pub async fn wait_for_transaction(
        &self,
        id: TransactionId,
        max_attempts: u32,
        stop: &mut StopSignal,
    ) -> WalletResult<RetryOutcome<TransactionStatus>> {
        let policy = RetryPolicy {
            max_attempts: Some(max_attempts),
            ..self.policy.clone()
        };
        let guard = stop.clone();

        let outcome = run_until("wait_for_transaction", &policy, stop, || {
            let guard = guard.clone();
            async move {
                match self.poll_once(id, &guard).await? {
                    None => Err(StateError::UnknownTransaction(id).into()),
                    Some(TransactionStatus::Pending) => Ok(Attempt::NotYet),
                    Some(status) if status.is_terminal() => Ok(Attempt::Done(status)),
                    Some(_) => Err(StateError::MissingFields("transaction_hash").into()),
                }
            }
        })
        .await?;

        match outcome {
            RetryOutcome::Exhausted { attempts } => {
                if self.fail_if_dropped(id, stop).await? {
                    Ok(RetryOutcome::Done(TransactionStatus::Failed))
                } else {
                    Ok(RetryOutcome::Exhausted { attempts })
                }
            }
            other => Ok(other),
        }
    }

    /// After a bounded update gave up, fail every watched transaction the
    /// relay reports dropped. Returns how many were failed.
    pub async fn fail_dropped_transactions(&self, stop: &StopSignal) -> usize {
        let ids: Vec<TransactionId> = self.watched.iter().map(|id| *id).collect();
        let mut failed = 0usize;
        for id in ids {
            match self.fail_if_dropped(id, stop).await {
                Ok(true) => failed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(tx_id = %id, error = %e, "Drop check failed"),
            }
        }
        failed
    }

    /// Current status after checking the node once; `None` if the
    /// transaction is gone.
    async fn poll_once(
        &self,
        id: TransactionId,
        stop: &StopSignal,
    ) -> WalletResult<Option<TransactionStatus>> {
        let Some(tx) = self.repository.find_by_id(id) else {
            self.unwatch(&id);
            return Ok(None);
        };

        if tx.status() != TransactionStatus::Pending {
            self.unwatch(&id);
            return Ok(Some(tx.status()));
        }
        let hash = tx
            .transaction_hash()
            .ok_or(StateError::MissingFields("transaction_hash"))?;

        match self.node.get_transaction_receipt(hash).await? {
            Some(receipt) => {
                let target = match receipt.status {
                    ReceiptStatus::Success => TransactionStatus::Success,
                    ReceiptStatus::Failure => TransactionStatus::Failed,
                };
                self.apply(id, target, stop).map(Some)
            }
            None => Ok(Some(TransactionStatus::Pending)),
        }
    }

    async fn fail_if_dropped(&self, id: TransactionId, stop: &StopSignal) -> WalletResult<bool> {
        let Some(tx) = self.repository.find_by_id(id) else {
            return Ok(false);
        };
        let (TransactionStatus::Pending, Some(hash)) = (tx.status(), tx.transaction_hash()) else {
            return Ok(false);
        };
        if !self.relay.is_transaction_dropped(hash).await? {
            return Ok(false);
        }
        tracing::warn!(tx_id = %id, hash = %hash, "Relay dropped transaction");
        let status = self.apply(id, TransactionStatus::Failed, stop)?;
        Ok(status == TransactionStatus::Failed)
    }

    /// Read-modify-write a forward transition to `target`.
    fn apply(
        &self,
        id: TransactionId,
        target: TransactionStatus,
        stop: &StopSignal,
    ) -> WalletResult<TransactionStatus> {
        let result = {
            let _settling = self.settling.entry(id).or_default();
            self.apply_locked(id, target, stop)
        };
        self.settling.remove(&id);
        result
    }

    fn apply_locked(
        &self,
        id: TransactionId,
        target: TransactionStatus,
        stop: &StopSignal,
    ) -> WalletResult<TransactionStatus> {
        let tx = self
            .repository
            .find_by_id(id)
            .ok_or(StateError::UnknownTransaction(id))?;

        if tx.status() == target || tx.status() != TransactionStatus::Pending {
            self.unwatch(&id);
            return Ok(tx.status());
        }
        if stop.is_stopped() {
            tracing::debug!(tx_id = %id, "Stop requested, discarding status update");
            return Ok(tx.status());
        }

        let mut tx = tx;
        if target == TransactionStatus::Success {
            if let Some(estimate) = tx.fee_estimate() {
                let total = I256::try_from(estimate.total()).unwrap_or(I256::MAX);
                tx = tx.change_fee(-total)?;
            }
        }
        let tx = tx.change_status(target)?;

        let current = self
            .repository
            .find_by_id(id)
            .ok_or(StateError::UnknownTransaction(id))?
            .status();
        if current != TransactionStatus::Pending {
            tracing::debug!(
                tx_id = %id,
                status = current.as_str(),
                "Transaction changed while settling, keeping stored status"
            );
            self.unwatch(&id);
            return Ok(current);
        }

        self.repository.save(&tx);
        self.unwatch(&id);

        tracing::info!(tx_id = %id, status = target.as_str(), "Pending transaction settled");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, FeeEstimate, Transaction, TransactionHash, TransactionType, WalletId};
    use crate::error::NetworkError;
    use crate::node::Receipt;
    use crate::relay::{
        EstimateTransactionRequest, EstimateTransactionResponse, GasPriceResponse,
        SafeCreationRequest, SafeCreationResponse, SubmitTransactionRequest,
    };
    use crate::repository::InMemoryTransactionRepository;
    use alloy::primitives::{Address, Bytes, B256, U256};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedNode {
        receipt: Mutex<Option<ReceiptStatus>>,
    }

    #[async_trait]
    impl EthereumNode for ScriptedNode {
        async fn get_balance(&self, _address: Address) -> Result<U256, NetworkError> {
            Ok(U256::ZERO)
        }

        async fn get_transaction_receipt(
            &self,
            hash: TransactionHash,
        ) -> Result<Option<Receipt>, NetworkError> {
            Ok(self.receipt.lock().unwrap().map(|status| Receipt {
                transaction_hash: hash,
                block_number: Some(1),
                status,
            }))
        }

        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, NetworkError> {
            Ok(Bytes::new())
        }
    }

    struct DroppingRelay;

    #[async_trait]
    impl TransactionRelay for DroppingRelay {
        async fn create_safe_creation_transaction(
            &self,
            _request: &SafeCreationRequest,
        ) -> Result<SafeCreationResponse, NetworkError> {
            Err(NetworkError::Client("unused".into()))
        }

        async fn start_safe_creation(&self, _safe: Address) -> Result<(), NetworkError> {
            Ok(())
        }

        async fn safe_creation_transaction_hash(
            &self,
            _safe: Address,
        ) -> Result<Option<TransactionHash>, NetworkError> {
            Ok(None)
        }

        async fn gas_price(&self) -> Result<GasPriceResponse, NetworkError> {
            Err(NetworkError::Client("unused".into()))
        }

        async fn submit_transaction(
            &self,
            _request: &SubmitTransactionRequest,
        ) -> Result<TransactionHash, NetworkError> {
            Err(NetworkError::Client("unused".into()))
        }

        async fn estimate_transaction(
            &self,
            _request: &EstimateTransactionRequest,
        ) -> Result<EstimateTransactionResponse, NetworkError> {
            Err(NetworkError::Client("unused".into()))
        }

        async fn is_transaction_dropped(&self, _hash: TransactionHash) -> Result<bool, NetworkError> {
            Ok(true)
        }
    }

    fn pending_transaction(repo: &InMemoryTransactionRepository) -> Transaction {
        let wallet_id = WalletId::new();
        let tx = Transaction::new(
            repo.next_id(),
            TransactionType::Transfer,
            wallet_id,
            AccountId::ether(wallet_id),
        )
        .change_sender(Address::repeat_byte(1))
        .unwrap()
        .change_recipient(Address::repeat_byte(2))
        .unwrap()
        .change_fee_estimate(FeeEstimate {
            gas: U256::from(10),
            data_gas: U256::from(10),
            gas_price: U256::from(3),
            gas_token: Address::ZERO,
        })
        .unwrap()
        .change_nonce("0")
        .unwrap()
        .change_status(TransactionStatus::Signing)
        .unwrap()
        .set_hash(TransactionHash(B256::repeat_byte(7)))
        .unwrap()
        .change_status(TransactionStatus::Pending)
        .unwrap();
        repo.save(&tx);
        tx
    }

    /// Writes `racing` into the store during the `trigger_on`-th read,
    /// after that read has already taken its copy.
    struct InterleavingRepository {
        inner: InMemoryTransactionRepository,
        reads: std::sync::atomic::AtomicUsize,
        trigger_on: usize,
        racing: Mutex<Option<Transaction>>,
        saves: std::sync::atomic::AtomicUsize,
    }

    impl TransactionRepository for InterleavingRepository {
        fn save(&self, transaction: &Transaction) {
            self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.save(transaction);
        }

        fn find_by_id(&self, id: TransactionId) -> Option<Transaction> {
            let found = self.inner.find_by_id(id);
            let read = self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if read == self.trigger_on {
                if let Some(racing) = self.racing.lock().unwrap().take() {
                    self.inner.save(&racing);
                }
            }
            found
        }

        fn remove(&self, transaction: &Transaction) {
            self.inner.remove(transaction);
        }

        fn next_id(&self) -> TransactionId {
            self.inner.next_id()
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::bounded(Duration::from_secs(1), Duration::from_secs(10), 1)
    }

    #[tokio::test]
    async fn test_success_receipt_settles_and_books_fee() {
        let repo = Arc::new(InMemoryTransactionRepository::new());
        let node = Arc::new(ScriptedNode::default());
        let sync = PendingTransactionSync::new(repo.clone(), node.clone(), Arc::new(DroppingRelay), policy());
        let tx = pending_transaction(&repo);
        sync.watch(tx.id());

        let stop = StopSignal::never();
        assert_eq!(sync.update_pending_transactions(&stop).await.unwrap(), 1);

        *node.receipt.lock().unwrap() = Some(ReceiptStatus::Success);
        assert_eq!(sync.update_pending_transactions(&stop).await.unwrap(), 0);

        let stored = repo.find_by_id(tx.id()).unwrap();
        assert_eq!(stored.status(), TransactionStatus::Success);
        assert_eq!(stored.fee(), I256::try_from(-60).unwrap());
        assert!(!sync.is_watched(&tx.id()));
    }

    #[tokio::test]
    async fn test_failure_receipt_marks_failed() {
        let repo = Arc::new(InMemoryTransactionRepository::new());
        let node = Arc::new(ScriptedNode::default());
        *node.receipt.lock().unwrap() = Some(ReceiptStatus::Failure);
        let sync = PendingTransactionSync::new(repo.clone(), node, Arc::new(DroppingRelay), policy());
        let tx = pending_transaction(&repo);

        let mut stop = StopSignal::never();
        let outcome = sync.wait_for_transaction(tx.id(), 3, &mut stop).await.unwrap();
        assert_eq!(outcome, RetryOutcome::Done(TransactionStatus::Failed));
        assert_eq!(repo.find_by_id(tx.id()).unwrap().fee(), I256::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_wait_fails_dropped_transaction() {
        let repo = Arc::new(InMemoryTransactionRepository::new());
        let sync = PendingTransactionSync::new(
            repo.clone(),
            Arc::new(ScriptedNode::default()),
            Arc::new(DroppingRelay),
            policy(),
        );
        let tx = pending_transaction(&repo);

        let mut stop = StopSignal::never();
        let outcome = sync.wait_for_transaction(tx.id(), 2, &mut stop).await.unwrap();
        assert_eq!(outcome, RetryOutcome::Done(TransactionStatus::Failed));
        assert_eq!(repo.find_by_id(tx.id()).unwrap().status(), TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_no_write_after_stop() {
        let repo = Arc::new(InMemoryTransactionRepository::new());
        let node = Arc::new(ScriptedNode::default());
        *node.receipt.lock().unwrap() = Some(ReceiptStatus::Success);
        let sync = PendingTransactionSync::new(repo.clone(), node, Arc::new(DroppingRelay), policy());
        let tx = pending_transaction(&repo);
        sync.watch(tx.id());

        let shutdown = crate::lifecycle::Shutdown::new();
        let stop = shutdown.subscribe();
        shutdown.trigger();
        sync.update_pending_transactions(&stop).await.unwrap();

        assert_eq!(repo.find_by_id(tx.id()).unwrap().status(), TransactionStatus::Pending);
        assert!(sync.is_watched(&tx.id()));
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_unwatched() {
        let repo = Arc::new(InMemoryTransactionRepository::new());
        let sync = PendingTransactionSync::new(
            repo,
            Arc::new(ScriptedNode::default()),
            Arc::new(DroppingRelay),
            policy(),
        );
        let id = TransactionId::new();
        sync.watch(id);
        assert_eq!(sync.update_pending_transactions(&StopSignal::never()).await.unwrap(), 0);
        assert_eq!(sync.watched_count(), 0);

        let err = sync
            .wait_for_transaction(id, 3, &mut StopSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::WalletError::State(StateError::UnknownTransaction(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_written_during_settle_is_not_overwritten() {
        let seed = InMemoryTransactionRepository::new();
        let tx = pending_transaction(&seed);
        let failed = tx.clone().change_status(TransactionStatus::Failed).unwrap();

        let repo = Arc::new(InterleavingRepository {
            inner: seed,
            reads: Default::default(),
            trigger_on: 2,
            racing: Mutex::new(Some(failed)),
            saves: Default::default(),
        });
        let node = Arc::new(ScriptedNode::default());
        *node.receipt.lock().unwrap() = Some(ReceiptStatus::Success);
        let sync = PendingTransactionSync::new(repo.clone(), node, Arc::new(DroppingRelay), policy());
        sync.watch(tx.id());

        assert_eq!(sync.update_pending_transactions(&StopSignal::never()).await.unwrap(), 0);

        let stored = repo.find_by_id(tx.id()).unwrap();
        assert_eq!(stored.status(), TransactionStatus::Failed);
        assert_eq!(stored.fee(), I256::ZERO);
        assert_eq!(repo.saves.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(!sync.is_watched(&tx.id()));
        assert!(sync.settling.is_empty());
    }
}
