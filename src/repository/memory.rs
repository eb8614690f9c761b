//! In-memory transaction store.

use std::sync::Arc;

use dashmap::DashMap;

use crate::domain::{Transaction, TransactionId};
use crate::repository::TransactionRepository;

/// A thread-safe transaction store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionRepository {
    inner: Arc<DashMap<TransactionId, Transaction>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl TransactionRepository for InMemoryTransactionRepository {
    fn save(&self, transaction: &Transaction) {
        self.inner.insert(transaction.id(), transaction.clone());
    }

    fn find_by_id(&self, id: TransactionId) -> Option<Transaction> {
        self.inner.get(&id).map(|r| r.value().clone())
    }

    fn remove(&self, transaction: &Transaction) {
        self.inner.remove(&transaction.id());
    }

    fn next_id(&self) -> TransactionId {
        loop {
            let id = TransactionId::new();
            if !self.inner.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, TransactionType, WalletId};

    fn transaction(repo: &InMemoryTransactionRepository) -> Transaction {
        let wallet_id = WalletId::new();
        Transaction::new(
            repo.next_id(),
            TransactionType::Transfer,
            wallet_id,
            AccountId::ether(wallet_id),
        )
    }

    #[test]
    fn test_save_find_remove() {
        let repo = InMemoryTransactionRepository::new();
        let tx = transaction(&repo);

        repo.save(&tx);
        assert_eq!(repo.find_by_id(tx.id()), Some(tx.clone()));

        let updated = tx.clone().change_nonce("7").unwrap();
        repo.save(&updated);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.find_by_id(tx.id()).unwrap().nonce(), Some("7"));

        repo.remove(&tx);
        assert!(repo.find_by_id(tx.id()).is_none());
        assert!(repo.is_empty());
    }
}
