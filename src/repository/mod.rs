//! Transaction persistence.
//!
//! The repository is the single place where a transaction's durable state
//! changes. Services read, update the owned value, then save it back.

pub mod memory;

use crate::domain::{Transaction, TransactionId};

pub use memory::InMemoryTransactionRepository;

pub trait TransactionRepository: Send + Sync {
    /// Insert or replace by id.
    fn save(&self, transaction: &Transaction);

    fn find_by_id(&self, id: TransactionId) -> Option<Transaction>;

    fn remove(&self, transaction: &Transaction);

    /// A fresh id not used by any stored transaction.
    fn next_id(&self) -> TransactionId;
}
