//! Error taxonomy for the wallet core.
//!
//! # Classification
//! ```text
//! network        → transient, retried by the sync engine
//! server         → surfaced, except inside unbounded sync loops
//! client         → surfaced immediately
//! cryptographic  → fatal to the current operation, never retried
//! state machine  → programming/logic error, surfaced immediately
//! timed out      → bounded poll exhausted, caller may try again later
//! ```

use alloy::primitives::Address;
use thiserror::Error;

use crate::domain::{TransactionHash, TransactionId, TransactionStatus, WalletId};

/// Failure reported by the node or relay transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// Transport-level failure: connection refused, DNS, timeout.
    #[error("Network unavailable: {0}")]
    Unavailable(String),

    /// The remote service failed to process a valid request.
    #[error("Server error: {0}")]
    Server(String),

    /// The request was rejected or the response was malformed.
    #[error("Client error: {0}")]
    Client(String),
}

/// Local cryptographic failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signature recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Signature mismatch: expected signer {expected}, recovered {recovered}")]
    SignatureMismatch { expected: Address, recovered: Address },

    #[error("Chain id {0} is too large for EIP-155 signatures")]
    UnsupportedChainId(u64),

    #[error("Secure random source unavailable: {0}")]
    EntropyUnavailable(String),
}

/// Transaction state machine and coordination failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Illegal transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Safe creation already in progress for wallet {0}")]
    AlreadyInProgress(WalletId),

    #[error("Transaction is missing required field: {0}")]
    MissingFields(&'static str),

    #[error("Field {field} cannot change while transaction is {status:?}")]
    FrozenField {
        field: &'static str,
        status: TransactionStatus,
    },

    #[error("Transaction hash is already set to a different value")]
    HashAlreadySet,

    #[error("Invalid nonce {0:?}")]
    InvalidNonce(String),

    #[error("Fee must be non-positive, got {0}")]
    PositiveFee(String),

    #[error("Not enough signatures: have {have}, need {need}")]
    ThresholdNotReached { have: usize, need: usize },

    #[error("Unknown transaction {0}")]
    UnknownTransaction(TransactionId),

    #[error("Transaction {id} was broadcast as {hash} but changed before the hash was recorded")]
    BroadcastNotRecorded {
        id: TransactionId,
        hash: TransactionHash,
    },
}

/// Top-level error for wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    State(#[from] StateError),

    /// The relay returned data that does not match what we derived offline.
    #[error("Relay reported {reported}, but {field} derived locally is {expected}")]
    RelayDishonest {
        field: &'static str,
        expected: String,
        reported: String,
    },

    /// A bounded poll ran out of attempts without reaching its goal.
    #[error("{operation} timed out after {attempts} attempts")]
    TimedOut {
        operation: &'static str,
        attempts: u32,
    },

    /// The safe deployment transaction was mined but reverted.
    #[error("Safe deployment transaction {0} reverted")]
    DeploymentReverted(TransactionHash),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation was abandoned through its stop signal.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse error classes used for retry decisions and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Server,
    Client,
    Cryptographic,
    StateMachine,
    RelayDishonest,
    TimedOut,
    Reverted,
    Config,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Client => "client",
            ErrorKind::Cryptographic => "cryptographic",
            ErrorKind::StateMachine => "state_machine",
            ErrorKind::RelayDishonest => "relay_dishonest",
            ErrorKind::TimedOut => "timed_out",
            ErrorKind::Reverted => "reverted",
            ErrorKind::Config => "config",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::Network(NetworkError::Unavailable(_)) => ErrorKind::Network,
            WalletError::Network(NetworkError::Server(_)) => ErrorKind::Server,
            WalletError::Network(NetworkError::Client(_)) => ErrorKind::Client,
            WalletError::Crypto(_) => ErrorKind::Cryptographic,
            WalletError::State(_) => ErrorKind::StateMachine,
            WalletError::RelayDishonest { .. } => ErrorKind::RelayDishonest,
            WalletError::TimedOut { .. } => ErrorKind::TimedOut,
            WalletError::DeploymentReverted(_) => ErrorKind::Reverted,
            WalletError::Config(_) => ErrorKind::Config,
            WalletError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether a retry loop should swallow this error and try again.
    ///
    /// Server errors only count as transient inside unbounded background loops.
    pub fn is_transient(&self, unbounded: bool) -> bool {
        match self.kind() {
            ErrorKind::Network => true,
            ErrorKind::Server => unbounded,
            _ => false,
        }
    }
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;
