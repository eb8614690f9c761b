//! Safe deployment through the relay.
//!
//! # Data Flow
//! ```text
//! random s → relay creation request
//!     → verify echoed s and offline contract address   (else RelayDishonest)
//!     → poll safe balance until it covers the payment
//!     → relay start → poll creation hash → poll receipt
//! ```
//!
//! # Design Decisions
//! - The safe address is never trusted before it is re-derived locally
//! - One deployment per wallet at a time; the guard is released on every
//!   exit path, including cancellation
//! - Waiting for funding is unbounded (a human sends the ether); the two
//!   relay/node polls are bounded

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use dashmap::DashSet;

use crate::config::SyncConfig;
use crate::crypto::KeyService;
use crate::domain::{TransactionHash, WalletId};
use crate::error::{StateError, WalletError, WalletResult};
use crate::lifecycle::StopSignal;
use crate::node::{EthereumNode, ReceiptStatus};
use crate::relay::{SafeCreationRequest, SafeCreationResponse, TransactionRelay};
use crate::resilience::{run_until, Attempt, RetryOutcome, RetryPolicy};

/// A deployed and mined safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedSafe {
    pub address: Address,
    pub transaction_hash: TransactionHash,
    pub payment: U256,
}

pub struct SafeDeployment {
    keys: Arc<KeyService>,
    relay: Arc<dyn TransactionRelay>,
    node: Arc<dyn EthereumNode>,
    funding_policy: RetryPolicy,
    poll_policy: RetryPolicy,
    in_progress: DashSet<WalletId>,
}

struct InProgressGuard<'a> {
    set: &'a DashSet<WalletId>,
    wallet_id: WalletId,
}

impl<'a> InProgressGuard<'a> {
    fn acquire(set: &'a DashSet<WalletId>, wallet_id: WalletId) -> Result<Self, StateError> {
        if !set.insert(wallet_id) {
            return Err(StateError::AlreadyInProgress(wallet_id));
        }
        Ok(Self { set, wallet_id })
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.wallet_id);
    }
}

impl SafeDeployment {
    pub fn new(
        keys: Arc<KeyService>,
        relay: Arc<dyn TransactionRelay>,
        node: Arc<dyn EthereumNode>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            keys,
            relay,
            node,
            funding_policy: RetryPolicy::from_config(config, None),
            poll_policy: RetryPolicy::from_config(config, Some(config.pending_poll_max_attempts)),
            in_progress: DashSet::new(),
        }
    }

    pub fn is_in_progress(&self, wallet_id: &WalletId) -> bool {
        self.in_progress.contains(wallet_id)
    }

    /// Deploy a safe for `owners` and wait until the deployment is mined.
    pub async fn deploy_safe(
        &self,
        wallet_id: WalletId,
        owners: Vec<Address>,
        threshold: usize,
        stop: &mut StopSignal,
    ) -> WalletResult<DeployedSafe> {
        let _guard = InProgressGuard::acquire(&self.in_progress, wallet_id)?;
        tracing::info!(wallet_id = %wallet_id, owners = owners.len(), threshold, "Starting safe deployment");

        let response = self.request_creation(owners, threshold).await?;
        let safe = response.safe;
        let payment = response.payment;

        self.wait_for_funding(safe, payment, stop).await?;

        self.relay.start_safe_creation(safe).await?;
        tracing::info!(safe = %safe, "Safe funded, deployment started");

        let relay = self.relay.as_ref();
        let transaction_hash = finish(
            "safe_creation_hash",
            run_until("safe_creation_hash", &self.poll_policy, stop, || async move {
                Ok(match relay.safe_creation_transaction_hash(safe).await? {
                    Some(hash) => Attempt::Done(hash),
                    None => Attempt::NotYet,
                })
            })
            .await?,
        )?;

        let node = self.node.as_ref();
        let receipt = finish(
            "safe_creation_receipt",
            run_until("safe_creation_receipt", &self.poll_policy, stop, || async move {
                Ok(match node.get_transaction_receipt(transaction_hash).await? {
                    Some(receipt) => Attempt::Done(receipt),
                    None => Attempt::NotYet,
                })
            })
            .await?,
        )?;

        if receipt.status == ReceiptStatus::Failure {
            tracing::error!(safe = %safe, hash = %transaction_hash, "Safe deployment reverted");
            return Err(WalletError::DeploymentReverted(transaction_hash));
        }

        tracing::info!(safe = %safe, hash = %transaction_hash, "Safe deployed");
        Ok(DeployedSafe {
            address: safe,
            transaction_hash,
            payment,
        })
    }

    /// Ask the relay for a creation transaction and check it independently.
    async fn request_creation(
        &self,
        owners: Vec<Address>,
        threshold: usize,
    ) -> WalletResult<SafeCreationResponse> {
        let random_s = self.keys.ecdsa_random_s()?;
        let request = SafeCreationRequest::new(owners, threshold, random_s);
        let response = self.relay.create_safe_creation_transaction(&request).await?;
        self.verify_creation(random_s, &response)?;
        Ok(response)
    }

    pub fn verify_creation(&self, random_s: U256, response: &SafeCreationResponse) -> WalletResult<()> {
        if response.signature.s != random_s {
            return Err(dishonest("s", random_s.to_string(), response.signature.s.to_string()));
        }
        let derived = self
            .keys
            .contract_address(&response.signature, &response.tx)
            .map_err(|e| dishonest("creation signature", response.tx.from.to_string(), e.to_string()))?;
        if derived != response.safe {
            return Err(dishonest("safe address", derived.to_string(), response.safe.to_string()));
        }
        tracing::debug!(safe = %derived, "Relay safe address verified");
        Ok(())
    }

    async fn wait_for_funding(
        &self,
        safe: Address,
        payment: U256,
        stop: &mut StopSignal,
    ) -> WalletResult<()> {
        tracing::info!(safe = %safe, payment = %payment, "Waiting for safe funding");
        let node = self.node.as_ref();
        finish(
            "safe_funding",
            run_until("safe_funding", &self.funding_policy, stop, || async move {
                let balance = node.get_balance(safe).await?;
                Ok(if balance >= payment {
                    Attempt::Done(())
                } else {
                    Attempt::NotYet
                })
            })
            .await?,
        )
    }
}

fn dishonest(field: &'static str, expected: String, reported: String) -> WalletError {
    tracing::error!(field, expected = %expected, reported = %reported, "Relay response failed verification");
    WalletError::RelayDishonest {
        field,
        expected,
        reported,
    }
}

fn finish<T>(operation: &'static str, outcome: RetryOutcome<T>) -> WalletResult<T> {
    match outcome {
        RetryOutcome::Done(value) => Ok(value),
        RetryOutcome::Exhausted { attempts } => Err(WalletError::TimedOut {
            operation,
            attempts,
        }),
        RetryOutcome::Cancelled => Err(WalletError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejects_second_acquire() {
        let set = DashSet::new();
        let wallet_id = WalletId::new();

        let guard = InProgressGuard::acquire(&set, wallet_id).unwrap();
        assert_eq!(
            InProgressGuard::acquire(&set, wallet_id).err(),
            Some(StateError::AlreadyInProgress(wallet_id))
        );
        // Other wallets are independent
        assert!(InProgressGuard::acquire(&set, WalletId::new()).is_ok());

        drop(guard);
        assert!(InProgressGuard::acquire(&set, wallet_id).is_ok());
    }

    #[test]
    fn test_finish_maps_outcomes() {
        assert_eq!(finish("op", RetryOutcome::Done(1)).unwrap(), 1);
        assert!(matches!(
            finish::<()>("op", RetryOutcome::Exhausted { attempts: 3 }),
            Err(WalletError::TimedOut { attempts: 3, .. })
        ));
        assert!(matches!(finish::<()>("op", RetryOutcome::Cancelled), Err(WalletError::Cancelled)));
    }
}
