//! Background synchronisation service.
//!
//! # Workers
//! ```text
//! sync()               token list loop ─┐ unbounded, until first success
//!                      balances loop   ─┘
//! sync_transactions()  repeater every token_sync_interval:
//!                        bounded update of pending transactions
//!                        → drop check on exhaustion
//!                        → bounded balance refresh
//! wait_for_transaction one-shot bounded poll
//! ```

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SyncConfig;
use crate::domain::{TransactionId, TransactionStatus};
use crate::error::{WalletError, WalletResult};
use crate::lifecycle::{Shutdown, StopSignal};
use crate::resilience::{run_until, Attempt, RetryOutcome, RetryPolicy};
use crate::sync::balances::AccountBalanceSync;
use crate::sync::pending::PendingTransactionSync;
use crate::tokens::{TokenList, TokenRegistry};

struct Repeater {
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl Repeater {
    fn is_running(&self) -> bool {
        !self.shutdown.is_triggered() && !self.handle.is_finished()
    }
}

pub struct SynchronisationService {
    config: SyncConfig,
    token_list: Arc<dyn TokenList>,
    registry: TokenRegistry,
    balances: Arc<AccountBalanceSync>,
    pending: Arc<PendingTransactionSync>,
    shutdown: Shutdown,
    repeater: Mutex<Option<Repeater>>,
}

impl SynchronisationService {
    pub fn new(
        config: SyncConfig,
        token_list: Arc<dyn TokenList>,
        registry: TokenRegistry,
        balances: Arc<AccountBalanceSync>,
        pending: Arc<PendingTransactionSync>,
    ) -> Self {
        Self {
            config,
            token_list,
            registry,
            balances,
            pending,
            shutdown: Shutdown::new(),
            repeater: Mutex::new(None),
        }
    }

    /// Refresh the token list and all balances, retrying without limit.
    ///
    /// Returns once both succeeded, or with `Cancelled` after `stop()`.
    pub async fn sync(&self) -> WalletResult<()> {
        let policy = RetryPolicy::from_config(&self.config, None);
        let mut token_stop = self.shutdown.subscribe();
        let mut balance_stop = self.shutdown.subscribe();

        let token_list = self.token_list.as_ref();
        let tokens = run_until("token_list", &policy, &mut token_stop, || async move {
            Ok(Attempt::Done(token_list.items().await?))
        });

        let balances = self.balances.as_ref();
        let guard = self.shutdown.subscribe();
        let guard = &guard;
        let accounts = run_until("account_balances", &policy, &mut balance_stop, || async move {
            balances.update_accounts_balances(guard).await?;
            Ok(Attempt::Done(()))
        });

        let (tokens, accounts) = tokio::join!(tokens, accounts);
        match (tokens?, accounts?) {
            (RetryOutcome::Done(items), RetryOutcome::Done(())) => {
                self.registry.merge(items);
                tracing::info!(tokens = self.registry.len(), "Synchronisation finished");
                Ok(())
            }
            _ => Err(WalletError::Cancelled),
        }
    }

    /// Start periodic pending-transaction updates. Does nothing if already
    /// running.
    pub fn sync_transactions(&self) {
        let mut slot = self.repeater.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(Repeater::is_running) {
            tracing::debug!("Transaction sync already running");
            return;
        }

        let shutdown = Shutdown::new();
        let repeater_stop = shutdown.subscribe();
        let config = self.config.clone();
        let pending = self.pending.clone();
        let balances = self.balances.clone();

        let handle = tokio::spawn(async move {
            transaction_sync_loop(config, pending, balances, repeater_stop).await;
        });

        tracing::info!(interval_secs = self.config.token_sync_interval_secs, "Transaction sync started");
        *slot = Some(Repeater { shutdown, handle });
    }

    /// Stop the repeater started by `sync_transactions`.
    pub fn stop_sync_transactions(&self) {
        let slot = self.repeater.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(repeater) = slot.as_ref() {
            repeater.shutdown.trigger();
            tracing::info!("Transaction sync stopped");
        }
    }

    pub fn is_syncing_transactions(&self) -> bool {
        let slot = self.repeater.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().is_some_and(Repeater::is_running)
    }

    /// Poll one transaction until it settles or `max_attempts` run out.
    pub async fn wait_for_transaction(
        &self,
        id: TransactionId,
        max_attempts: u32,
        stop: &mut StopSignal,
    ) -> WalletResult<RetryOutcome<TransactionStatus>> {
        self.pending.wait_for_transaction(id, max_attempts, stop).await
    }

    /// Cancel every worker owned by this service.
    ///
    /// The repeater has its own stop, so it is triggered explicitly.
    pub fn stop(&self) {
        self.stop_sync_transactions();
        self.shutdown.trigger();
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }
}

impl Drop for SynchronisationService {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn transaction_sync_loop(
    config: SyncConfig,
    pending: Arc<PendingTransactionSync>,
    balances: Arc<AccountBalanceSync>,
    mut repeater_stop: StopSignal,
) {
    let policy = RetryPolicy::from_config(&config, Some(config.token_sync_max_retries));
    let mut ticker = tokio::time::interval(config.token_sync_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = repeater_stop.stopped() => break,
        }

        let mut stop = repeater_stop.clone();
        let guard = stop.clone();
        let update = run_until("pending_transactions", &policy, &mut stop, || {
            let guard = guard.clone();
            let pending = pending.clone();
            async move {
                let still_pending = pending.update_pending_transactions(&guard).await?;
                Ok(Attempt::Done(still_pending))
            }
        })
        .await;

        match update {
            Ok(RetryOutcome::Done(still_pending)) => {
                tracing::debug!(still_pending, "Pending transactions updated");
            }
            Ok(RetryOutcome::Exhausted { attempts }) => {
                let failed = pending.fail_dropped_transactions(&guard).await;
                tracing::warn!(attempts, failed, "Pending transaction update gave up");
            }
            Ok(RetryOutcome::Cancelled) => break,
            Err(e) => tracing::error!(error = %e, "Pending transaction update failed"),
        }

        let refresh = run_until("account_balances", &policy, &mut stop, || {
            let balances = balances.clone();
            let guard = guard.clone();
            async move {
                balances.update_accounts_balances(&guard).await?;
                Ok(Attempt::Done(()))
            }
        })
        .await;
        match refresh {
            Ok(RetryOutcome::Cancelled) => break,
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Balance refresh failed"),
        }
    }

    tracing::debug!("Transaction sync loop exited");
}
