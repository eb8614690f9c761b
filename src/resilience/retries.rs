//! Retry-with-increasing-delay driver.
//!
//! # Responsibilities
//! - Run an action until it reports done, attempts run out, the deadline
//!   passes, or a stop is requested
//! - Treat transient errors as "not yet done"
//! - Abort on the first permanent error
//!
//! # Design Decisions
//! - `max_attempts = None` means unbounded; such loops also swallow server
//!   errors
//! - An in-flight action is allowed to finish, but its result is dropped if
//!   stop was requested meanwhile
//! - Exhaustion is an `Ok` outcome; callers decide whether to try later

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::error::WalletResult;
use crate::lifecycle::StopSignal;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Done(T),
    NotYet,
}

/// How a retry loop ended, unless a permanent error aborted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Done(T),
    Exhausted { attempts: u32 },
    Cancelled,
}

impl<T> RetryOutcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, RetryOutcome::Done(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub start_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
    /// Overall time budget measured from the first attempt.
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    pub fn bounded(start_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            start_delay,
            max_delay,
            max_attempts: Some(max_attempts),
            deadline: None,
        }
    }

    pub fn unbounded(start_delay: Duration, max_delay: Duration) -> Self {
        Self {
            start_delay,
            max_delay,
            max_attempts: None,
            deadline: None,
        }
    }

    pub fn from_config(config: &SyncConfig, max_attempts: Option<u32>) -> Self {
        Self {
            start_delay: config.retry_interval(),
            max_delay: config.max_retry_delay(),
            max_attempts,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none()
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.start_delay, self.max_delay)
    }
}

/// Drive `action` according to `policy`.
///
/// `operation` labels logs and metrics.
pub async fn run_until<T, F, Fut>(
    operation: &'static str,
    policy: &RetryPolicy,
    stop: &mut StopSignal,
    mut action: F,
) -> WalletResult<RetryOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = WalletResult<Attempt<T>>>,
{
    let started = Instant::now();
    let unbounded = policy.is_unbounded();
    let mut attempt: u32 = 0;

    loop {
        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            metrics::record_sync_attempt(operation, "exhausted");
            tracing::info!(operation, attempts = attempt, "Retry attempts exhausted");
            return Ok(RetryOutcome::Exhausted { attempts: attempt });
        }

        attempt = attempt.saturating_add(1);
        let delay = policy.delay_before(attempt);
        if let Some(deadline) = policy.deadline {
            if started.elapsed() + delay > deadline {
                metrics::record_sync_attempt(operation, "deadline");
                tracing::info!(operation, attempts = attempt - 1, "Retry deadline reached");
                return Ok(RetryOutcome::Exhausted {
                    attempts: attempt - 1,
                });
            }
        }

        if stop.is_stopped() {
            return Ok(cancelled(operation));
        }
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop.stopped() => return Ok(cancelled(operation)),
            }
        }

        let result = action().await;
        if stop.is_stopped() {
            return Ok(cancelled(operation));
        }

        match result {
            Ok(Attempt::Done(value)) => {
                metrics::record_sync_attempt(operation, "done");
                tracing::debug!(operation, attempt, "Retry loop finished");
                return Ok(RetryOutcome::Done(value));
            }
            Ok(Attempt::NotYet) => {
                metrics::record_sync_attempt(operation, "not_yet");
                tracing::trace!(operation, attempt, "Not done yet");
            }
            Err(e) if e.is_transient(unbounded) => {
                metrics::record_sync_attempt(operation, "transient_error");
                tracing::warn!(operation, attempt, error = %e, "Transient failure, will retry");
            }
            Err(e) => {
                metrics::record_sync_attempt(operation, "error");
                tracing::error!(operation, attempt, error = %e, kind = e.kind().as_str(), "Permanent failure");
                return Err(e);
            }
        }
    }
}

fn cancelled<T>(operation: &'static str) -> RetryOutcome<T> {
    metrics::record_sync_attempt(operation, "cancelled");
    tracing::debug!(operation, "Retry loop cancelled");
    RetryOutcome::Cancelled
}
