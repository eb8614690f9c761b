//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Poll / sync operation:
//!     → retries.rs (attempt, classify error, decide to continue)
//!     → backoff.rs (delay before the next attempt)
//!     → StopSignal (abandon at the next suspension point)
//! ```
//!
//! # Design Decisions
//! - The first attempt runs immediately; every later attempt waits
//! - Delays never drop below the configured start delay, so no busy loop
//! - Transient errors count as "not yet done"; everything else aborts

pub mod backoff;
pub mod retries;

pub use backoff::{calculate_backoff, MIN_RETRY_DELAY};
pub use retries::{run_until, Attempt, RetryOutcome, RetryPolicy};
