//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Key material and mnemonic words are never part of a log event
//! - Metric updates go through the `metrics` facade and are no-ops until a
//!   recorder is installed, so library code and tests record freely

pub mod logging;
pub mod metrics;
