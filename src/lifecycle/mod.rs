//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → adapters → services → WalletCore
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every StopSignal observes stop → loops exit at next await
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Stop is level-triggered: a signal cloned after the trigger still sees it
//! - Repeaters own their own Shutdown so they can be stopped independently

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, StopSignal};
pub use startup::WalletCore;
