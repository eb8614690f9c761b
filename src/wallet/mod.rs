//! Wallet transaction lifecycle.
//!
//! # Data Flow
//! ```text
//! create_draft → update_draft → estimate (relay fees + safe nonce)
//!     → start_signing → sign_as_owner / add_signature (verified)
//!     → submit (canonical signature order) → pending sync
//! reject / discard end the lifecycle early
//! ```

pub mod service;

pub use service::{DraftChanges, WalletService};
