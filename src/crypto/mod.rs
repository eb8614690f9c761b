//! Cryptographic key service.
//!
//! # Data Flow
//! ```text
//! OS entropy → BIP39 mnemonic → keys.rs (BIP44 derivation) → store.rs
//! payload → keccak256 → keys.rs (RFC6979 sign) → signature.rs (r, s, v)
//! relay creation signature → keys.rs (recover deployer) → contract address
//! ```

pub mod keys;
pub mod signature;
pub mod store;

pub use keys::{CreationTransaction, ExternallyOwnedAccount, KeyService};
pub use signature::{recover_address, EthSignature};
pub use store::SecureKeyStore;
