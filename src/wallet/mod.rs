//! Wallet-style cryptography
//!
//! secp256k1 key derivation and Ethereum personal-message signature
//! recovery. Everything in this module is pure: no clocks, no state,
//! no I/O.

pub mod keys;
pub mod signature;

pub use keys::{derive_address, derive_did, derive_public_key, is_valid_address, DID_KEY_PREFIX};
pub use signature::{hash_personal_message, recover_address, verify_personal_sign};
