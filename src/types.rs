//! Shared error and result types for Wicket

use thiserror::Error;

/// Top-level error type for the gateway
#[derive(Error, Debug)]
pub enum WicketError {
    /// Configuration problems (missing secrets, bad listen address)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP layer errors (body read, malformed JSON)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Identity store errors (MongoDB or in-memory)
    #[error("Database error: {0}")]
    Database(String),

    /// Authentication and token errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Wallet crypto errors (bad key material, hex decoding)
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The key pool has no unassigned account left. Recoverable: the
    /// caller should surface this as an operational failure, not an
    /// authentication rejection.
    #[error("No available accounts in the key pool")]
    NoAvailableAccounts,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, WicketError>;
