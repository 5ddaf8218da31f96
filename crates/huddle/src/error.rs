//! Domain errors raised by the relay, the membership resolver and the
//! group/user services.

use thiserror::Error;

use crate::crypto::CryptoError;

/// Result type for domain operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors surfaced by chat operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed or missing input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The actor does not belong to the group, or the group does not exist.
    #[error("group not found")]
    NotMember,

    /// Referenced user or group does not exist (or the account was removed).
    #[error("{0} not found")]
    NotFound(String),

    /// The operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// History cursor is not a well-formed timestamp.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Login, password or key did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A public key could not be used.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The persistent store failed; the caller may retry.
    #[error("store unavailable: {0:#}")]
    StoreUnavailable(#[from] anyhow::Error),
}

impl ChatError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
