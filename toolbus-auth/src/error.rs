//! Authentication error taxonomy.
//!
//! Display strings are user-facing: they travel back to callers inside error
//! tool results, so each failure mode keeps a distinct message.

use thiserror::Error;

/// Result alias for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors produced while resolving call credentials.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was present on any channel.
    #[error("Authentication required")]
    MissingCredentials,

    /// The supplied API key is not in the store.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// The supplied API key exists but its expiry has passed.
    #[error("API key expired")]
    ExpiredApiKey,

    /// The supplied token failed syntactic or signature verification.
    #[error("Invalid token: {reason}")]
    InvalidToken {
        /// Human-readable verification failure.
        reason: String,
    },

    /// The supplied token is structurally valid but past its expiry.
    #[error("Token expired")]
    ExpiredToken,

    /// The supplied token verified but carries no subject claim.
    #[error("Token missing subject claim")]
    MissingSubject,

    /// Token issuance failed.
    #[error("token encoding failed: {reason}")]
    Encoding {
        /// Human-readable encoding failure.
        reason: String,
    },
}
