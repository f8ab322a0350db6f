//! Shared error definitions for toolbus primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the primitive types.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided workflow identifier could not be parsed.
    #[error("invalid workflow id: {source}")]
    InvalidWorkflowId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Principal identifier failed validation.
    #[error("invalid principal id `{id}`: {reason}")]
    InvalidPrincipalId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
