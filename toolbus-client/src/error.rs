//! Client error taxonomy.

use thiserror::Error;
use toolbus_wire::CodecError;

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the process client and its connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The worker process could not be spawned or wired up.
    #[error("failed to start worker: {reason}")]
    Spawn {
        /// Human-readable spawn failure.
        reason: String,
    },

    /// No worker is connected; `connect()` must run first.
    #[error("worker is not connected")]
    NotConnected,

    /// The channel closed with the request still outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer answered with an error reply.
    #[error("{message}")]
    Rpc {
        /// Error message reported by the peer.
        message: String,
    },

    /// A reply arrived but its payload did not have the expected shape.
    #[error("unexpected reply payload: {reason}")]
    Protocol {
        /// Human-readable parse failure.
        reason: String,
    },

    /// An outgoing frame could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
