//! Line framing: one compact JSON document per line, newline-terminated.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::envelope::{Request, Response};

/// Errors produced while encoding outgoing frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The message could not be serialized to JSON.
    #[error("frame serialization failed: {source}")]
    Serialize {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The serialized document contained a literal newline.
    #[error("frame would span multiple lines")]
    EmbeddedNewline,
}

/// Serializes a message as one compact JSON line with a trailing newline.
///
/// Compact JSON escapes newlines inside string values, so a serialized
/// document never spans lines; the check stays as a frame invariant.
///
/// # Errors
///
/// Returns [`CodecError`] when serialization fails or the document would
/// embed a literal newline.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, CodecError> {
    let mut line = serde_json::to_string(message)?;
    if line.contains('\n') {
        return Err(CodecError::EmbeddedNewline);
    }
    line.push('\n');
    Ok(line)
}

/// Classification of one complete incoming line.
#[derive(Debug)]
pub enum Incoming {
    /// A request carrying a correlation id; the peer expects a reply.
    Request(Request),
    /// A reply to a previously issued request.
    Reply(Response),
    /// A method invocation without a correlation id; no reply expected.
    Notification {
        /// Method name of the notification.
        method: String,
    },
    /// The line was not a JSON-RPC message; it must be dropped, not fatal.
    Malformed {
        /// Human-readable parse failure.
        error: String,
    },
}

/// Parses and classifies one line received from the channel.
#[must_use]
pub fn decode_line(line: &str) -> Incoming {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            return Incoming::Malformed {
                error: err.to_string(),
            };
        }
    };

    let Some(object) = value.as_object() else {
        return Incoming::Malformed {
            error: "frame is not a JSON object".to_owned(),
        };
    };

    if object.contains_key("id") {
        if object.contains_key("method") {
            return match serde_json::from_value::<Request>(value) {
                Ok(request) => Incoming::Request(request),
                Err(err) => Incoming::Malformed {
                    error: format!("invalid request frame: {err}"),
                },
            };
        }
        return match serde_json::from_value::<Response>(value) {
            Ok(response) => Incoming::Reply(response),
            Err(err) => Incoming::Malformed {
                error: format!("invalid reply frame: {err}"),
            },
        };
    }

    match object.get("method").and_then(Value::as_str) {
        Some(method) => Incoming::Notification {
            method: method.to_owned(),
        },
        None => Incoming::Malformed {
            error: "frame carries neither id nor method".to_owned(),
        },
    }
}
