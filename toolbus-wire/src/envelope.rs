//! JSON-RPC envelopes exchanged over the line-framed channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::ToolDescriptor;

/// JSON-RPC version tag carried by every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method name for listing the tool catalog.
pub const METHOD_TOOLS_LIST: &str = "tools/list";

/// Method name for invoking one tool.
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Notification method emitted by a worker once its serve loop is running.
pub const METHOD_READY: &str = "ready";

/// One outgoing JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// JSON-RPC version tag.
    pub jsonrpc: String,
    /// Correlation identifier, unique among outstanding requests.
    pub id: String,
    /// Method name to invoke.
    pub method: String,
    /// Optional parameters payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Builds a request for the supplied method and parameters.
    #[must_use]
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// One reply to a request. Exactly one of `result` and `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Correlation identifier of the request this reply answers.
    pub id: String,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Builds a success reply carrying the supplied result value.
    #[must_use]
    pub fn result(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Builds a failure reply carrying the supplied error message.
    #[must_use]
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(RpcError {
                message: message.into(),
            }),
        }
    }
}

/// Error payload of a failed reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Human-readable error message.
    pub message: String,
}

/// A method invocation without a correlation id; no reply is expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// JSON-RPC version tag.
    pub jsonrpc: String,
    /// Method name of the notification.
    pub method: String,
}

impl Notification {
    /// Builds a notification for the supplied method.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
        }
    }

    /// Builds the readiness notification a worker emits on startup.
    #[must_use]
    pub fn ready() -> Self {
        Self::new(METHOD_READY)
    }
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallParams {
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments forwarded to the tool handler.
    #[serde(default)]
    pub arguments: Value,
    /// Credential metadata attached to the call.
    #[serde(default, skip_serializing_if = "CallHeaders::is_empty")]
    pub headers: CallHeaders,
}

/// Header-like credential metadata carried on a call envelope.
///
/// At most one credential is honored per call; precedence is decided by the
/// auth layer, not by this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallHeaders {
    /// `Authorization` header value, expected to be a bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
    /// Raw API key.
    #[serde(rename = "x-api-key", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Session token.
    #[serde(
        rename = "x-session-token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_token: Option<String>,
}

impl CallHeaders {
    /// Builds headers carrying only an API key.
    #[must_use]
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Builds headers carrying only a bearer token.
    #[must_use]
    pub fn with_bearer(token: impl Into<String>) -> Self {
        Self {
            authorization: Some(format!("Bearer {}", token.into())),
            ..Self::default()
        }
    }

    /// Builds headers carrying only a session token.
    #[must_use]
    pub fn with_session_token(token: impl Into<String>) -> Self {
        Self {
            session_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Returns `true` when no credential is present on any channel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.authorization.is_none() && self.api_key.is_none() && self.session_token.is_none()
    }
}

/// Result payload of a `tools/list` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListResult {
    /// Descriptors of every registered tool, in registration order.
    pub tools: Vec<ToolDescriptor>,
}
