//! Authenticated request dispatch.

use std::sync::Arc;

use serde_json::Value;
use toolbus_auth::{AuthContext, Authenticator};
use toolbus_primitives::PrincipalId;
use toolbus_wire::{
    CallParams, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, Request, Response, ToolDescriptor,
    ToolListResult, ToolResult,
};
use tracing::{debug, warn};

use crate::registry::ToolRegistry;

/// Context provided to tool handlers for one call.
#[derive(Debug, Clone)]
pub struct CallContext {
    auth: AuthContext,
}

impl CallContext {
    /// Builds a context from the authenticated caller.
    #[must_use]
    pub fn new(auth: AuthContext) -> Self {
        Self { auth }
    }

    /// Returns the authenticated caller.
    #[must_use]
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Returns the principal the call executes on behalf of.
    #[must_use]
    pub fn principal(&self) -> &PrincipalId {
        self.auth.principal()
    }
}

/// Routes incoming requests to registered tools after authentication.
///
/// Protocol failures (unknown tool, missing arguments, bad credentials) and
/// handler failures are all surfaced as successful replies whose payload is
/// an error [`ToolResult`]; the channel itself stays healthy.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    auth: Arc<Authenticator>,
}

impl Dispatcher {
    /// Creates a dispatcher over the supplied registry and authenticator.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, auth: Arc<Authenticator>) -> Self {
        Self { registry, auth }
    }

    /// Handles one decoded request, producing its reply.
    pub async fn handle(&self, request: Request) -> Response {
        match request.method.as_str() {
            METHOD_TOOLS_LIST => list_reply(request.id, self.registry.descriptors()),
            METHOD_TOOLS_CALL => self.handle_call(request).await,
            other => {
                warn!(method = other, "unknown method");
                Response::error(request.id, format!("unknown method `{other}`"))
            }
        }
    }

    async fn handle_call(&self, request: Request) -> Response {
        let params = match request.params {
            Some(params) => match serde_json::from_value::<CallParams>(params) {
                Ok(params) => params,
                Err(err) => {
                    return tool_error_reply(
                        request.id,
                        format!("invalid tools/call params: {err}"),
                    );
                }
            },
            None => return tool_error_reply(request.id, "missing tools/call params"),
        };

        // Authentication runs before any tool lookup; unauthenticated calls
        // never reach a handler.
        let ctx = match self.auth.authenticate(&params.headers).await {
            Ok(auth) => CallContext::new(auth),
            Err(err) => return tool_error_reply(request.id, err.to_string()),
        };

        let Some(handle) = self.registry.get(&params.name) else {
            debug!(tool = %params.name, "call to unregistered tool");
            return tool_error_reply(request.id, format!("Tool `{}` not found", params.name));
        };

        if let Err(missing) = check_required(handle.descriptor(), &params.arguments) {
            return tool_error_reply(
                request.id,
                format!(
                    "Missing required arguments for `{}`: {}",
                    params.name,
                    missing.join(", ")
                ),
            );
        }

        match handle.invoke(params.arguments, ctx).await {
            Ok(result) => result_reply(request.id, &result),
            Err(err) => {
                warn!(tool = %params.name, error = %err, "tool handler failed");
                tool_error_reply(request.id, err.to_string())
            }
        }
    }
}

/// Validates the declared required fields against the supplied arguments.
fn check_required(descriptor: &ToolDescriptor, arguments: &Value) -> Result<(), Vec<String>> {
    let missing: Vec<String> = descriptor
        .input_schema
        .required
        .iter()
        .filter(|field| {
            !arguments
                .get(field.as_str())
                .is_some_and(|value| !value.is_null())
        })
        .cloned()
        .collect();

    if missing.is_empty() { Ok(()) } else { Err(missing) }
}

fn list_reply(id: String, tools: Vec<ToolDescriptor>) -> Response {
    match serde_json::to_value(ToolListResult { tools }) {
        Ok(value) => Response::result(id, value),
        Err(err) => Response::error(id, format!("failed to encode tool catalog: {err}")),
    }
}

fn result_reply(id: String, result: &ToolResult) -> Response {
    match serde_json::to_value(result) {
        Ok(value) => Response::result(id, value),
        Err(err) => Response::error(id, format!("failed to encode tool result: {err}")),
    }
}

fn tool_error_reply(id: String, message: impl Into<String>) -> Response {
    result_reply(id, &ToolResult::error(message))
}
