//! The authenticated caller of one tool call.

use toolbus_primitives::PrincipalId;

/// Credential channel that authenticated a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Long-lived API key.
    ApiKey,
    /// Bearer token on the authorization header.
    Bearer,
    /// Session token header.
    Session,
}

/// Authenticated identity attached to one tool invocation.
///
/// Constructed per call by the [`Authenticator`](crate::Authenticator) and
/// passed into the handler invocation only; never persisted.
#[derive(Debug, Clone)]
pub struct AuthContext {
    principal: PrincipalId,
    method: AuthMethod,
    credential: String,
}

impl AuthContext {
    /// Builds a context for the supplied principal and credential channel.
    #[must_use]
    pub fn new(principal: PrincipalId, method: AuthMethod, credential: impl Into<String>) -> Self {
        Self {
            principal,
            method,
            credential: credential.into(),
        }
    }

    /// Returns the authenticated principal.
    #[must_use]
    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Returns the credential channel that authenticated the call.
    #[must_use]
    pub const fn method(&self) -> AuthMethod {
        self.method
    }

    /// Returns the raw credential for downstream checks.
    #[must_use]
    pub fn credential(&self) -> &str {
        &self.credential
    }
}
