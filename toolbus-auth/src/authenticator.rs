//! Credential resolution middleware run ahead of tool dispatch.

use std::sync::Arc;

use toolbus_wire::CallHeaders;
use tracing::debug;

use crate::context::{AuthContext, AuthMethod};
use crate::error::{AuthError, AuthResult};
use crate::keys::ApiKeyStore;
use crate::token::TokenVerifier;

const BEARER_SCHEME: &str = "Bearer ";

/// Resolves the credential channels on a call envelope into an
/// [`AuthContext`], or fails closed.
///
/// Precedence is fixed: API key, then bearer authorization, then session
/// token. Exactly one resolution path executes per call.
pub struct Authenticator {
    keys: Arc<ApiKeyStore>,
    tokens: TokenVerifier,
}

impl Authenticator {
    /// Creates an authenticator over the supplied key store and verifier.
    #[must_use]
    pub fn new(keys: Arc<ApiKeyStore>, tokens: TokenVerifier) -> Self {
        Self { keys, tokens }
    }

    /// Returns the API key store backing the key credential path.
    #[must_use]
    pub fn key_store(&self) -> &Arc<ApiKeyStore> {
        &self.keys
    }

    /// Resolves the call credentials to an authenticated principal.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredentials`] when no credential is
    /// present, or the failure of whichever single credential path ran.
    pub async fn authenticate(&self, headers: &CallHeaders) -> AuthResult<AuthContext> {
        if let Some(key) = &headers.api_key {
            let principal = self.keys.validate(key).await?;
            debug!(%principal, "call authenticated via api key");
            return Ok(AuthContext::new(principal, AuthMethod::ApiKey, key));
        }

        if let Some(value) = &headers.authorization {
            let Some(token) = value.strip_prefix(BEARER_SCHEME) else {
                return Err(AuthError::InvalidToken {
                    reason: "authorization header is not a bearer token".to_owned(),
                });
            };
            let principal = self.tokens.verify(token)?;
            debug!(%principal, "call authenticated via bearer token");
            return Ok(AuthContext::new(principal, AuthMethod::Bearer, token));
        }

        if let Some(token) = &headers.session_token {
            let principal = self.tokens.verify(token)?;
            debug!(%principal, "call authenticated via session token");
            return Ok(AuthContext::new(principal, AuthMethod::Session, token));
        }

        Err(AuthError::MissingCredentials)
    }
}
