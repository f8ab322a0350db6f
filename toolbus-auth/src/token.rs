//! Signed-token issuance and verification (HS256).

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use toolbus_primitives::PrincipalId;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    exp: i64,
}

/// Issues signed tokens for a principal.
pub struct TokenSigner {
    key: EncodingKey,
}

impl TokenSigner {
    /// Creates a signer from the shared secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
        }
    }

    /// Issues a token for the supplied principal, valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Encoding`] when token serialization fails.
    pub fn issue(&self, principal: &PrincipalId, ttl: Duration) -> AuthResult<String> {
        let claims = Claims {
            sub: Some(principal.to_string()),
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key).map_err(|err| {
            AuthError::Encoding {
                reason: err.to_string(),
            }
        })
    }
}

/// Verifies signed tokens and extracts the subject principal.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Creates a verifier from the shared secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Zero leeway: an expired token is expired the moment its exp passes.
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verifies a token and returns its subject principal.
    ///
    /// # Errors
    ///
    /// Distinguishes three failure modes: [`AuthError::InvalidToken`] for
    /// syntactically or cryptographically invalid tokens,
    /// [`AuthError::ExpiredToken`] for structurally valid tokens past their
    /// expiry, and [`AuthError::MissingSubject`] for valid tokens with no
    /// usable subject claim.
    pub fn verify(&self, token: &str) -> AuthResult<PrincipalId> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => {
                    debug!(error = %err, "token verification failed");
                    AuthError::InvalidToken {
                        reason: err.to_string(),
                    }
                }
            }
        })?;

        let Some(subject) = data.claims.sub else {
            return Err(AuthError::MissingSubject);
        };

        PrincipalId::new(subject).map_err(|_| AuthError::MissingSubject)
    }
}
