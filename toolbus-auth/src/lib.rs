//! Authentication for toolbus tool calls.
//!
//! Resolves the credential channels on an incoming call envelope into an
//! [`AuthContext`] ahead of dispatch, and manages the long-lived API key
//! store and signed-token verification backing that resolution.

#![warn(missing_docs, clippy::pedantic)]

mod authenticator;
mod context;
mod error;
mod keys;
mod token;

pub use authenticator::Authenticator;
pub use context::{AuthContext, AuthMethod};
pub use error::{AuthError, AuthResult};
pub use keys::{API_KEY_PREFIX, ApiKey, ApiKeyMetadata, ApiKeyStore};
pub use token::{TokenSigner, TokenVerifier};
