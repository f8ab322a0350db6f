//! Environment-driven worker configuration.

use tracing::warn;

const DEFAULT_DEV_SECRET: &str = "toolbus-dev-secret";

/// Configuration read from the environment at startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Shared secret used to verify bearer and session tokens.
    pub token_secret: String,
    /// Optional principal to mint a development API key for.
    pub dev_principal: Option<String>,
}

impl WorkerConfig {
    /// Reads `TOOLBUS_TOKEN_SECRET` and `TOOLBUS_DEV_PRINCIPAL` from the
    /// environment, falling back to the development secret when unset.
    pub fn from_env() -> Self {
        let token_secret = match std::env::var("TOOLBUS_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("TOOLBUS_TOKEN_SECRET not set, using the development secret");
                DEFAULT_DEV_SECRET.to_owned()
            }
        };

        let dev_principal = std::env::var("TOOLBUS_DEV_PRINCIPAL")
            .ok()
            .filter(|principal| !principal.is_empty());

        Self {
            token_secret,
            dev_principal,
        }
    }
}
