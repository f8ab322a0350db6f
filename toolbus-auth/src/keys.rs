//! API key records and the process-local key store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use toolbus_primitives::PrincipalId;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Prefix carried by every generated key so operators can recognise and grep
/// for leaked credentials; it has no cryptographic meaning.
pub const API_KEY_PREFIX: &str = "tbk_";

/// One long-lived API key credential.
#[derive(Debug, Clone)]
pub struct ApiKey {
    key: String,
    principal: PrincipalId,
    label: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Returns the raw key string.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the owning principal.
    #[must_use]
    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Returns the human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns `true` when the key's expiry is at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Metadata describing a stored key. The raw key string is observable only
/// once, at generation time.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyMetadata {
    /// Human-readable label supplied at generation time.
    pub label: String,
    /// When the key was created.
    pub created_at: DateTime<Utc>,
    /// Optional expiry; `None` means the key does not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Process-local API key store.
///
/// Expired keys are purged lazily on first use past expiry; a key can sit
/// expired-but-present until the next validation attempt.
#[derive(Debug, Default)]
pub struct ApiKeyStore {
    inner: RwLock<HashMap<String, ApiKey>>,
}

impl ApiKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates and stores a new key for the supplied principal, returning
    /// the raw key string. This is the only time the raw key is observable.
    pub async fn generate(
        &self,
        principal: PrincipalId,
        label: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> String {
        let key = format!("{API_KEY_PREFIX}{}", Uuid::new_v4().simple());
        let label = label.into();
        let record = ApiKey {
            key: key.clone(),
            principal: principal.clone(),
            label: label.clone(),
            created_at: Utc::now(),
            expires_at,
        };

        self.inner.write().await.insert(key.clone(), record);
        info!(%principal, %label, "api key generated");
        key
    }

    /// Removes a key, returning `true` when it existed.
    pub async fn revoke(&self, key: &str) -> bool {
        let removed = self.inner.write().await.remove(key).is_some();
        if removed {
            info!("api key revoked");
        } else {
            debug!("revoke requested for unknown api key");
        }
        removed
    }

    /// Returns metadata for every key owned by the supplied principal.
    pub async fn list(&self, principal: &PrincipalId) -> Vec<ApiKeyMetadata> {
        self.inner
            .read()
            .await
            .values()
            .filter(|record| record.principal() == principal)
            .map(|record| ApiKeyMetadata {
                label: record.label.clone(),
                created_at: record.created_at,
                expires_at: record.expires_at,
            })
            .collect()
    }

    /// Resolves a raw key to its owning principal.
    ///
    /// Expiry is checked against wall-clock time at point of use; an expired
    /// key is removed from the store before the failure is reported.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidApiKey`] for unknown keys and
    /// [`AuthError::ExpiredApiKey`] for known keys past their expiry.
    pub async fn validate(&self, key: &str) -> AuthResult<PrincipalId> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.get(key) else {
            return Err(AuthError::InvalidApiKey);
        };

        if record.is_expired_at(Utc::now()) {
            let label = record.label.clone();
            inner.remove(key);
            warn!(%label, "expired api key purged on use");
            return Err(AuthError::ExpiredApiKey);
        }

        Ok(record.principal.clone())
    }
}
