//! Identifier types for principals and workflows.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

const MAX_PRINCIPAL_LEN: usize = 128;

/// Identity a tool call executes on behalf of.
///
/// Principals originate outside the runtime (token subject claims, key
/// ownership records), so the identifier is an opaque validated string rather
/// than a UUID.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a principal identifier after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPrincipalId`] if the supplied identifier is
    /// empty, too long, or contains whitespace or control characters.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        validate_principal(&id)?;
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PrincipalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<PrincipalId> for String {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl FromStr for PrincipalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn validate_principal(id: &str) -> crate::Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidPrincipalId {
            id: String::new(),
            reason: "identifier cannot be empty".into(),
        });
    }

    if id.len() > MAX_PRINCIPAL_LEN {
        return Err(Error::InvalidPrincipalId {
            id: id.into(),
            reason: format!("identifier length must be <= {MAX_PRINCIPAL_LEN}"),
        });
    }

    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidPrincipalId {
            id: id.into(),
            reason: "identifier must not contain whitespace or control characters".into(),
        });
    }

    Ok(())
}

/// Unique identifier for one in-progress guided workflow.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    /// Generates a random workflow identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::random()
    }
}

impl Display for WorkflowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for WorkflowId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for WorkflowId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(Error::from)?;
        Ok(Self::from_uuid(uuid))
    }
}
