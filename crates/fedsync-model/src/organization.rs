//! Organization domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{require, ModelResult};
use crate::identifier::OrganizationIdentifier;
use crate::object::{FederationObjectKind, FederationObjectRef};

/// A federation subscriber organization.
///
/// Organizations are matched across sources by `domain`, which is independent
/// of either source's own numbering. The `identifier` is durable once it is
/// permanent; see [`OrganizationIdentifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique row id.
    pub id: Uuid,
    /// Durable external identifier (URL-safe base64 alphabet).
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Business key shared by both sources (the SAML `OrganizationName`).
    pub domain: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Creates a new organization.
    #[must_use]
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            identifier: identifier.into(),
            name: name.into(),
            domain: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Returns the activation reference for this organization.
    #[must_use]
    pub const fn object_ref(&self) -> FederationObjectRef {
        FederationObjectRef::new(FederationObjectKind::Organization, self.id)
    }

    /// Checks the persistence invariants.
    ///
    /// ## Errors
    ///
    /// Fails when the identifier is outside the URL-safe base64 alphabet,
    /// the name is blank, or a present domain is blank.
    pub fn validate(&self) -> ModelResult<()> {
        OrganizationIdentifier::validate(&self.identifier)?;
        require("Organization", "name", &self.name)?;
        if let Some(domain) = &self.domain {
            require("Organization", "domain", domain)?;
        }
        Ok(())
    }
}
