//! SAML identity and service provider models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{require, ModelResult};
use crate::object::{FederationObjectKind, FederationObjectRef};

/// A SAML identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProvider {
    /// Unique row id.
    pub id: Uuid,
    /// SAML entity ID, unique among identity providers.
    pub entity_id: String,
    /// Display name.
    pub name: String,
    /// Owning organization (referenced, not owned).
    pub organization_id: Uuid,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl IdentityProvider {
    /// Creates a new identity provider named after its entity ID.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, organization_id: Uuid) -> Self {
        let entity_id = entity_id.into();
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: entity_id.clone(),
            entity_id,
            organization_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the activation reference.
    #[must_use]
    pub const fn object_ref(&self) -> FederationObjectRef {
        FederationObjectRef::new(FederationObjectKind::IdentityProvider, self.id)
    }

    /// Checks the persistence invariants.
    ///
    /// ## Errors
    ///
    /// Fails when the entity ID or name is blank.
    pub fn validate(&self) -> ModelResult<()> {
        require("IdentityProvider", "entity_id", &self.entity_id)?;
        require("IdentityProvider", "name", &self.name)
    }
}

/// A SAML service provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProvider {
    /// Unique row id.
    pub id: Uuid,
    /// SAML entity ID, unique among service providers.
    pub entity_id: String,
    /// Display name.
    pub name: String,
    /// Owning organization (referenced, not owned).
    pub organization_id: Uuid,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ServiceProvider {
    /// Creates a new service provider named after its entity ID.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, organization_id: Uuid) -> Self {
        let entity_id = entity_id.into();
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: entity_id.clone(),
            entity_id,
            organization_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the activation reference.
    #[must_use]
    pub const fn object_ref(&self) -> FederationObjectRef {
        FederationObjectRef::new(FederationObjectKind::ServiceProvider, self.id)
    }

    /// Checks the persistence invariants.
    ///
    /// ## Errors
    ///
    /// Fails when the entity ID or name is blank.
    pub fn validate(&self) -> ModelResult<()> {
        require("ServiceProvider", "entity_id", &self.entity_id)?;
        require("ServiceProvider", "name", &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_provider_defaults_name_to_entity_id() {
        let org = Uuid::now_v7();
        let sp = ServiceProvider::new("https://sp.example.edu/shibboleth", org);

        assert_eq!(sp.name, sp.entity_id);
        assert_eq!(sp.organization_id, org);
        assert!(sp.validate().is_ok());
    }

    #[test]
    fn blank_entity_id_is_invalid() {
        let idp = IdentityProvider::new("", Uuid::now_v7());
        assert!(idp.validate().is_err());
    }
}
