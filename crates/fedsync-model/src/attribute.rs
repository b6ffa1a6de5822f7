//! SAML attribute definitions and their provider associations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{require, ModelResult};

/// Default length bound for attribute descriptions.
pub const DEFAULT_DESCRIPTION_LIMIT: usize = 255;

/// A SAML attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamlAttribute {
    /// Unique row id.
    pub id: Uuid,
    /// Attribute name (the `FriendlyName` used in metadata), globally unique.
    pub name: String,
    /// True for the registry's "Core" category, false for optional attributes.
    pub core: bool,
    /// Normalized description.
    pub description: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl SamlAttribute {
    /// Creates a new, optional attribute definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            core: false,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the attribute as core.
    #[must_use]
    pub const fn core(mut self) -> Self {
        self.core = true;
        self
    }

    /// Checks the persistence invariants.
    ///
    /// ## Errors
    ///
    /// Fails when the name is blank.
    pub fn validate(&self) -> ModelResult<()> {
        require("SamlAttribute", "name", &self.name)
    }
}

/// The provider an attribute association hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssociationOwner {
    /// Attribute released by an identity provider.
    IdentityProvider(Uuid),
    /// Attribute requested by a service provider.
    ServiceProvider(Uuid),
}

impl AssociationOwner {
    /// Returns the owning provider's row id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::IdentityProvider(id) | Self::ServiceProvider(id) => *id,
        }
    }
}

/// Link between a provider and an attribute definition.
///
/// Keyed by `(owner, saml_attribute_id)`. IdP associations never carry the
/// `optional` flag; everything an IdP declares is released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeAssociation {
    /// Unique row id.
    pub id: Uuid,
    /// Owning provider.
    pub owner: AssociationOwner,
    /// Referenced attribute definition.
    pub saml_attribute_id: Uuid,
    /// SP side only: the attribute was requested but not required.
    pub optional: bool,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl AttributeAssociation {
    /// Creates a new association.
    #[must_use]
    pub fn new(owner: AssociationOwner, saml_attribute_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner,
            saml_attribute_id,
            optional: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Normalizes a free-text attribute description.
///
/// Line breaks and runs of whitespace collapse to single spaces. Text longer
/// than `limit` characters is cut after the first sentence (`". "`) if that
/// sentence ends before the limit, keeping the full stop; otherwise it is
/// hard-truncated to `limit` characters.
#[must_use]
pub fn normalize_description(description: &str, limit: usize) -> String {
    let squeezed = description.split_whitespace().collect::<Vec<_>>().join(" ");

    if squeezed.chars().count() <= limit {
        return squeezed;
    }

    if let Some(byte_idx) = squeezed.find(". ") {
        if squeezed[..byte_idx].chars().count() < limit {
            return squeezed[..=byte_idx].to_string();
        }
    }

    squeezed.chars().take(limit).collect()
}
