//! Database entity types for `SQLx`.
//!
//! These types map directly to database rows and are converted
//! to/from domain models.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for organizations.
#[derive(Debug, Clone, FromRow)]
pub struct OrganizationRow {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub domain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for identity and service providers (same shape).
#[derive(Debug, Clone, FromRow)]
pub struct ProviderRow {
    pub id: Uuid,
    pub entity_id: String,
    pub name: String,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for generic services.
#[derive(Debug, Clone, FromRow)]
pub struct GenericServiceRow {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub service_type: String,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for attribute definitions.
#[derive(Debug, Clone, FromRow)]
pub struct SamlAttributeRow {
    pub id: Uuid,
    pub name: String,
    pub core: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for either association table, with the owner column aliased.
#[derive(Debug, Clone, FromRow)]
pub struct AssociationRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub saml_attribute_id: Uuid,
    pub optional: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for activations.
#[derive(Debug, Clone, FromRow)]
pub struct ActivationRow {
    pub id: Uuid,
    pub federation_object_type: String,
    pub federation_object_id: Uuid,
    pub activated_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
