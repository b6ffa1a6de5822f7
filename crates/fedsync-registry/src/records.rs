//! Records returned by the registry export API.
//!
//! Field names follow the export JSON. Fields the sync does not read are
//! ignored on deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An organization (federation subscriber).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryOrganization {
    /// Registry id.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Business key shared with the metadata feed's `OrganizationName`.
    #[serde(default)]
    pub domain: Option<String>,
    /// Whether the organization is currently functioning.
    pub functioning: bool,
    /// When the record was created in the registry.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated in the registry.
    pub updated_at: DateTime<Utc>,
}

/// Reference to another registry record by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryReference {
    /// Registry id.
    pub id: i64,
}

/// The SAML entity block shared by IdPs and SPs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamlEntity {
    /// SAML entity ID.
    pub entity_id: String,
}

/// An attribute referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedAttribute {
    /// Attribute name.
    pub name: String,
}

/// SAML details of an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProviderSaml {
    /// Entity block.
    pub entity: SamlEntity,
    /// Attributes the IdP releases.
    #[serde(default)]
    pub attributes: Vec<NamedAttribute>,
}

/// An identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryIdentityProvider {
    /// Registry id.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Owning organization.
    pub organization: RegistryReference,
    /// SAML details.
    pub saml: IdentityProviderSaml,
    /// Whether the IdP is currently functioning.
    pub functioning: bool,
    /// When the record was created in the registry.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated in the registry.
    pub updated_at: DateTime<Utc>,
}

/// An attribute requested by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    /// Attribute name.
    pub name: String,
    /// Whether the service requires it.
    #[serde(default)]
    pub is_required: bool,
}

/// An attribute consuming service of an SP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeConsumingService {
    /// Requested attributes.
    #[serde(default)]
    pub attributes: Vec<RequestedAttribute>,
}

/// SAML details of a service provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProviderSaml {
    /// Entity block.
    pub entity: SamlEntity,
    /// Attribute consuming services.
    #[serde(default)]
    pub attribute_consuming_services: Vec<AttributeConsumingService>,
}

impl ServiceProviderSaml {
    /// Iterates the requested attributes of every consuming service.
    pub fn requested_attributes(&self) -> impl Iterator<Item = &RequestedAttribute> {
        self.attribute_consuming_services
            .iter()
            .flat_map(|acs| acs.attributes.iter())
    }
}

/// A service provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryServiceProvider {
    /// Registry id.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Owning organization.
    pub organization: RegistryReference,
    /// SAML details.
    pub saml: ServiceProviderSaml,
    /// Whether the SP is currently functioning.
    pub functioning: bool,
    /// When the record was created in the registry.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated in the registry.
    pub updated_at: DateTime<Utc>,
}

/// Category of an attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCategory {
    /// Category name, e.g. `Core` or `Optional`.
    pub name: String,
}

/// An attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAttribute {
    /// Attribute name.
    pub name: String,
    /// Free text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Category.
    #[serde(default)]
    pub category: Option<AttributeCategory>,
}

impl RegistryAttribute {
    /// Returns true when the attribute belongs to the `Core` category.
    #[must_use]
    pub fn is_core(&self) -> bool {
        self.category.as_ref().is_some_and(|c| c.name == "Core")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrganizationsEnvelope {
    pub(crate) organizations: Vec<RegistryOrganization>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdentityProvidersEnvelope {
    pub(crate) identity_providers: Vec<RegistryIdentityProvider>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceProvidersEnvelope {
    pub(crate) service_providers: Vec<RegistryServiceProvider>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttributesEnvelope {
    pub(crate) attributes: Vec<RegistryAttribute>,
}
