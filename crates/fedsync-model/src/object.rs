//! The polymorphic federation object role.
//!
//! Organizations, identity providers, service providers and generic services
//! all share the activation relationship. Storage keys activations by
//! [`FederationObjectRef`], a (kind, id) pair.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{GenericService, IdentityProvider, Organization, ServiceProvider};

/// Kind of federation object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FederationObjectKind {
    /// A subscriber organization.
    Organization,
    /// A SAML identity provider.
    IdentityProvider,
    /// A SAML service provider.
    ServiceProvider,
    /// A non-SAML service.
    GenericService,
}

impl FederationObjectKind {
    /// All kinds, in dependency order.
    pub const ALL: [Self; 4] = [
        Self::Organization,
        Self::IdentityProvider,
        Self::ServiceProvider,
        Self::GenericService,
    ];

    /// Returns the discriminator stored in the activation table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::IdentityProvider => "IdentityProvider",
            Self::ServiceProvider => "ServiceProvider",
            Self::GenericService => "GenericService",
        }
    }

    /// Parses a stored discriminator.
    #[must_use]
    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "Organization" => Some(Self::Organization),
            "IdentityProvider" => Some(Self::IdentityProvider),
            "ServiceProvider" => Some(Self::ServiceProvider),
            "GenericService" => Some(Self::GenericService),
            _ => None,
        }
    }
}

impl fmt::Display for FederationObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a federation object by kind and row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FederationObjectRef {
    /// Object kind.
    pub kind: FederationObjectKind,
    /// Row id.
    pub id: Uuid,
}

impl FederationObjectRef {
    /// Creates a new reference.
    #[must_use]
    pub const fn new(kind: FederationObjectKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for FederationObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Any federation object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "object")]
pub enum FederationObject {
    /// An organization.
    Organization(Organization),
    /// An identity provider.
    IdentityProvider(IdentityProvider),
    /// A service provider.
    ServiceProvider(ServiceProvider),
    /// A generic service.
    GenericService(GenericService),
}

impl FederationObject {
    /// Returns the object kind.
    #[must_use]
    pub const fn kind(&self) -> FederationObjectKind {
        match self {
            Self::Organization(_) => FederationObjectKind::Organization,
            Self::IdentityProvider(_) => FederationObjectKind::IdentityProvider,
            Self::ServiceProvider(_) => FederationObjectKind::ServiceProvider,
            Self::GenericService(_) => FederationObjectKind::GenericService,
        }
    }

    /// Returns the row id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Organization(o) => o.id,
            Self::IdentityProvider(p) => p.id,
            Self::ServiceProvider(p) => p.id,
            Self::GenericService(s) => s.id,
        }
    }

    /// Returns the activation reference for this object.
    #[must_use]
    pub const fn object_ref(&self) -> FederationObjectRef {
        FederationObjectRef::new(self.kind(), self.id())
    }

    /// Returns the external key that identifies the object within its kind.
    #[must_use]
    pub fn identifying_key(&self) -> &str {
        match self {
            Self::Organization(o) => &o.identifier,
            Self::IdentityProvider(p) => &p.entity_id,
            Self::ServiceProvider(p) => &p.entity_id,
            Self::GenericService(s) => &s.identifier,
        }
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Organization(o) => &o.name,
            Self::IdentityProvider(p) => &p.name,
            Self::ServiceProvider(p) => &p.name,
            Self::GenericService(s) => &s.name,
        }
    }
}

impl From<Organization> for FederationObject {
    fn from(value: Organization) -> Self {
        Self::Organization(value)
    }
}

impl From<IdentityProvider> for FederationObject {
    fn from(value: IdentityProvider) -> Self {
        Self::IdentityProvider(value)
    }
}

impl From<ServiceProvider> for FederationObject {
    fn from(value: ServiceProvider) -> Self {
        Self::ServiceProvider(value)
    }
}

impl From<GenericService> for FederationObject {
    fn from(value: GenericService) -> Self {
        Self::GenericService(value)
    }
}
