//! Generic (non-SAML) service model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{require, ModelResult};
use crate::object::{FederationObjectKind, FederationObjectRef};

/// A non-SAML federation service, such as an OIDC or JWT relying party.
///
/// Neither sync source creates these; they share the activation model so
/// reports can treat every federation object uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericService {
    /// Unique row id.
    pub id: Uuid,
    /// External identifier, unique among generic services.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Service type label (for example `"research"` or `"auresearch"`).
    pub service_type: String,
    /// Owning organization, if known.
    pub organization_id: Option<Uuid>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl GenericService {
    /// Creates a new generic service.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        service_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            identifier: identifier.into(),
            name: name.into(),
            service_type: service_type.into(),
            organization_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the activation reference.
    #[must_use]
    pub const fn object_ref(&self) -> FederationObjectRef {
        FederationObjectRef::new(FederationObjectKind::GenericService, self.id)
    }

    /// Checks the persistence invariants.
    ///
    /// ## Errors
    ///
    /// Fails when the identifier, name or type is blank.
    pub fn validate(&self) -> ModelResult<()> {
        require("GenericService", "identifier", &self.identifier)?;
        require("GenericService", "name", &self.name)?;
        require("GenericService", "service_type", &self.service_type)
    }
}
