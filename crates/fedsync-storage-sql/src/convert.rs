//! Conversion between database entities and domain models.

use fedsync_model::{
    Activation, AssociationOwner, AttributeAssociation, FederationObjectKind, FederationObjectRef,
    GenericService, IdentityProvider, Organization, SamlAttribute, ServiceProvider,
};
use fedsync_storage::StorageError;

use crate::entities::{
    ActivationRow, AssociationRow, GenericServiceRow, OrganizationRow, ProviderRow,
    SamlAttributeRow,
};

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Self {
            id: row.id,
            identifier: row.identifier,
            name: row.name,
            domain: row.domain,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<ProviderRow> for IdentityProvider {
    fn from(row: ProviderRow) -> Self {
        Self {
            id: row.id,
            entity_id: row.entity_id,
            name: row.name,
            organization_id: row.organization_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<ProviderRow> for ServiceProvider {
    fn from(row: ProviderRow) -> Self {
        Self {
            id: row.id,
            entity_id: row.entity_id,
            name: row.name,
            organization_id: row.organization_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<GenericServiceRow> for GenericService {
    fn from(row: GenericServiceRow) -> Self {
        Self {
            id: row.id,
            identifier: row.identifier,
            name: row.name,
            service_type: row.service_type,
            organization_id: row.organization_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<SamlAttributeRow> for SamlAttribute {
    fn from(row: SamlAttributeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            core: row.core,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Builds an association from a row of the table selected by `owner_kind`.
pub fn association_from_row(
    row: AssociationRow,
    owner_kind: fn(uuid::Uuid) -> AssociationOwner,
) -> AttributeAssociation {
    AttributeAssociation {
        id: row.id,
        owner: owner_kind(row.owner_id),
        saml_attribute_id: row.saml_attribute_id,
        optional: row.optional,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

impl TryFrom<ActivationRow> for Activation {
    type Error = StorageError;

    fn try_from(row: ActivationRow) -> Result<Self, Self::Error> {
        let kind = FederationObjectKind::from_str_opt(&row.federation_object_type).ok_or_else(
            || {
                StorageError::Internal(format!(
                    "unknown federation object type '{}'",
                    row.federation_object_type
                ))
            },
        )?;

        Ok(Self {
            id: row.id,
            federation_object: FederationObjectRef::new(kind, row.federation_object_id),
            activated_at: row.activated_at,
            deactivated_at: row.deactivated_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
