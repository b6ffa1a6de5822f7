//! SAML attribute and association repository traits.

use async_trait::async_trait;
use fedsync_model::{AssociationOwner, AttributeAssociation, SamlAttribute};
use uuid::Uuid;

use crate::error::StorageResult;

/// Attribute definition storage operations within a transaction.
#[async_trait]
pub trait SamlAttributeRepository: Send {
    /// Gets an attribute definition by name.
    async fn find_attribute_by_name(&mut self, name: &str)
        -> StorageResult<Option<SamlAttribute>>;

    /// Inserts a new attribute definition.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Duplicate` if the name is taken.
    async fn insert_attribute(&mut self, attribute: &SamlAttribute) -> StorageResult<()>;

    /// Updates an existing attribute definition.
    async fn update_attribute(&mut self, attribute: &SamlAttribute) -> StorageResult<()>;

    /// Deletes an attribute definition and every association referencing it.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the attribute doesn't exist.
    async fn delete_attribute(&mut self, id: Uuid) -> StorageResult<()>;

    /// Lists all attribute definitions.
    async fn list_attributes(&mut self) -> StorageResult<Vec<SamlAttribute>>;
}

/// Provider attribute association storage operations within a transaction.
#[async_trait]
pub trait AssociationRepository: Send {
    /// Lists the associations of one provider.
    async fn list_associations(
        &mut self,
        owner: AssociationOwner,
    ) -> StorageResult<Vec<AttributeAssociation>>;

    /// Inserts a new association.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Duplicate` if the provider already has an
    /// association with the attribute, or `StorageError::Reference` if the
    /// provider or attribute doesn't exist.
    async fn insert_association(&mut self, association: &AttributeAssociation)
        -> StorageResult<()>;

    /// Updates an existing association.
    async fn update_association(&mut self, association: &AttributeAssociation)
        -> StorageResult<()>;

    /// Deletes an association.
    async fn delete_association(&mut self, association: &AttributeAssociation)
        -> StorageResult<()>;
}
