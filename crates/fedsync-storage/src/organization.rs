//! Organization repository trait.

use async_trait::async_trait;
use fedsync_model::Organization;
use uuid::Uuid;

use crate::error::StorageResult;

/// Organization storage operations within a transaction.
#[async_trait]
pub trait OrganizationRepository: Send {
    /// Gets an organization by row ID.
    async fn find_organization(&mut self, id: Uuid) -> StorageResult<Option<Organization>>;

    /// Gets an organization by its durable identifier.
    async fn find_organization_by_identifier(
        &mut self,
        identifier: &str,
    ) -> StorageResult<Option<Organization>>;

    /// Gets an organization by domain.
    async fn find_organization_by_domain(
        &mut self,
        domain: &str,
    ) -> StorageResult<Option<Organization>>;

    /// Inserts a new organization.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::InvalidData` if the organization fails
    /// validation, or `StorageError::Duplicate` if the identifier or domain
    /// is taken.
    async fn insert_organization(&mut self, organization: &Organization) -> StorageResult<()>;

    /// Updates an existing organization.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the organization doesn't exist,
    /// or `StorageError::Duplicate` if another row holds its identifier or
    /// domain.
    async fn update_organization(&mut self, organization: &Organization) -> StorageResult<()>;

    /// Deletes an organization together with its activation.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the organization doesn't exist, or
    /// `StorageError::Reference` while providers or services still point at it.
    async fn delete_organization(&mut self, id: Uuid) -> StorageResult<()>;

    /// Lists all organizations.
    async fn list_organizations(&mut self) -> StorageResult<Vec<Organization>>;
}
