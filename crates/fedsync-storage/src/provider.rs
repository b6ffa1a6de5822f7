//! Identity and service provider repository traits.

use async_trait::async_trait;
use fedsync_model::{IdentityProvider, ServiceProvider};

use crate::error::StorageResult;

/// Identity provider storage operations within a transaction.
#[async_trait]
pub trait IdentityProviderRepository: Send {
    /// Gets an identity provider by entity ID.
    async fn find_identity_provider_by_entity_id(
        &mut self,
        entity_id: &str,
    ) -> StorageResult<Option<IdentityProvider>>;

    /// Inserts a new identity provider.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Duplicate` if the entity ID is taken, or
    /// `StorageError::Reference` if the organization doesn't exist.
    async fn insert_identity_provider(&mut self, provider: &IdentityProvider) -> StorageResult<()>;

    /// Updates an existing identity provider.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the provider doesn't exist.
    async fn update_identity_provider(&mut self, provider: &IdentityProvider) -> StorageResult<()>;

    /// Lists all identity providers.
    async fn list_identity_providers(&mut self) -> StorageResult<Vec<IdentityProvider>>;
}

/// Service provider storage operations within a transaction.
#[async_trait]
pub trait ServiceProviderRepository: Send {
    /// Gets a service provider by entity ID.
    async fn find_service_provider_by_entity_id(
        &mut self,
        entity_id: &str,
    ) -> StorageResult<Option<ServiceProvider>>;

    /// Inserts a new service provider.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Duplicate` if the entity ID is taken, or
    /// `StorageError::Reference` if the organization doesn't exist.
    async fn insert_service_provider(&mut self, provider: &ServiceProvider) -> StorageResult<()>;

    /// Updates an existing service provider.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the provider doesn't exist.
    async fn update_service_provider(&mut self, provider: &ServiceProvider) -> StorageResult<()>;

    /// Lists all service providers.
    async fn list_service_providers(&mut self) -> StorageResult<Vec<ServiceProvider>>;
}
