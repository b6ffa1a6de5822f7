//! Generic service repository trait.

use async_trait::async_trait;
use fedsync_model::GenericService;

use crate::error::StorageResult;

/// Generic service storage operations within a transaction.
#[async_trait]
pub trait GenericServiceRepository: Send {
    /// Gets a generic service by identifier.
    async fn find_generic_service_by_identifier(
        &mut self,
        identifier: &str,
    ) -> StorageResult<Option<GenericService>>;

    /// Inserts a new generic service.
    async fn insert_generic_service(&mut self, service: &GenericService) -> StorageResult<()>;

    /// Updates an existing generic service.
    async fn update_generic_service(&mut self, service: &GenericService) -> StorageResult<()>;

    /// Lists all generic services.
    async fn list_generic_services(&mut self) -> StorageResult<Vec<GenericService>>;
}
