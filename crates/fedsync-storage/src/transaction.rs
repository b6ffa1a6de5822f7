//! Transactions over the federation store.

use async_trait::async_trait;

use crate::activation::ActivationRepository;
use crate::attribute::{AssociationRepository, SamlAttributeRepository};
use crate::error::StorageResult;
use crate::organization::OrganizationRepository;
use crate::provider::{IdentityProviderRepository, ServiceProviderRepository};
use crate::service::GenericServiceRepository;

/// One serializable unit of work over every repository.
///
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait StoreTransaction:
    OrganizationRepository
    + IdentityProviderRepository
    + ServiceProviderRepository
    + GenericServiceRepository
    + SamlAttributeRepository
    + AssociationRepository
    + ActivationRepository
    + Send
{
    /// Makes every write of the transaction durable.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Transaction` if the backend refuses the commit,
    /// in which case nothing was written.
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards every write of the transaction.
    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}

/// A canonical federation store.
#[async_trait]
pub trait FederationStore: Send + Sync {
    /// Opens a new transaction.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Connection` if the backend is unreachable.
    async fn begin(&self) -> StorageResult<Box<dyn StoreTransaction>>;
}
