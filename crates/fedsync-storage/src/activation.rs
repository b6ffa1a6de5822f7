//! Activation repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedsync_model::{Activation, FederationObjectKind, FederationObjectRef};

use crate::error::StorageResult;

/// Activation storage operations within a transaction.
#[async_trait]
pub trait ActivationRepository: Send {
    /// Lists the activations of one federation object.
    async fn find_activations(
        &mut self,
        object: FederationObjectRef,
    ) -> StorageResult<Vec<Activation>>;

    /// Inserts a new activation.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::InvalidData` for an inverted interval.
    async fn insert_activation(&mut self, activation: &Activation) -> StorageResult<()>;

    /// Updates an existing activation.
    async fn update_activation(&mut self, activation: &Activation) -> StorageResult<()>;

    /// Lists activations of `kind` with no deactivation, or one after `at`.
    async fn list_open_activations(
        &mut self,
        kind: FederationObjectKind,
        at: DateTime<Utc>,
    ) -> StorageResult<Vec<Activation>>;
}
