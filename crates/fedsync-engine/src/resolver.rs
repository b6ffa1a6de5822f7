//! Entity identity resolution.
//!
//! A source record is matched to a stored row by the kind's unique key. A
//! missing row is initialized; either way the source's scalar fields are
//! applied, and the row is persisted only if that changed it.

use async_trait::async_trait;
use chrono::Utc;
use fedsync_model::{IdentityProvider, Organization, SamlAttribute, ServiceProvider};
use fedsync_storage::{StorageResult, StoreTransaction};
use tracing::debug;

use crate::error::SyncResult;
use crate::report::{EntityKind, Outcome};

/// A row the resolver can find, insert and update by its unique key.
#[async_trait]
pub trait Resolvable: Clone + PartialEq + Send + Sync + Sized {
    /// Kind reported for this row type.
    const KIND: EntityKind;

    /// Looks the row up by its unique key.
    async fn find(tx: &mut dyn StoreTransaction, key: &str) -> StorageResult<Option<Self>>;

    /// Inserts a new row.
    async fn insert(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()>;

    /// Updates an existing row.
    async fn update(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()>;

    /// Stamps the row's modification time.
    fn touch(&mut self);
}

/// A resolved row and what resolution did to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    /// The row as persisted.
    pub entity: T,
    /// Whether it was created, changed or left alone.
    pub outcome: Outcome,
}

/// Finds the row keyed by `key`, or initializes one with `init`, then applies
/// the source's scalar fields with `apply`.
///
/// ## Errors
///
/// Propagates storage failures. A row the store rejects aborts the run.
pub async fn resolve_with<T, I, A>(
    tx: &mut dyn StoreTransaction,
    key: &str,
    init: I,
    apply: A,
) -> SyncResult<Resolved<T>>
where
    T: Resolvable,
    I: FnOnce() -> T + Send,
    A: FnOnce(&mut T) + Send,
{
    let existing = T::find(tx, key).await?;
    resolve_found(tx, existing, init, apply).await
}

/// Like [`resolve_with`], for callers that already performed the lookup.
///
/// ## Errors
///
/// Propagates storage failures.
pub async fn resolve_found<T, I, A>(
    tx: &mut dyn StoreTransaction,
    existing: Option<T>,
    init: I,
    apply: A,
) -> SyncResult<Resolved<T>>
where
    T: Resolvable,
    I: FnOnce() -> T + Send,
    A: FnOnce(&mut T) + Send,
{
    match existing {
        Some(current) => {
            let mut entity = current.clone();
            apply(&mut entity);
            if entity == current {
                return Ok(Resolved {
                    entity,
                    outcome: Outcome::Unchanged,
                });
            }
            entity.touch();
            entity.update(tx).await?;
            debug!(kind = %T::KIND, "updated");
            Ok(Resolved {
                entity,
                outcome: Outcome::Updated,
            })
        }
        None => {
            let mut entity = init();
            apply(&mut entity);
            entity.insert(tx).await?;
            debug!(kind = %T::KIND, "created");
            Ok(Resolved {
                entity,
                outcome: Outcome::Created,
            })
        }
    }
}

/// Chooses a display name, falling back to the identifying key when the
/// source supplies none.
#[must_use]
pub fn display_name(source: Option<&str>, key: &str) -> String {
    source
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(key)
        .to_string()
}

#[async_trait]
impl Resolvable for Organization {
    const KIND: EntityKind = EntityKind::Organization;

    async fn find(tx: &mut dyn StoreTransaction, key: &str) -> StorageResult<Option<Self>> {
        tx.find_organization_by_domain(key).await
    }

    async fn insert(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()> {
        tx.insert_organization(self).await
    }

    async fn update(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()> {
        tx.update_organization(self).await
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[async_trait]
impl Resolvable for IdentityProvider {
    const KIND: EntityKind = EntityKind::IdentityProvider;

    async fn find(tx: &mut dyn StoreTransaction, key: &str) -> StorageResult<Option<Self>> {
        tx.find_identity_provider_by_entity_id(key).await
    }

    async fn insert(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()> {
        tx.insert_identity_provider(self).await
    }

    async fn update(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()> {
        tx.update_identity_provider(self).await
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[async_trait]
impl Resolvable for ServiceProvider {
    const KIND: EntityKind = EntityKind::ServiceProvider;

    async fn find(tx: &mut dyn StoreTransaction, key: &str) -> StorageResult<Option<Self>> {
        tx.find_service_provider_by_entity_id(key).await
    }

    async fn insert(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()> {
        tx.insert_service_provider(self).await
    }

    async fn update(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()> {
        tx.update_service_provider(self).await
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[async_trait]
impl Resolvable for SamlAttribute {
    const KIND: EntityKind = EntityKind::SamlAttribute;

    async fn find(tx: &mut dyn StoreTransaction, key: &str) -> StorageResult<Option<Self>> {
        tx.find_attribute_by_name(key).await
    }

    async fn insert(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()> {
        tx.insert_attribute(self).await
    }

    async fn update(&self, tx: &mut dyn StoreTransaction) -> StorageResult<()> {
        tx.update_attribute(self).await
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
