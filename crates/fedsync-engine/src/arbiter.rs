//! Organization identifier arbitration between the two sources.
//!
//! The registry owns organization identifiers. The metadata feed may see an
//! organization first and then stores a temporary identifier; the next
//! registry pass replaces it with the permanent one. Permanent identifiers
//! are never rewritten by either source.

use chrono::Utc;
use fedsync_model::{IdentifierPolicy, Organization};
use fedsync_storage::{StorageError, StoreTransaction};
use tracing::info;

use crate::error::SyncResult;
use crate::resolver::{display_name, resolve_found, Resolved};

/// Decides and applies organization identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierArbiter {
    policy: IdentifierPolicy,
}

/// An organization as described by the registry.
#[derive(Debug, Clone, Copy)]
pub struct RegistryOrganizationKey<'a> {
    /// Registry id.
    pub registry_id: i64,
    /// Domain, if the registry knows it.
    pub domain: Option<&'a str>,
    /// Display name.
    pub name: Option<&'a str>,
}

impl IdentifierArbiter {
    /// Creates an arbiter using `policy`.
    #[must_use]
    pub const fn new(policy: IdentifierPolicy) -> Self {
        Self { policy }
    }

    /// Returns the identifier policy.
    #[must_use]
    pub const fn policy(&self) -> &IdentifierPolicy {
        &self.policy
    }

    /// The identifier a registry pass should store, given the current one.
    #[must_use]
    pub fn registry_identifier(&self, current: Option<&str>, registry_id: i64) -> String {
        match current {
            Some(current) if !self.policy.is_temporary(current) => current.to_string(),
            _ => self.policy.permanent(registry_id).into_string(),
        }
    }

    /// The identifier a metadata pass should store, given the current one.
    #[must_use]
    pub fn metadata_identifier(&self, current: Option<&str>, domain: &str) -> String {
        match current {
            Some(current) => current.to_string(),
            None => self.policy.temporary(domain).into_string(),
        }
    }

    /// Resolves a registry organization.
    ///
    /// Looks up by the permanent identifier first, then by domain, so an
    /// organization created by the metadata feed is adopted rather than
    /// duplicated. An organization moving onto a domain the feed already
    /// claimed absorbs the feed's row.
    ///
    /// ## Errors
    ///
    /// Propagates storage failures. Moving onto a domain held by another
    /// registry organization fails with a duplicate error.
    pub async fn resolve_registry(
        &self,
        tx: &mut dyn StoreTransaction,
        record: RegistryOrganizationKey<'_>,
    ) -> SyncResult<Resolved<Organization>> {
        let permanent = self.policy.permanent(record.registry_id).into_string();
        let mut existing = tx.find_organization_by_identifier(&permanent).await?;
        match record.domain {
            Some(domain) if existing.is_none() => {
                existing = tx.find_organization_by_domain(domain).await?;
            }
            Some(domain) => {
                let moving = existing
                    .as_ref()
                    .filter(|current| current.domain.as_deref() != Some(domain));
                if let Some(current) = moving {
                    self.release_domain(tx, current, domain).await?;
                }
            }
            None => {}
        }

        let identifier = self.registry_identifier(
            existing.as_ref().map(|o| o.identifier.as_str()),
            record.registry_id,
        );
        if let Some(current) = &existing {
            if current.identifier != identifier {
                info!(
                    from = %current.identifier,
                    to = %identifier,
                    "replacing temporary organization identifier"
                );
            }
        }

        let key = record.domain.unwrap_or(identifier.as_str());
        let name = display_name(record.name, key);
        let domain = record.domain.map(str::to_string);
        let (init_identifier, init_name) = (identifier.clone(), name.clone());

        resolve_found(
            tx,
            existing,
            move || Organization::new(init_identifier, init_name),
            |org| {
                org.identifier = identifier;
                org.name = name;
                if domain.is_some() {
                    org.domain = domain;
                }
            },
        )
        .await
    }

    /// Frees `domain` for `target`, which is moving onto it.
    ///
    /// A row holding the domain under a temporary identifier is the same
    /// organization as seen by the metadata feed: its providers and services
    /// move to `target` and the row is deleted. A row holding it under a
    /// permanent identifier is a conflict the registry must resolve.
    async fn release_domain(
        &self,
        tx: &mut dyn StoreTransaction,
        target: &Organization,
        domain: &str,
    ) -> SyncResult<()> {
        let Some(holder) = tx.find_organization_by_domain(domain).await? else {
            return Ok(());
        };
        if holder.id == target.id {
            return Ok(());
        }
        if !self.policy.is_temporary(&holder.identifier) {
            return Err(StorageError::duplicate("Organization", "domain", domain).into());
        }

        let now = Utc::now();
        let mut moved = 0_usize;
        for mut idp in tx.list_identity_providers().await? {
            if idp.organization_id == holder.id {
                idp.organization_id = target.id;
                idp.updated_at = now;
                tx.update_identity_provider(&idp).await?;
                moved += 1;
            }
        }
        for mut sp in tx.list_service_providers().await? {
            if sp.organization_id == holder.id {
                sp.organization_id = target.id;
                sp.updated_at = now;
                tx.update_service_provider(&sp).await?;
                moved += 1;
            }
        }
        for mut service in tx.list_generic_services().await? {
            if service.organization_id == Some(holder.id) {
                service.organization_id = Some(target.id);
                service.updated_at = now;
                tx.update_generic_service(&service).await?;
                moved += 1;
            }
        }
        tx.delete_organization(holder.id).await?;

        info!(
            domain,
            merged = %holder.identifier,
            into = %target.identifier,
            moved,
            "merged temporary organization"
        );
        Ok(())
    }

    /// Resolves an organization seen in the metadata feed, keyed by domain.
    ///
    /// ## Errors
    ///
    /// Propagates storage failures.
    pub async fn resolve_metadata(
        &self,
        tx: &mut dyn StoreTransaction,
        domain: &str,
        name: Option<&str>,
    ) -> SyncResult<Resolved<Organization>> {
        let existing = tx.find_organization_by_domain(domain).await?;
        let identifier = self.metadata_identifier(
            existing.as_ref().map(|o| o.identifier.as_str()),
            domain,
        );
        let name = display_name(name, domain);
        let init_name = name.clone();

        resolve_found(
            tx,
            existing,
            move || Organization::new(identifier, init_name).with_domain(domain),
            |org| org.name = name,
        )
        .await
    }
}
