//! Reconciliation against the registry export API.
//!
//! The registry is authoritative for attribute definitions, organizations and
//! (unless the metadata feed owns them) identity and service providers.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use fedsync_model::{
    normalize_description, AssociationOwner, FederationObjectKind, IdentityProvider,
    SamlAttribute, ServiceProvider,
};
use fedsync_registry::{
    RegistryAttribute, RegistryIdentityProvider, RegistryOrganization, RegistryServiceProvider,
    RegistrySnapshot, RegistrySource,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapter::{SourceAdapter, SyncContext};
use crate::arbiter::RegistryOrganizationKey;
use crate::differ::{apply_requirement, no_flags, DeclaredAttribute};
use crate::error::SyncResult;
use crate::report::{EntityKind, SkipReason, SyncSource};
use crate::resolver::{display_name, resolve_with, Resolvable};

/// Registry organization id to store row id, for organizations resolved in
/// this pass.
type ResolvedOrganizations = BTreeMap<i64, Uuid>;

/// Registry source adapter.
#[derive(Debug, Clone)]
pub struct RegistrySync<S> {
    source: S,
    include_saml_entities: bool,
}

impl<S: RegistrySource> RegistrySync<S> {
    /// Creates an adapter that also reconciles identity and service providers.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self {
            source,
            include_saml_entities: true,
        }
    }

    /// Sets whether identity and service providers are reconciled.
    ///
    /// Turn this off when the metadata feed owns SAML entities; the registry
    /// then neither writes nor sweeps them.
    #[must_use]
    pub const fn include_saml_entities(mut self, include: bool) -> Self {
        self.include_saml_entities = include;
        self
    }
}

#[async_trait]
impl<S: RegistrySource> SourceAdapter for RegistrySync<S> {
    type Snapshot = RegistrySnapshot;

    fn source(&self) -> SyncSource {
        SyncSource::Registry
    }

    async fn fetch(&self) -> SyncResult<RegistrySnapshot> {
        let snapshot = self.source.snapshot(self.include_saml_entities).await?;
        info!(
            attributes = snapshot.attributes.len(),
            organizations = snapshot.organizations.len(),
            identity_providers = snapshot.identity_providers.len(),
            service_providers = snapshot.service_providers.len(),
            "fetched registry snapshot"
        );
        Ok(snapshot)
    }

    async fn process(&self, ctx: &mut SyncContext<'_>, snapshot: RegistrySnapshot) -> SyncResult<()> {
        sync_attributes(ctx, &snapshot.attributes).await?;
        let organizations = sync_organizations(ctx, &snapshot.organizations).await?;
        if self.include_saml_entities {
            for record in &snapshot.identity_providers {
                sync_identity_provider(ctx, &organizations, record).await?;
            }
            for record in &snapshot.service_providers {
                sync_service_provider(ctx, &organizations, record).await?;
            }
        }
        Ok(())
    }

    fn swept_kinds(&self) -> Vec<FederationObjectKind> {
        let mut kinds = vec![FederationObjectKind::Organization];
        if self.include_saml_entities {
            kinds.push(FederationObjectKind::IdentityProvider);
            kinds.push(FederationObjectKind::ServiceProvider);
        }
        kinds
    }
}

/// Upserts every attribute definition, then deletes the ones the registry no
/// longer lists together with their associations.
async fn sync_attributes(ctx: &mut SyncContext<'_>, records: &[RegistryAttribute]) -> SyncResult<()> {
    let limit = ctx.settings.description_limit;
    let mut seen = BTreeSet::new();

    for record in records {
        let core = record.is_core();
        let description = record
            .description
            .as_deref()
            .map(|d| normalize_description(d, limit))
            .filter(|d| !d.is_empty());
        let resolved = resolve_with(
            ctx.tx,
            &record.name,
            || SamlAttribute::new(record.name.clone()),
            |attribute| {
                attribute.core = core;
                attribute.description = description;
            },
        )
        .await?;
        ctx.record(SamlAttribute::KIND, resolved.outcome);
        seen.insert(record.name.as_str());
    }

    for attribute in ctx.tx.list_attributes().await? {
        if !seen.contains(attribute.name.as_str()) {
            ctx.tx.delete_attribute(attribute.id).await?;
            debug!(attribute = %attribute.name, "pruned attribute definition");
            ctx.report.attributes_pruned += 1;
        }
    }
    Ok(())
}

async fn sync_organizations(
    ctx: &mut SyncContext<'_>,
    records: &[RegistryOrganization],
) -> SyncResult<ResolvedOrganizations> {
    let mut resolved_ids = ResolvedOrganizations::new();

    for record in records {
        let key = RegistryOrganizationKey {
            registry_id: record.id,
            domain: record
                .domain
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty()),
            name: record.display_name.as_deref(),
        };
        let resolved = ctx.arbiter.resolve_registry(ctx.tx, key).await?;
        ctx.record(EntityKind::Organization, resolved.outcome);

        let object = resolved.entity.object_ref();
        ctx.touch(object);
        ctx.activate(
            object,
            record.created_at,
            (!record.functioning).then_some(record.updated_at),
        )
        .await?;
        resolved_ids.insert(record.id, resolved.entity.id);
    }
    Ok(resolved_ids)
}

async fn sync_identity_provider(
    ctx: &mut SyncContext<'_>,
    organizations: &ResolvedOrganizations,
    record: &RegistryIdentityProvider,
) -> SyncResult<()> {
    let entity_id = record.saml.entity.entity_id.as_str();
    let Some(&organization_id) = organizations.get(&record.organization.id) else {
        ctx.skip(
            EntityKind::IdentityProvider,
            entity_id,
            SkipReason::OrphanedChildRecord {
                organization: record.organization.id.to_string(),
            },
        );
        return Ok(());
    };

    let name = display_name(record.display_name.as_deref(), entity_id);
    let resolved = resolve_with(
        ctx.tx,
        entity_id,
        || IdentityProvider::new(entity_id, organization_id),
        |idp| {
            idp.name = name;
            idp.organization_id = organization_id;
        },
    )
    .await?;
    ctx.record(EntityKind::IdentityProvider, resolved.outcome);

    let declared = DeclaredAttribute::merge(
        record
            .saml
            .attributes
            .iter()
            .map(|a| DeclaredAttribute::new(a.name.as_str(), false)),
    );
    ctx.reconcile_associations(
        EntityKind::IdentityProvider,
        entity_id,
        AssociationOwner::IdentityProvider(resolved.entity.id),
        &declared,
        no_flags,
    )
    .await?;

    let object = resolved.entity.object_ref();
    ctx.touch(object);
    ctx.activate(
        object,
        record.created_at,
        (!record.functioning).then_some(record.updated_at),
    )
    .await
}

async fn sync_service_provider(
    ctx: &mut SyncContext<'_>,
    organizations: &ResolvedOrganizations,
    record: &RegistryServiceProvider,
) -> SyncResult<()> {
    let entity_id = record.saml.entity.entity_id.as_str();
    let Some(&organization_id) = organizations.get(&record.organization.id) else {
        ctx.skip(
            EntityKind::ServiceProvider,
            entity_id,
            SkipReason::OrphanedChildRecord {
                organization: record.organization.id.to_string(),
            },
        );
        return Ok(());
    };

    let name = display_name(record.display_name.as_deref(), entity_id);
    let resolved = resolve_with(
        ctx.tx,
        entity_id,
        || ServiceProvider::new(entity_id, organization_id),
        |sp| {
            sp.name = name;
            sp.organization_id = organization_id;
        },
    )
    .await?;
    ctx.record(EntityKind::ServiceProvider, resolved.outcome);

    let declared = DeclaredAttribute::merge(
        record
            .saml
            .requested_attributes()
            .map(|a| DeclaredAttribute::new(a.name.as_str(), a.is_required)),
    );
    ctx.reconcile_associations(
        EntityKind::ServiceProvider,
        entity_id,
        AssociationOwner::ServiceProvider(resolved.entity.id),
        &declared,
        apply_requirement,
    )
    .await?;

    let object = resolved.entity.object_ref();
    ctx.touch(object);
    ctx.activate(
        object,
        record.created_at,
        (!record.functioning).then_some(record.updated_at),
    )
    .await
}
