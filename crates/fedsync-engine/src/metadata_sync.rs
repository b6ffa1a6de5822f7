//! Reconciliation against the signed SAML metadata feed.
//!
//! Every `EntityDescriptor` carrying an `IDPSSODescriptor` or `SPSSODescriptor`
//! becomes an identity or service provider under the organization named by
//! its `OrganizationName`. Organizations are resolved here but their
//! activations belong to the registry.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedsync_core::MissingRegistrationDate;
use fedsync_metadata::namespaces::{MD, MDRPI, MDUI, SAML};
use fedsync_metadata::{DocumentTree, Element, MetadataSource};
use fedsync_model::{
    AssociationOwner, FederationObjectKind, FederationObjectRef, IdentityProvider,
    ServiceProvider,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapter::{SourceAdapter, SyncContext};
use crate::differ::{apply_requirement, no_flags, DeclaredAttribute};
use crate::error::SyncResult;
use crate::report::{EntityKind, SkipReason, SyncSource};
use crate::resolver::{display_name, resolve_with};

/// Metadata feed source adapter.
#[derive(Debug, Clone)]
pub struct MetadataSync<S> {
    source: S,
}

impl<S: MetadataSource> MetadataSync<S> {
    /// Creates an adapter over `source`.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: MetadataSource> SourceAdapter for MetadataSync<S> {
    type Snapshot = DocumentTree;

    fn source(&self) -> SyncSource {
        SyncSource::Metadata
    }

    async fn fetch(&self) -> SyncResult<DocumentTree> {
        Ok(self.source.fetch().await?)
    }

    async fn process(&self, ctx: &mut SyncContext<'_>, tree: DocumentTree) -> SyncResult<()> {
        let entities = tree.descendants(MD, "EntityDescriptor");
        info!(entities = entities.len(), "processing metadata entities");

        let mut organizations = BTreeMap::new();
        for (index, entity) in entities.into_iter().enumerate() {
            sync_entity(ctx, &mut organizations, index, entity).await?;
        }
        Ok(())
    }

    fn swept_kinds(&self) -> Vec<FederationObjectKind> {
        vec![
            FederationObjectKind::IdentityProvider,
            FederationObjectKind::ServiceProvider,
        ]
    }
}

async fn sync_entity(
    ctx: &mut SyncContext<'_>,
    organizations: &mut BTreeMap<String, Uuid>,
    index: usize,
    entity: &Element,
) -> SyncResult<()> {
    let idp_role = entity.child(MD, "IDPSSODescriptor");
    let sp_role = entity.child(MD, "SPSSODescriptor");
    let kind = match (idp_role, sp_role) {
        (Some(_), _) => EntityKind::IdentityProvider,
        (None, Some(_)) => EntityKind::ServiceProvider,
        (None, None) => {
            debug!(index, "entity has no IdP or SP role");
            return Ok(());
        }
    };

    let Some(entity_id) = entity
        .attribute("entityID")
        .map(str::trim)
        .filter(|id| !id.is_empty())
    else {
        ctx.skip(
            kind,
            format!("EntityDescriptor[{index}]"),
            SkipReason::MissingKey {
                field: "entityID".to_string(),
            },
        );
        return Ok(());
    };

    let Some(organization) = entity.child(MD, "Organization") else {
        ctx.skip(kind, entity_id, missing_organization_name());
        return Ok(());
    };
    let Some(organization_id) = resolve_organization(ctx, organizations, organization).await? else {
        ctx.skip(kind, entity_id, missing_organization_name());
        return Ok(());
    };

    let registered_at = registration_instant(entity);
    if let Some(role) = idp_role {
        sync_identity_provider(ctx, entity_id, organization_id, role, registered_at).await?;
    }
    if let Some(role) = sp_role {
        sync_service_provider(ctx, entity_id, organization_id, role, registered_at).await?;
    }
    Ok(())
}

fn missing_organization_name() -> SkipReason {
    SkipReason::MissingKey {
        field: "OrganizationName".to_string(),
    }
}

/// Resolves an entity's organization by its `OrganizationName`, once per
/// domain per pass.
async fn resolve_organization(
    ctx: &mut SyncContext<'_>,
    resolved: &mut BTreeMap<String, Uuid>,
    organization: &Element,
) -> SyncResult<Option<Uuid>> {
    let Some(domain) = organization
        .child(MD, "OrganizationName")
        .map(Element::text)
        .filter(|d| !d.is_empty())
    else {
        return Ok(None);
    };
    if let Some(id) = resolved.get(&domain) {
        return Ok(Some(*id));
    }

    let name = english_text(organization.children_named(MD, "OrganizationDisplayName"));
    let organization = ctx
        .arbiter
        .resolve_metadata(ctx.tx, &domain, name.as_deref())
        .await?;
    ctx.record(EntityKind::Organization, organization.outcome);
    resolved.insert(domain, organization.entity.id);
    Ok(Some(organization.entity.id))
}

async fn sync_identity_provider(
    ctx: &mut SyncContext<'_>,
    entity_id: &str,
    organization_id: Uuid,
    role: &Element,
    registered_at: Option<DateTime<Utc>>,
) -> SyncResult<()> {
    let name = display_name(ui_display_name(role).as_deref(), entity_id);
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
        role.children_named(SAML, "Attribute")
            .filter_map(friendly_name)
            .map(|name| DeclaredAttribute::new(name, false)),
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
    stamp_activation(ctx, object, registered_at).await
}

async fn sync_service_provider(
    ctx: &mut SyncContext<'_>,
    entity_id: &str,
    organization_id: Uuid,
    role: &Element,
    registered_at: Option<DateTime<Utc>>,
) -> SyncResult<()> {
    let name = display_name(ui_display_name(role).as_deref(), entity_id);
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
        role.find_all(&[(MD, "AttributeConsumingService"), (MD, "RequestedAttribute")])
            .into_iter()
            .filter_map(|requested| {
                let required = matches!(requested.attribute("isRequired"), Some("true" | "1"));
                friendly_name(requested).map(|name| DeclaredAttribute::new(name, required))
            }),
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
    stamp_activation(ctx, object, registered_at).await
}

/// Metadata activations run from the registration instant and are always
/// open. Without an instant the configured policy decides.
async fn stamp_activation(
    ctx: &mut SyncContext<'_>,
    object: FederationObjectRef,
    registered_at: Option<DateTime<Utc>>,
) -> SyncResult<()> {
    match (registered_at, ctx.settings.missing_registration_date) {
        (Some(at), _) => ctx.activate(object, at, None).await,
        (None, MissingRegistrationDate::ActivateNow) => ctx.ensure_active(object).await,
        (None, MissingRegistrationDate::LeaveUnchanged) => {
            debug!(%object, "no registration instant, activation left unchanged");
            Ok(())
        }
    }
}

fn friendly_name(attribute: &Element) -> Option<&str> {
    attribute
        .attribute("FriendlyName")
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

fn ui_display_name(role: &Element) -> Option<String> {
    role.find(&[(MD, "Extensions"), (MDUI, "UIInfo")])
        .and_then(|ui| english_text(ui.children_named(MDUI, "DisplayName")))
}

fn registration_instant(entity: &Element) -> Option<DateTime<Utc>> {
    let instant = entity
        .find(&[(MD, "Extensions"), (MDRPI, "RegistrationInfo")])?
        .attribute("registrationInstant")?;
    match DateTime::parse_from_rfc3339(instant.trim()) {
        Ok(at) => Some(at.with_timezone(&Utc)),
        Err(err) => {
            debug!(instant, error = %err, "unparseable registration instant");
            None
        }
    }
}

/// Picks the text of a localized element: `xml:lang="en"`, then any `en*`
/// language, then whatever comes first.
fn english_text<'a>(elements: impl Iterator<Item = &'a Element>) -> Option<String> {
    let candidates: Vec<(Option<&str>, String)> = elements
        .map(|e| (e.lang(), e.text()))
        .filter(|(_, text)| !text.is_empty())
        .collect();

    candidates
        .iter()
        .find(|(lang, _)| *lang == Some("en"))
        .or_else(|| {
            candidates
                .iter()
                .find(|(lang, _)| lang.is_some_and(|l| l.starts_with("en")))
        })
        .or_else(|| candidates.first())
        .map(|(_, text)| text.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fedsync_metadata::{MetadataError, MetadataResult};
    use fedsync_model::SamlAttribute;
    use fedsync_storage::{FederationStore, MemoryFederationStore};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{SyncError, SyncSettings, Synchronizer};

    struct Document(&'static str);

    #[async_trait]
    impl MetadataSource for Document {
        async fn fetch(&self) -> MetadataResult<DocumentTree> {
            DocumentTree::parse(self.0)
        }
    }

    struct Tampered;

    #[async_trait]
    impl MetadataSource for Tampered {
        async fn fetch(&self) -> MetadataResult<DocumentTree> {
            Err(MetadataError::signature("digest value mismatch"))
        }
    }

    const FEED: &str = r#"<?xml version="1.0"?>
<md:EntitiesDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
    xmlns:mdui="urn:oasis:names:tc:SAML:metadata:ui"
    xmlns:mdrpi="urn:oasis:names:tc:SAML:metadata:rpi">
  <md:EntityDescriptor entityID="https://idp.example.edu/idp/shibboleth">
    <md:Extensions>
      <mdrpi:RegistrationInfo registrationAuthority="https://federation.example.org"
          registrationInstant="2019-04-01T00:00:00Z"/>
    </md:Extensions>
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
      <md:Extensions>
        <mdui:UIInfo>
          <mdui:DisplayName xml:lang="mi">Te Whare Wānanga</mdui:DisplayName>
          <mdui:DisplayName xml:lang="en-NZ">Example University IdP</mdui:DisplayName>
        </mdui:UIInfo>
      </md:Extensions>
      <saml:Attribute Name="urn:oid:0.9.2342.19200300.100.1.3" FriendlyName="mail"/>
      <saml:Attribute Name="urn:oid:1.3.6.1.4.1.5923.1.1.1.16" FriendlyName="eduPersonOrcid"/>
    </md:IDPSSODescriptor>
    <md:Organization>
      <md:OrganizationName xml:lang="en">example.edu</md:OrganizationName>
      <md:OrganizationDisplayName xml:lang="en">Example University</md:OrganizationDisplayName>
    </md:Organization>
  </md:EntityDescriptor>
  <md:EntityDescriptor entityID="https://sp.example.edu/shibboleth">
    <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
      <md:AttributeConsumingService index="1">
        <md:ServiceName xml:lang="en">Portal</md:ServiceName>
        <md:RequestedAttribute FriendlyName="mail" isRequired="true"/>
        <md:RequestedAttribute FriendlyName="displayName" isRequired="false"/>
      </md:AttributeConsumingService>
    </md:SPSSODescriptor>
    <md:Organization>
      <md:OrganizationName xml:lang="en">example.edu</md:OrganizationName>
      <md:OrganizationDisplayName xml:lang="en">Example University</md:OrganizationDisplayName>
    </md:Organization>
  </md:EntityDescriptor>
  <md:EntityDescriptor entityID="https://orphan.example.org/shibboleth">
    <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol"/>
  </md:EntityDescriptor>
</md:EntitiesDescriptor>"#;

    async fn seeded_store() -> MemoryFederationStore {
        let store = MemoryFederationStore::new();
        let mut tx = store.begin().await.unwrap();
        for name in ["mail", "displayName"] {
            tx.insert_attribute(&SamlAttribute::new(name)).await.unwrap();
        }
        tx.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn metadata_pass_maps_entities() {
        let store = seeded_store().await;
        let sync = Synchronizer::new(Arc::new(store.clone()), SyncSettings::default());

        let report = sync.run(&MetadataSync::new(Document(FEED))).await.unwrap();
        let state = store.snapshot().await;

        let org = state.organization_by_domain("example.edu").unwrap();
        assert_eq!(org.identifier, "metadata_example_edu");
        assert_eq!(org.name, "Example University");
        assert_eq!(report.counts(EntityKind::Organization).created, 1);
        assert!(state.activations_of(org.object_ref()).is_empty());

        let idp = state
            .identity_provider("https://idp.example.edu/idp/shibboleth")
            .unwrap();
        assert_eq!(idp.name, "Example University IdP");
        assert_eq!(idp.organization_id, org.id);
        let activations = state.activations_of(idp.object_ref());
        assert_eq!(activations.len(), 1);
        assert_eq!(
            activations[0].activated_at,
            DateTime::parse_from_rfc3339("2019-04-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );

        let sp = state.service_provider("https://sp.example.edu/shibboleth").unwrap();
        assert_eq!(sp.name, sp.entity_id);
        let associations = state.associations_of(AssociationOwner::ServiceProvider(sp.id));
        assert_eq!(associations.len(), 2);
        let mail = state.attribute("mail").unwrap();
        let mail_association = associations
            .iter()
            .find(|a| a.saml_attribute_id == mail.id)
            .unwrap();
        assert!(!mail_association.optional);
        assert!(state.activations_of(sp.object_ref()).is_empty());

        assert!(state.service_provider("https://orphan.example.org/shibboleth").is_none());
        let reasons: Vec<_> = report.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::UnknownAttributeReference {
                    attribute: "eduPersonOrcid".to_string()
                },
                missing_organization_name(),
            ]
        );
    }

    #[tokio::test]
    async fn activate_now_policy_covers_undated_entities() {
        let store = seeded_store().await;
        let settings = SyncSettings {
            missing_registration_date: MissingRegistrationDate::ActivateNow,
            ..SyncSettings::default()
        };
        let now = Utc::now();
        let sync = Synchronizer::new(Arc::new(store.clone()), settings).at(now);

        sync.run(&MetadataSync::new(Document(FEED))).await.unwrap();
        let state = store.snapshot().await;
        let sp = state.service_provider("https://sp.example.edu/shibboleth").unwrap();
        let activations = state.activations_of(sp.object_ref());

        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].activated_at, now);
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let store = seeded_store().await;
        let sync = Synchronizer::new(Arc::new(store.clone()), SyncSettings::default());
        sync.run(&MetadataSync::new(Document(FEED))).await.unwrap();
        let before = store.snapshot().await;

        let report = sync.run(&MetadataSync::new(Document(FEED))).await.unwrap();

        assert!(!report.has_changes());
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn signature_failure_aborts_before_writing() {
        let store = seeded_store().await;
        let before = store.snapshot().await;
        let sync = Synchronizer::new(Arc::new(store.clone()), SyncSettings::default());

        let err = sync.run(&MetadataSync::new(Tampered)).await.unwrap_err();

        assert!(matches!(err, SyncError::SignatureInvalid(_)));
        assert_eq!(store.snapshot().await, before);
    }

    #[test]
    fn english_text_prefers_exact_then_prefix_then_first() {
        let tree = DocumentTree::parse(
            r#"<r>
                 <n xml:lang="de">Beispiel</n>
                 <n xml:lang="en-AU">Example AU</n>
                 <n xml:lang="en">Example</n>
               </r>"#,
        )
        .unwrap();
        let names: Vec<&Element> = tree.root().children().collect();

        assert_eq!(english_text(names.iter().copied()).as_deref(), Some("Example"));
        assert_eq!(
            english_text(names[..2].iter().copied()).as_deref(),
            Some("Example AU")
        );
        assert_eq!(english_text(names[..1].iter().copied()).as_deref(), Some("Beispiel"));
        assert_eq!(english_text(std::iter::empty()), None);
    }
}
