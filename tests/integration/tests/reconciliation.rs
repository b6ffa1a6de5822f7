//! Reconciliation properties over the in-memory store.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fedsync_core::MissingRegistrationDate;
use fedsync_engine::{
    EntityKind, MetadataSync, RegistrySync, SkipReason, SyncError, SyncSettings, Synchronizer,
};
use fedsync_metadata::TrustedCertificate;
use fedsync_model::{
    AssociationOwner, FederationObjectKind, IdentifierPolicy, DEFAULT_DESCRIPTION_LIMIT,
};
use fedsync_registry::RegistrySnapshot;
use pretty_assertions::assert_eq;

use crate::common::*;

const IDP: &str = "https://idp.example.edu/idp/shibboleth";
const SP: &str = "https://sp.example.edu/shibboleth";

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-01T02:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn registry(snapshot: RegistrySnapshot) -> RegistrySync<ScriptedRegistry> {
    RegistrySync::new(ScriptedRegistry(snapshot))
}

/// Registry pass that leaves SAML entities to the metadata feed.
fn registry_without_entities(snapshot: RegistrySnapshot) -> RegistrySync<ScriptedRegistry> {
    registry(snapshot).include_saml_entities(false)
}

fn metadata(entities: &[MetadataEntity]) -> MetadataSync<ScriptedMetadata> {
    MetadataSync::new(ScriptedMetadata::unsigned(metadata_feed(entities)))
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn registry_pass_is_idempotent() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());

    let first = sync.run(&registry(registry_snapshot())).await.unwrap();
    assert!(first.has_changes());
    assert_eq!(first.counts(EntityKind::SamlAttribute).created, 3);
    assert_eq!(first.activations_created, 3);
    assert_eq!(first.associations_created, 4);
    let after_first = env.store.snapshot().await;

    let second = sync.run(&registry(registry_snapshot())).await.unwrap();
    assert!(!second.has_changes());
    assert_eq!(second.counts(EntityKind::IdentityProvider).unchanged, 1);
    assert_eq!(env.store.snapshot().await, after_first);
}

#[tokio::test]
async fn metadata_pass_is_idempotent() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    sync.run(&registry_without_entities(registry_snapshot()))
        .await
        .unwrap();

    let feed = [
        MetadataEntity::idp(IDP, "example.edu", &["mail", "displayName"]),
        MetadataEntity::sp(SP, "example.edu", &[("mail", true), ("cn", false)]),
    ];
    let first = sync.run(&metadata(&feed)).await.unwrap();
    assert_eq!(first.counts(EntityKind::IdentityProvider).created, 1);
    assert_eq!(first.counts(EntityKind::ServiceProvider).created, 1);
    assert!(first.skipped.is_empty());
    let after_first = env.store.snapshot().await;

    let second = sync.run(&metadata(&feed)).await.unwrap();
    assert!(!second.has_changes());
    assert_eq!(env.store.snapshot().await, after_first);

    let sp = after_first.service_provider(SP).unwrap();
    let mut optional: Vec<bool> = after_first
        .associations_of(AssociationOwner::ServiceProvider(sp.id))
        .into_iter()
        .map(|a| a.optional)
        .collect();
    optional.sort_unstable();
    assert_eq!(optional, vec![false, true]);
}

// ============================================================================
// Identifier convergence
// ============================================================================

#[tokio::test]
async fn registry_replaces_temporary_identifier_from_metadata() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    let permanent = IdentifierPolicy::default().permanent(1).into_string();

    sync.run(&metadata(&[MetadataEntity::idp(IDP, "example.edu", &[])]))
        .await
        .unwrap();
    let seeded = env.store.snapshot().await;
    let temporary = seeded.organization_by_domain("example.edu").unwrap().clone();
    assert_eq!(temporary.identifier, "metadata_example_edu");

    let report = sync
        .run(&registry_without_entities(registry_snapshot()))
        .await
        .unwrap();
    assert_eq!(report.counts(EntityKind::Organization).updated, 1);

    let converged = env.store.snapshot().await;
    assert_eq!(converged.organizations.len(), 1);
    let organization = converged.organization_by_domain("example.edu").unwrap();
    assert_eq!(organization.id, temporary.id);
    assert_eq!(organization.identifier, permanent);

    let again = sync
        .run(&registry_without_entities(registry_snapshot()))
        .await
        .unwrap();
    assert_eq!(again.counts(EntityKind::Organization).updated, 0);
    let organization = env.store.snapshot().await;
    assert_eq!(
        organization
            .organization_by_domain("example.edu")
            .unwrap()
            .identifier,
        permanent
    );
}

#[tokio::test]
async fn metadata_never_rewrites_registry_identifier() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    let permanent = IdentifierPolicy::default().permanent(1).into_string();

    sync.run(&registry_without_entities(registry_snapshot()))
        .await
        .unwrap();
    let report = sync
        .run(&metadata(&[MetadataEntity::idp(IDP, "example.edu", &["mail"])]))
        .await
        .unwrap();
    assert_eq!(report.counts(EntityKind::Organization).created, 0);

    let snapshot = env.store.snapshot().await;
    assert_eq!(snapshot.organizations.len(), 1);
    let organization = snapshot.organization_by_domain("example.edu").unwrap();
    assert_eq!(organization.identifier, permanent);
    assert_eq!(
        snapshot.identity_provider(IDP).unwrap().organization_id,
        organization.id
    );
}

#[tokio::test]
async fn similar_domains_get_distinct_temporary_identifiers() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());

    let report = sync
        .run(&metadata(&[
            MetadataEntity::idp("https://idp.a.example.edu/idp", "a.example.edu", &[]),
            MetadataEntity::idp("https://idp.a-underscore.example.edu/idp", "a_example.edu", &[]),
        ]))
        .await
        .unwrap();
    assert_eq!(report.counts(EntityKind::Organization).created, 2);

    let snapshot = env.store.snapshot().await;
    let dotted = snapshot.organization_by_domain("a.example.edu").unwrap();
    let underscored = snapshot.organization_by_domain("a_example.edu").unwrap();
    assert_eq!(dotted.identifier, "metadata_a_example_edu");
    assert_eq!(underscored.identifier, "metadata_a-5fexample_edu");
    assert_eq!(
        snapshot
            .identity_provider("https://idp.a-underscore.example.edu/idp")
            .unwrap()
            .organization_id,
        underscored.id
    );
}

fn relocated(domain: &str) -> RegistrySnapshot {
    RegistrySnapshot {
        organizations: vec![organization(4, domain, "Relocated University")],
        ..registry_snapshot()
    }
}

#[tokio::test]
async fn registry_domain_move_absorbs_metadata_organization() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    let permanent = IdentifierPolicy::default().permanent(4).into_string();

    sync.run(&registry_without_entities(relocated("old.example.edu")))
        .await
        .unwrap();
    sync.run(&metadata(&[MetadataEntity::idp(IDP, "new.example.edu", &["mail"])]))
        .await
        .unwrap();
    let seeded = env.store.snapshot().await;
    assert_eq!(seeded.organizations.len(), 2);

    sync.run(&registry_without_entities(relocated("new.example.edu")))
        .await
        .unwrap();

    let merged = env.store.snapshot().await;
    assert_eq!(merged.organizations.len(), 1);
    let organization = merged.organization_by_domain("new.example.edu").unwrap();
    assert_eq!(organization.identifier, permanent);
    assert_eq!(
        merged.identity_provider(IDP).unwrap().organization_id,
        organization.id
    );
    assert!(merged.activations.values().all(|a| {
        a.federation_object.kind != FederationObjectKind::Organization
            || merged.organizations.contains_key(&a.federation_object.id)
    }));

    let report = sync
        .run(&metadata(&[MetadataEntity::idp(IDP, "new.example.edu", &["mail"])]))
        .await
        .unwrap();
    assert_eq!(report.counts(EntityKind::Organization).created, 0);
    assert_eq!(env.store.snapshot().await.organizations.len(), 1);
}

#[tokio::test]
async fn registry_organizations_cannot_share_a_domain() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());

    let mut snapshot = relocated("a.example.edu");
    snapshot
        .organizations
        .push(organization(5, "b.example.edu", "Other University"));
    sync.run(&registry_without_entities(snapshot.clone()))
        .await
        .unwrap();
    let before = env.store.snapshot().await;

    snapshot.organizations[1].domain = Some("a.example.edu".to_string());
    let err = sync
        .run(&registry_without_entities(snapshot))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::PersistenceValidation(_)));
    assert_eq!(env.store.snapshot().await, before);
}

// ============================================================================
// Sweep
// ============================================================================

#[tokio::test]
async fn omitted_identity_provider_is_deactivated_in_place() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    sync.run(&registry(registry_snapshot())).await.unwrap();

    let before = env.store.snapshot().await;
    let idp = before.identity_provider(IDP).unwrap().object_ref();
    let sp = before.service_provider(SP).unwrap().object_ref();

    let mut snapshot = registry_snapshot();
    snapshot.identity_providers.clear();
    let report = sync.run(&registry(snapshot)).await.unwrap();
    assert_eq!(report.counts(EntityKind::IdentityProvider).deactivated, 1);
    assert_eq!(report.counts(EntityKind::ServiceProvider).deactivated, 0);
    assert_eq!(report.activations_created, 0);

    let after = env.store.snapshot().await;
    let activations = after.activations_of(idp);
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].deactivated_at, Some(now()));
    assert!(after.activations_of(sp)[0].is_open_at(now()));
    assert_eq!(after.activations.len(), before.activations.len());

    let report = sync.run(&registry(registry_snapshot())).await.unwrap();
    assert_eq!(report.activations_updated, 1);
    let reopened = env.store.snapshot().await;
    let activations = reopened.activations_of(idp);
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].deactivated_at, None);
}

#[tokio::test]
async fn metadata_sweep_leaves_organizations_alone() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    sync.run(&registry_without_entities(registry_snapshot()))
        .await
        .unwrap();
    sync.run(&metadata(&[
        MetadataEntity::idp(IDP, "example.edu", &["mail"]),
        MetadataEntity::sp(SP, "example.edu", &[("mail", true)]),
    ]))
    .await
    .unwrap();

    let report = sync
        .run(&metadata(&[MetadataEntity::sp(SP, "example.edu", &[("mail", true)])]))
        .await
        .unwrap();
    assert_eq!(report.counts(EntityKind::IdentityProvider).deactivated, 1);
    assert_eq!(report.counts(EntityKind::Organization).deactivated, 0);

    let snapshot = env.store.snapshot().await;
    let organization = snapshot.organization_by_domain("example.edu").unwrap();
    assert!(snapshot.activations_of(organization.object_ref())[0].is_open_at(now()));
}

// ============================================================================
// Associations and boundaries
// ============================================================================

#[tokio::test]
async fn metadata_associations_are_fully_replaced() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    sync.run(&registry_without_entities(registry_snapshot()))
        .await
        .unwrap();

    sync.run(&metadata(&[MetadataEntity::idp(
        IDP,
        "example.edu",
        &["mail", "displayName"],
    )]))
    .await
    .unwrap();
    let before = env.store.snapshot().await;
    let owner = AssociationOwner::IdentityProvider(before.identity_provider(IDP).unwrap().id);
    let display_name_id = before.attribute("displayName").unwrap().id;
    let kept = before
        .associations_of(owner)
        .into_iter()
        .find(|a| a.saml_attribute_id == display_name_id)
        .unwrap()
        .clone();

    let report = sync
        .run(&metadata(&[MetadataEntity::idp(
            IDP,
            "example.edu",
            &["displayName", "cn"],
        )]))
        .await
        .unwrap();
    assert_eq!(report.associations_created, 1);
    assert_eq!(report.associations_deleted, 1);
    assert_eq!(report.associations_updated, 0);

    let after = env.store.snapshot().await;
    assert_eq!(
        after.attribute_names_of(owner),
        BTreeSet::from(["cn".to_string(), "displayName".to_string()])
    );
    let preserved = after
        .associations_of(owner)
        .into_iter()
        .find(|a| a.saml_attribute_id == display_name_id)
        .unwrap();
    assert_eq!(*preserved, kept);
}

#[tokio::test]
async fn unknown_attributes_are_skipped_not_fatal() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    sync.run(&registry_without_entities(registry_snapshot()))
        .await
        .unwrap();

    let report = sync
        .run(&metadata(&[MetadataEntity::idp(
            IDP,
            "example.edu",
            &["mail", "eduPersonOrcid"],
        )]))
        .await
        .unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key, IDP);
    assert_eq!(
        report.skipped[0].reason,
        SkipReason::UnknownAttributeReference {
            attribute: "eduPersonOrcid".to_string()
        }
    );

    let snapshot = env.store.snapshot().await;
    let owner = AssociationOwner::IdentityProvider(snapshot.identity_provider(IDP).unwrap().id);
    assert_eq!(snapshot.attribute_names_of(owner), BTreeSet::from(["mail".to_string()]));
}

#[tokio::test]
async fn provider_outside_the_pass_is_never_written() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    sync.run(&registry(registry_snapshot())).await.unwrap();
    let before = env.store.snapshot().await;

    let mut snapshot = registry_snapshot();
    snapshot.service_providers[0].organization.id = 99;
    snapshot.service_providers[0].display_name = Some("Moved".to_string());
    snapshot.service_providers.push(service_provider(
        21,
        99,
        "https://new-sp.example.edu/shibboleth",
        &[("mail", true)],
    ));
    let report = sync.run(&registry(snapshot)).await.unwrap();

    let orphans: Vec<_> = report
        .skipped
        .iter()
        .filter(|s| {
            s.reason
                == SkipReason::OrphanedChildRecord {
                    organization: "99".to_string(),
                }
        })
        .collect();
    assert_eq!(orphans.len(), 2);

    let after = env.store.snapshot().await;
    assert!(after
        .service_provider("https://new-sp.example.edu/shibboleth")
        .is_none());
    assert_eq!(after.service_provider(SP), before.service_provider(SP));
}

// ============================================================================
// Atomicity and fatal failures
// ============================================================================

#[tokio::test]
async fn persistence_failure_rolls_back_the_whole_pass() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    sync.run(&registry(registry_snapshot())).await.unwrap();
    let before = env.store.snapshot().await;

    let mut snapshot = registry_snapshot();
    snapshot.attributes.push(attribute("eduPersonAffiliation"));
    snapshot.organizations[0].display_name = Some("Renamed University".to_string());
    snapshot
        .organizations
        .push(organization(2, "other.example.org", "Other Org"));
    snapshot.identity_providers.push(identity_provider(
        11,
        2,
        "https://idp.other.example.org/idp/shibboleth",
        &["mail"],
    ));
    snapshot.identity_providers.push(identity_provider(12, 2, "", &["mail"]));

    let err = sync.run(&registry(snapshot)).await.unwrap_err();
    assert!(matches!(err, SyncError::PersistenceValidation(_)));
    assert_eq!(env.store.snapshot().await, before);
}

#[tokio::test]
async fn unverifiable_metadata_fails_before_touching_the_store() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    sync.run(&registry(registry_snapshot())).await.unwrap();
    let before = env.store.snapshot().await;

    let certificate = TrustedCertificate::from_pem(include_str!(
        "../../../crates/fedsync-metadata/testdata/signing-cert.pem"
    ))
    .unwrap();
    let source = ScriptedMetadata {
        xml: metadata_feed(&[]),
        certificate: Some(certificate),
    };

    let err = sync.run(&MetadataSync::new(source)).await.unwrap_err();
    assert!(matches!(err, SyncError::SignatureInvalid(_)));
    assert!(err.is_fatal_before_transaction());
    assert_eq!(env.store.snapshot().await, before);
}

#[tokio::test]
async fn unavailable_registry_fails_before_touching_the_store() {
    let env = TestEnv::new();
    let sync = env.sync.clone().at(now());
    sync.run(&registry(registry_snapshot())).await.unwrap();
    let before = env.store.snapshot().await;

    let err = sync
        .run(&RegistrySync::new(UnavailableRegistry))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::SourceUnavailable(_)));
    assert_eq!(env.store.snapshot().await, before);
}

#[tokio::test]
async fn dry_run_reports_without_committing() {
    let env = TestEnv::new();
    let report = env
        .sync
        .clone()
        .at(now())
        .dry_run(true)
        .run(&registry(registry_snapshot()))
        .await
        .unwrap();

    assert!(report.dry_run);
    assert!(report.has_changes());
    assert_eq!(report.counts(EntityKind::Organization).created, 1);
    assert!(report.status.contains("rolled back"));
    assert_eq!(env.store.snapshot().await.row_count(), 0);
}

// ============================================================================
// Descriptions
// ============================================================================

#[tokio::test]
async fn long_descriptions_are_normalized() {
    let env = TestEnv::new();
    let first = "Identifies the home organization of the user.";

    let mut sentence = attribute("schacHomeOrganization");
    sentence.description = Some(format!(
        "{first}\r\n{}",
        "Further detail about release policy follows here. ".repeat(10)
    ));
    let mut unbroken = attribute("eduPersonTargetedID");
    unbroken.description = Some("opaque ".repeat(80));
    let mut late_sentence = attribute("eduPersonPrincipalName");
    late_sentence.description = Some(format!("{}. Trailing.", "z".repeat(300)));

    let mut snapshot = registry_snapshot();
    snapshot.attributes.extend([sentence, unbroken, late_sentence]);
    env.sync.run(&registry(snapshot)).await.unwrap();

    let stored = env.store.snapshot().await;
    let description = |name: &str| {
        stored
            .attribute(name)
            .and_then(|a| a.description.clone())
            .unwrap()
    };

    assert_eq!(description("schacHomeOrganization"), first);

    let truncated = description("eduPersonTargetedID");
    assert_eq!(truncated.chars().count(), DEFAULT_DESCRIPTION_LIMIT);
    assert!(truncated.starts_with("opaque opaque"));

    assert_eq!(
        description("eduPersonPrincipalName"),
        "z".repeat(DEFAULT_DESCRIPTION_LIMIT)
    );
}

// ============================================================================
// Missing registration dates
// ============================================================================

/// Activates the IdP from metadata, then sweeps it with an empty feed.
async fn deactivated_identity_provider(env: &TestEnv) {
    let sync = env.sync.clone().at(now());
    sync.run(&metadata(&[MetadataEntity::idp(IDP, "example.edu", &[])]))
        .await
        .unwrap();
    sync.run(&metadata(&[])).await.unwrap();
}

#[tokio::test]
async fn undated_entity_stays_deactivated_by_default() {
    let env = TestEnv::new();
    deactivated_identity_provider(&env).await;

    let report = env
        .sync
        .clone()
        .at(now())
        .run(&metadata(&[
            MetadataEntity::idp(IDP, "example.edu", &[]).unregistered(),
            MetadataEntity::sp(SP, "example.edu", &[]).unregistered(),
        ]))
        .await
        .unwrap();
    assert_eq!(report.activations_created, 0);
    assert_eq!(report.activations_updated, 0);

    let snapshot = env.store.snapshot().await;
    let idp = snapshot.identity_provider(IDP).unwrap().object_ref();
    assert_eq!(snapshot.activations_of(idp)[0].deactivated_at, Some(now()));
    let sp = snapshot.service_provider(SP).unwrap().object_ref();
    assert!(snapshot.activations_of(sp).is_empty());
}

#[tokio::test]
async fn undated_entity_is_reactivated_when_configured() {
    let env = TestEnv::new();
    deactivated_identity_provider(&env).await;

    let later = now() + chrono::Duration::hours(1);
    let settings = SyncSettings {
        missing_registration_date: MissingRegistrationDate::ActivateNow,
        ..SyncSettings::default()
    };
    let report = Synchronizer::new(Arc::new(env.store.clone()), settings)
        .at(later)
        .run(&metadata(&[
            MetadataEntity::idp(IDP, "example.edu", &[]).unregistered()
        ]))
        .await
        .unwrap();
    assert_eq!(report.activations_updated, 1);

    let snapshot = env.store.snapshot().await;
    let idp = snapshot.identity_provider(IDP).unwrap().object_ref();
    let activations = snapshot.activations_of(idp);
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].activated_at, later);
    assert_eq!(activations[0].deactivated_at, None);
}
