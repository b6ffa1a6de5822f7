//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fedsync_engine::{SyncSettings, Synchronizer};
use fedsync_metadata::{
    load_document, DocumentTree, MetadataResult, MetadataSource, TrustedCertificate,
};
use fedsync_registry::{
    AttributeCategory, AttributeConsumingService, IdentityProviderSaml, NamedAttribute,
    RegistryAttribute, RegistryError, RegistryIdentityProvider, RegistryOrganization,
    RegistryReference, RegistryResult, RegistryServiceProvider, RegistrySnapshot, RegistrySource,
    RequestedAttribute, SamlEntity, ServiceProviderSaml,
};
use fedsync_storage::MemoryFederationStore;

// ============================================================================
// Scripted sources
// ============================================================================

/// A registry that serves a fixed snapshot.
pub struct ScriptedRegistry(pub RegistrySnapshot);

#[async_trait]
impl RegistrySource for ScriptedRegistry {
    async fn organizations(&self) -> RegistryResult<Vec<RegistryOrganization>> {
        Ok(self.0.organizations.clone())
    }

    async fn identity_providers(&self) -> RegistryResult<Vec<RegistryIdentityProvider>> {
        Ok(self.0.identity_providers.clone())
    }

    async fn service_providers(&self) -> RegistryResult<Vec<RegistryServiceProvider>> {
        Ok(self.0.service_providers.clone())
    }

    async fn attributes(&self) -> RegistryResult<Vec<RegistryAttribute>> {
        Ok(self.0.attributes.clone())
    }
}

/// A registry that is down.
pub struct UnavailableRegistry;

#[async_trait]
impl RegistrySource for UnavailableRegistry {
    async fn organizations(&self) -> RegistryResult<Vec<RegistryOrganization>> {
        Err(RegistryError::Status {
            url: "https://registry.example.org/export/organizations".to_string(),
            status: 503,
        })
    }

    async fn identity_providers(&self) -> RegistryResult<Vec<RegistryIdentityProvider>> {
        Ok(Vec::new())
    }

    async fn service_providers(&self) -> RegistryResult<Vec<RegistryServiceProvider>> {
        Ok(Vec::new())
    }

    async fn attributes(&self) -> RegistryResult<Vec<RegistryAttribute>> {
        Ok(Vec::new())
    }
}

/// A metadata feed serving a fixed document, verified when a certificate is
/// configured.
pub struct ScriptedMetadata {
    pub xml: String,
    pub certificate: Option<TrustedCertificate>,
}

impl ScriptedMetadata {
    pub fn unsigned(xml: String) -> Self {
        Self {
            xml,
            certificate: None,
        }
    }
}

#[async_trait]
impl MetadataSource for ScriptedMetadata {
    async fn fetch(&self) -> MetadataResult<DocumentTree> {
        load_document(&self.xml, self.certificate.as_ref())
    }
}

// ============================================================================
// Environment
// ============================================================================

/// An in-memory store and a synchronizer writing to it.
pub struct TestEnv {
    pub store: MemoryFederationStore,
    pub sync: Synchronizer,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_settings(SyncSettings::default())
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("fedsync_engine=debug")
            .with_test_writer()
            .try_init();

        let store = MemoryFederationStore::new();
        let sync = Synchronizer::new(Arc::new(store.clone()), settings);
        Self { store, sync }
    }
}

// ============================================================================
// Registry records
// ============================================================================

pub fn registered() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2016-03-01T09:30:00Z")
        .map(|at| at.with_timezone(&Utc))
        .unwrap()
}

pub fn attribute(name: &str) -> RegistryAttribute {
    RegistryAttribute {
        name: name.to_string(),
        description: Some(format!("The {name} attribute.")),
        category: Some(AttributeCategory {
            name: "Core".to_string(),
        }),
    }
}

pub fn organization(id: i64, domain: &str, name: &str) -> RegistryOrganization {
    RegistryOrganization {
        id,
        display_name: Some(name.to_string()),
        domain: Some(domain.to_string()),
        functioning: true,
        created_at: registered(),
        updated_at: registered() + Duration::days(30),
    }
}

pub fn identity_provider(
    id: i64,
    organization: i64,
    entity_id: &str,
    attributes: &[&str],
) -> RegistryIdentityProvider {
    RegistryIdentityProvider {
        id,
        display_name: Some(format!("IdP {id}")),
        organization: RegistryReference { id: organization },
        saml: IdentityProviderSaml {
            entity: SamlEntity {
                entity_id: entity_id.to_string(),
            },
            attributes: attributes
                .iter()
                .map(|name| NamedAttribute {
                    name: (*name).to_string(),
                })
                .collect(),
        },
        functioning: true,
        created_at: registered(),
        updated_at: registered(),
    }
}

pub fn service_provider(
    id: i64,
    organization: i64,
    entity_id: &str,
    requested: &[(&str, bool)],
) -> RegistryServiceProvider {
    RegistryServiceProvider {
        id,
        display_name: Some(format!("SP {id}")),
        organization: RegistryReference { id: organization },
        saml: ServiceProviderSaml {
            entity: SamlEntity {
                entity_id: entity_id.to_string(),
            },
            attribute_consuming_services: vec![AttributeConsumingService {
                attributes: requested
                    .iter()
                    .map(|(name, is_required)| RequestedAttribute {
                        name: (*name).to_string(),
                        is_required: *is_required,
                    })
                    .collect(),
            }],
        },
        functioning: true,
        created_at: registered(),
        updated_at: registered(),
    }
}

/// One organization, one IdP and one SP, with three attribute definitions.
pub fn registry_snapshot() -> RegistrySnapshot {
    RegistrySnapshot {
        attributes: vec![attribute("mail"), attribute("displayName"), attribute("cn")],
        organizations: vec![organization(1, "example.edu", "Example University")],
        identity_providers: vec![identity_provider(
            10,
            1,
            "https://idp.example.edu/idp/shibboleth",
            &["mail", "displayName"],
        )],
        service_providers: vec![service_provider(
            20,
            1,
            "https://sp.example.edu/shibboleth",
            &[("mail", true), ("cn", false)],
        )],
    }
}

// ============================================================================
// Metadata documents
// ============================================================================

/// Role of a metadata entity.
#[derive(Debug, Clone, Copy)]
pub enum Role {
    IdentityProvider,
    ServiceProvider,
}

/// An `EntityDescriptor` to render.
#[derive(Debug, Clone)]
pub struct MetadataEntity {
    pub entity_id: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub domain: String,
    pub organization_name: String,
    pub registered: Option<String>,
    pub attributes: Vec<(String, bool)>,
}

impl MetadataEntity {
    pub fn idp(entity_id: &str, domain: &str, attributes: &[&str]) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            role: Role::IdentityProvider,
            display_name: None,
            domain: domain.to_string(),
            organization_name: "Example University".to_string(),
            registered: Some("2018-05-01T00:00:00Z".to_string()),
            attributes: attributes.iter().map(|a| ((*a).to_string(), false)).collect(),
        }
    }

    pub fn sp(entity_id: &str, domain: &str, requested: &[(&str, bool)]) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            role: Role::ServiceProvider,
            display_name: None,
            domain: domain.to_string(),
            organization_name: "Example University".to_string(),
            registered: Some("2018-05-01T00:00:00Z".to_string()),
            attributes: requested
                .iter()
                .map(|(name, required)| ((*name).to_string(), *required))
                .collect(),
        }
    }

    pub fn unregistered(mut self) -> Self {
        self.registered = None;
        self
    }
}

/// Renders a metadata aggregate.
pub fn metadata_feed(entities: &[MetadataEntity]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntitiesDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
    xmlns:mdui="urn:oasis:names:tc:SAML:metadata:ui"
    xmlns:mdrpi="urn:oasis:names:tc:SAML:metadata:rpi" Name="urn:example:federation">
"#,
    );

    for entity in entities {
        let _ = writeln!(xml, r#"  <md:EntityDescriptor entityID="{}">"#, entity.entity_id);
        if let Some(instant) = &entity.registered {
            let _ = writeln!(
                xml,
                r#"    <md:Extensions><mdrpi:RegistrationInfo registrationAuthority="urn:example:federation" registrationInstant="{instant}"/></md:Extensions>"#
            );
        }

        let (element, protocol) = match entity.role {
            Role::IdentityProvider => ("IDPSSODescriptor", "urn:oasis:names:tc:SAML:2.0:protocol"),
            Role::ServiceProvider => ("SPSSODescriptor", "urn:oasis:names:tc:SAML:2.0:protocol"),
        };
        let _ = writeln!(xml, r#"    <md:{element} protocolSupportEnumeration="{protocol}">"#);
        if let Some(name) = &entity.display_name {
            let _ = writeln!(
                xml,
                r#"      <md:Extensions><mdui:UIInfo><mdui:DisplayName xml:lang="en">{name}</mdui:DisplayName></mdui:UIInfo></md:Extensions>"#
            );
        }
        match entity.role {
            Role::IdentityProvider => {
                for (name, _) in &entity.attributes {
                    let _ = writeln!(
                        xml,
                        r#"      <saml:Attribute Name="urn:example:{name}" FriendlyName="{name}"/>"#
                    );
                }
            }
            Role::ServiceProvider => {
                xml.push_str("      <md:AttributeConsumingService index=\"1\">\n");
                for (name, required) in &entity.attributes {
                    let _ = writeln!(
                        xml,
                        r#"        <md:RequestedAttribute Name="urn:example:{name}" FriendlyName="{name}" isRequired="{required}"/>"#
                    );
                }
                xml.push_str("      </md:AttributeConsumingService>\n");
            }
        }
        let _ = writeln!(xml, "    </md:{element}>");

        let _ = writeln!(
            xml,
            r#"    <md:Organization>
      <md:OrganizationName xml:lang="en">{}</md:OrganizationName>
      <md:OrganizationDisplayName xml:lang="en">{}</md:OrganizationDisplayName>
      <md:OrganizationURL xml:lang="en">https://{}/</md:OrganizationURL>
    </md:Organization>
  </md:EntityDescriptor>"#,
            entity.domain, entity.organization_name, entity.domain
        );
    }

    xml.push_str("</md:EntitiesDescriptor>\n");
    xml
}
