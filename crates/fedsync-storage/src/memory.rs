//! In-memory federation store.
//!
//! A transaction takes the store lock for its whole lifetime and works on a
//! private copy of the state. Commit swaps the copy in; rollback (or drop)
//! discards it. Transactions are therefore serializable by construction.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedsync_model::{
    Activation, AssociationOwner, AttributeAssociation, FederationObjectKind, FederationObjectRef,
    GenericService, IdentityProvider, Organization, SamlAttribute, ServiceProvider,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::activation::ActivationRepository;
use crate::attribute::{AssociationRepository, SamlAttributeRepository};
use crate::error::{StorageError, StorageResult};
use crate::organization::OrganizationRepository;
use crate::provider::{IdentityProviderRepository, ServiceProviderRepository};
use crate::service::GenericServiceRepository;
use crate::transaction::{FederationStore, StoreTransaction};

/// The full contents of a [`MemoryFederationStore`], keyed by row ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    /// Organizations.
    pub organizations: BTreeMap<Uuid, Organization>,
    /// Identity providers.
    pub identity_providers: BTreeMap<Uuid, IdentityProvider>,
    /// Service providers.
    pub service_providers: BTreeMap<Uuid, ServiceProvider>,
    /// Generic services.
    pub generic_services: BTreeMap<Uuid, GenericService>,
    /// Attribute definitions.
    pub attributes: BTreeMap<Uuid, SamlAttribute>,
    /// Provider attribute associations.
    pub associations: BTreeMap<Uuid, AttributeAssociation>,
    /// Activations.
    pub activations: BTreeMap<Uuid, Activation>,
}

impl MemorySnapshot {
    /// Finds an organization by domain.
    #[must_use]
    pub fn organization_by_domain(&self, domain: &str) -> Option<&Organization> {
        self.organizations
            .values()
            .find(|o| o.domain.as_deref() == Some(domain))
    }

    /// Finds an identity provider by entity ID.
    #[must_use]
    pub fn identity_provider(&self, entity_id: &str) -> Option<&IdentityProvider> {
        self.identity_providers
            .values()
            .find(|p| p.entity_id == entity_id)
    }

    /// Finds a service provider by entity ID.
    #[must_use]
    pub fn service_provider(&self, entity_id: &str) -> Option<&ServiceProvider> {
        self.service_providers
            .values()
            .find(|p| p.entity_id == entity_id)
    }

    /// Finds an attribute definition by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&SamlAttribute> {
        self.attributes.values().find(|a| a.name == name)
    }

    /// Returns the activations of one object.
    #[must_use]
    pub fn activations_of(&self, object: FederationObjectRef) -> Vec<&Activation> {
        self.activations
            .values()
            .filter(|a| a.federation_object == object)
            .collect()
    }

    /// Returns the associations of one provider.
    #[must_use]
    pub fn associations_of(&self, owner: AssociationOwner) -> Vec<&AttributeAssociation> {
        self.associations
            .values()
            .filter(|a| a.owner == owner)
            .collect()
    }

    /// Returns the names of the attributes associated with one provider.
    #[must_use]
    pub fn attribute_names_of(&self, owner: AssociationOwner) -> BTreeSet<String> {
        self.associations_of(owner)
            .into_iter()
            .filter_map(|a| self.attributes.get(&a.saml_attribute_id))
            .map(|a| a.name.clone())
            .collect()
    }

    /// Returns the total number of rows across all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.organizations.len()
            + self.identity_providers.len()
            + self.service_providers.len()
            + self.generic_services.len()
            + self.attributes.len()
            + self.associations.len()
            + self.activations.len()
    }
}

/// In-memory [`FederationStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryFederationStore {
    state: Arc<Mutex<MemorySnapshot>>,
}

impl MemoryFederationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `snapshot`.
    #[must_use]
    pub fn with_snapshot(snapshot: MemorySnapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(snapshot)),
        }
    }

    /// Returns a copy of the committed state.
    ///
    /// Waits for any open transaction to finish.
    pub async fn snapshot(&self) -> MemorySnapshot {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl FederationStore for MemoryFederationStore {
    async fn begin(&self) -> StorageResult<Box<dyn StoreTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

/// A transaction over a [`MemoryFederationStore`].
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemorySnapshot>,
    working: MemorySnapshot,
}

impl MemoryTransaction {
    fn require_organization(&self, id: Uuid) -> StorageResult<()> {
        if self.working.organizations.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::Reference(format!("organization {id} does not exist")))
        }
    }

    /// Identifier and domain are unique across organizations.
    fn require_unique_organization(&self, organization: &Organization) -> StorageResult<()> {
        let others = self
            .working
            .organizations
            .values()
            .filter(|o| o.id != organization.id);
        for other in others {
            if other.identifier == organization.identifier {
                return Err(StorageError::duplicate(
                    "Organization",
                    "identifier",
                    &organization.identifier,
                ));
            }
            if let Some(domain) = &organization.domain {
                if other.domain.as_ref() == Some(domain) {
                    return Err(StorageError::duplicate("Organization", "domain", domain));
                }
            }
        }
        Ok(())
    }

    fn require_owner(&self, owner: AssociationOwner) -> StorageResult<()> {
        let exists = match owner {
            AssociationOwner::IdentityProvider(id) => {
                self.working.identity_providers.contains_key(&id)
            }
            AssociationOwner::ServiceProvider(id) => {
                self.working.service_providers.contains_key(&id)
            }
        };
        if exists {
            Ok(())
        } else {
            Err(StorageError::Reference(format!("provider {} does not exist", owner.id())))
        }
    }
}

/// Replaces an existing row, failing when it is absent.
fn replace<T: Clone>(
    table: &mut BTreeMap<Uuid, T>,
    entity_type: &'static str,
    id: Uuid,
    row: &T,
) -> StorageResult<()> {
    match table.get_mut(&id) {
        Some(existing) => {
            *existing = row.clone();
            Ok(())
        }
        None => Err(StorageError::not_found(entity_type, id)),
    }
}

#[async_trait]
impl OrganizationRepository for MemoryTransaction {
    async fn find_organization(&mut self, id: Uuid) -> StorageResult<Option<Organization>> {
        Ok(self.working.organizations.get(&id).cloned())
    }

    async fn find_organization_by_identifier(
        &mut self,
        identifier: &str,
    ) -> StorageResult<Option<Organization>> {
        Ok(self
            .working
            .organizations
            .values()
            .find(|o| o.identifier == identifier)
            .cloned())
    }

    async fn find_organization_by_domain(
        &mut self,
        domain: &str,
    ) -> StorageResult<Option<Organization>> {
        Ok(self.working.organization_by_domain(domain).cloned())
    }

    async fn insert_organization(&mut self, organization: &Organization) -> StorageResult<()> {
        organization.validate()?;
        self.require_unique_organization(organization)?;
        self.working
            .organizations
            .insert(organization.id, organization.clone());
        Ok(())
    }

    async fn update_organization(&mut self, organization: &Organization) -> StorageResult<()> {
        organization.validate()?;
        self.require_unique_organization(organization)?;
        replace(
            &mut self.working.organizations,
            "Organization",
            organization.id,
            organization,
        )
    }

    async fn delete_organization(&mut self, id: Uuid) -> StorageResult<()> {
        if !self.working.organizations.contains_key(&id) {
            return Err(StorageError::not_found("Organization", id));
        }
        let referenced = self
            .working
            .identity_providers
            .values()
            .any(|p| p.organization_id == id)
            || self
                .working
                .service_providers
                .values()
                .any(|p| p.organization_id == id)
            || self
                .working
                .generic_services
                .values()
                .any(|s| s.organization_id == Some(id));
        if referenced {
            return Err(StorageError::Reference(format!(
                "organization {id} is still referenced"
            )));
        }
        let object = FederationObjectRef::new(FederationObjectKind::Organization, id);
        self.working
            .activations
            .retain(|_, a| a.federation_object != object);
        self.working.organizations.remove(&id);
        Ok(())
    }

    async fn list_organizations(&mut self) -> StorageResult<Vec<Organization>> {
        Ok(self.working.organizations.values().cloned().collect())
    }
}

#[async_trait]
impl IdentityProviderRepository for MemoryTransaction {
    async fn find_identity_provider_by_entity_id(
        &mut self,
        entity_id: &str,
    ) -> StorageResult<Option<IdentityProvider>> {
        Ok(self.working.identity_provider(entity_id).cloned())
    }

    async fn insert_identity_provider(&mut self, provider: &IdentityProvider) -> StorageResult<()> {
        provider.validate()?;
        self.require_organization(provider.organization_id)?;
        if self.working.identity_provider(&provider.entity_id).is_some() {
            return Err(StorageError::duplicate(
                "IdentityProvider",
                "entity_id",
                &provider.entity_id,
            ));
        }
        self.working
            .identity_providers
            .insert(provider.id, provider.clone());
        Ok(())
    }

    async fn update_identity_provider(&mut self, provider: &IdentityProvider) -> StorageResult<()> {
        provider.validate()?;
        self.require_organization(provider.organization_id)?;
        if self
            .working
            .identity_provider(&provider.entity_id)
            .is_some_and(|p| p.id != provider.id)
        {
            return Err(StorageError::duplicate(
                "IdentityProvider",
                "entity_id",
                &provider.entity_id,
            ));
        }
        replace(
            &mut self.working.identity_providers,
            "IdentityProvider",
            provider.id,
            provider,
        )
    }

    async fn list_identity_providers(&mut self) -> StorageResult<Vec<IdentityProvider>> {
        Ok(self.working.identity_providers.values().cloned().collect())
    }
}

#[async_trait]
impl ServiceProviderRepository for MemoryTransaction {
    async fn find_service_provider_by_entity_id(
        &mut self,
        entity_id: &str,
    ) -> StorageResult<Option<ServiceProvider>> {
        Ok(self.working.service_provider(entity_id).cloned())
    }

    async fn insert_service_provider(&mut self, provider: &ServiceProvider) -> StorageResult<()> {
        provider.validate()?;
        self.require_organization(provider.organization_id)?;
        if self.working.service_provider(&provider.entity_id).is_some() {
            return Err(StorageError::duplicate(
                "ServiceProvider",
                "entity_id",
                &provider.entity_id,
            ));
        }
        self.working
            .service_providers
            .insert(provider.id, provider.clone());
        Ok(())
    }

    async fn update_service_provider(&mut self, provider: &ServiceProvider) -> StorageResult<()> {
        provider.validate()?;
        self.require_organization(provider.organization_id)?;
        if self
            .working
            .service_provider(&provider.entity_id)
            .is_some_and(|p| p.id != provider.id)
        {
            return Err(StorageError::duplicate(
                "ServiceProvider",
                "entity_id",
                &provider.entity_id,
            ));
        }
        replace(
            &mut self.working.service_providers,
            "ServiceProvider",
            provider.id,
            provider,
        )
    }

    async fn list_service_providers(&mut self) -> StorageResult<Vec<ServiceProvider>> {
        Ok(self.working.service_providers.values().cloned().collect())
    }
}

#[async_trait]
impl GenericServiceRepository for MemoryTransaction {
    async fn find_generic_service_by_identifier(
        &mut self,
        identifier: &str,
    ) -> StorageResult<Option<GenericService>> {
        Ok(self
            .working
            .generic_services
            .values()
            .find(|s| s.identifier == identifier)
            .cloned())
    }

    async fn insert_generic_service(&mut self, service: &GenericService) -> StorageResult<()> {
        service.validate()?;
        if let Some(org) = service.organization_id {
            self.require_organization(org)?;
        }
        if self
            .working
            .generic_services
            .values()
            .any(|s| s.identifier == service.identifier)
        {
            return Err(StorageError::duplicate(
                "GenericService",
                "identifier",
                &service.identifier,
            ));
        }
        self.working
            .generic_services
            .insert(service.id, service.clone());
        Ok(())
    }

    async fn update_generic_service(&mut self, service: &GenericService) -> StorageResult<()> {
        service.validate()?;
        if let Some(org) = service.organization_id {
            self.require_organization(org)?;
        }
        if self
            .working
            .generic_services
            .values()
            .any(|s| s.id != service.id && s.identifier == service.identifier)
        {
            return Err(StorageError::duplicate(
                "GenericService",
                "identifier",
                &service.identifier,
            ));
        }
        replace(
            &mut self.working.generic_services,
            "GenericService",
            service.id,
            service,
        )
    }

    async fn list_generic_services(&mut self) -> StorageResult<Vec<GenericService>> {
        Ok(self.working.generic_services.values().cloned().collect())
    }
}

#[async_trait]
impl SamlAttributeRepository for MemoryTransaction {
    async fn find_attribute_by_name(
        &mut self,
        name: &str,
    ) -> StorageResult<Option<SamlAttribute>> {
        Ok(self.working.attribute(name).cloned())
    }

    async fn insert_attribute(&mut self, attribute: &SamlAttribute) -> StorageResult<()> {
        attribute.validate()?;
        if self.working.attribute(&attribute.name).is_some() {
            return Err(StorageError::duplicate(
                "SamlAttribute",
                "name",
                &attribute.name,
            ));
        }
        self.working
            .attributes
            .insert(attribute.id, attribute.clone());
        Ok(())
    }

    async fn update_attribute(&mut self, attribute: &SamlAttribute) -> StorageResult<()> {
        attribute.validate()?;
        if self
            .working
            .attributes
            .values()
            .any(|a| a.id != attribute.id && a.name == attribute.name)
        {
            return Err(StorageError::duplicate(
                "SamlAttribute",
                "name",
                &attribute.name,
            ));
        }
        replace(
            &mut self.working.attributes,
            "SamlAttribute",
            attribute.id,
            attribute,
        )
    }

    async fn delete_attribute(&mut self, id: Uuid) -> StorageResult<()> {
        if self.working.attributes.remove(&id).is_none() {
            return Err(StorageError::not_found("SamlAttribute", id));
        }
        self.working
            .associations
            .retain(|_, a| a.saml_attribute_id != id);
        Ok(())
    }

    async fn list_attributes(&mut self) -> StorageResult<Vec<SamlAttribute>> {
        Ok(self.working.attributes.values().cloned().collect())
    }
}

#[async_trait]
impl AssociationRepository for MemoryTransaction {
    async fn list_associations(
        &mut self,
        owner: AssociationOwner,
    ) -> StorageResult<Vec<AttributeAssociation>> {
        Ok(self
            .working
            .associations_of(owner)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn insert_association(
        &mut self,
        association: &AttributeAssociation,
    ) -> StorageResult<()> {
        self.require_owner(association.owner)?;
        if !self
            .working
            .attributes
            .contains_key(&association.saml_attribute_id)
        {
            return Err(StorageError::Reference(format!(
                "attribute {} does not exist",
                association.saml_attribute_id
            )));
        }
        if self.working.associations.values().any(|a| {
            a.owner == association.owner && a.saml_attribute_id == association.saml_attribute_id
        }) {
            return Err(StorageError::duplicate(
                "AttributeAssociation",
                "saml_attribute_id",
                association.saml_attribute_id.to_string(),
            ));
        }
        self.working
            .associations
            .insert(association.id, association.clone());
        Ok(())
    }

    async fn update_association(
        &mut self,
        association: &AttributeAssociation,
    ) -> StorageResult<()> {
        replace(
            &mut self.working.associations,
            "AttributeAssociation",
            association.id,
            association,
        )
    }

    async fn delete_association(
        &mut self,
        association: &AttributeAssociation,
    ) -> StorageResult<()> {
        match self.working.associations.remove(&association.id) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(
                "AttributeAssociation",
                association.id,
            )),
        }
    }
}

#[async_trait]
impl ActivationRepository for MemoryTransaction {
    async fn find_activations(
        &mut self,
        object: FederationObjectRef,
    ) -> StorageResult<Vec<Activation>> {
        Ok(self
            .working
            .activations_of(object)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn insert_activation(&mut self, activation: &Activation) -> StorageResult<()> {
        activation.validate()?;
        if !self
            .working
            .activations_of(activation.federation_object)
            .is_empty()
        {
            return Err(StorageError::duplicate(
                "Activation",
                "federation_object",
                activation.federation_object.to_string(),
            ));
        }
        self.working
            .activations
            .insert(activation.id, activation.clone());
        Ok(())
    }

    async fn update_activation(&mut self, activation: &Activation) -> StorageResult<()> {
        activation.validate()?;
        replace(
            &mut self.working.activations,
            "Activation",
            activation.id,
            activation,
        )
    }

    async fn list_open_activations(
        &mut self,
        kind: FederationObjectKind,
        at: DateTime<Utc>,
    ) -> StorageResult<Vec<Activation>> {
        Ok(self
            .working
            .activations
            .values()
            .filter(|a| a.federation_object.kind == kind && a.is_open_at(at))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let Self { mut guard, working } = *self;
        *guard = working;
        tracing::trace!("memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        tracing::trace!("memory transaction rolled back");
        Ok(())
    }
}
