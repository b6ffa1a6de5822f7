//! `PostgreSQL` implementation of the federation store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedsync_model::{
    Activation, AssociationOwner, AttributeAssociation, FederationObjectKind, FederationObjectRef,
    GenericService, IdentityProvider, Organization, SamlAttribute, ServiceProvider,
};
use fedsync_storage::{
    ActivationRepository, AssociationRepository, FederationStore, GenericServiceRepository,
    IdentityProviderRepository, OrganizationRepository, SamlAttributeRepository,
    ServiceProviderRepository, StorageError, StorageResult, StoreTransaction,
};
use sqlx::postgres::PgQueryResult;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::convert::association_from_row;
use crate::entities::{
    ActivationRow, AssociationRow, GenericServiceRow, OrganizationRow, ProviderRow,
    SamlAttributeRow,
};
use crate::error::from_sqlx_error;

/// `PostgreSQL` federation store.
#[derive(Debug, Clone)]
pub struct PgFederationStore {
    pool: PgPool,
}

impl PgFederationStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FederationStore for PgFederationStore {
    async fn begin(&self) -> StorageResult<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await.map_err(from_sqlx_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(from_sqlx_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// A `SERIALIZABLE` transaction over a [`PgFederationStore`].
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

/// Fails with `NotFound` when an update touched no row.
fn expect_row(result: &PgQueryResult, entity_type: &'static str, id: Uuid) -> StorageResult<()> {
    if result.rows_affected() == 0 {
        Err(StorageError::not_found(entity_type, id))
    } else {
        Ok(())
    }
}

/// Table and owner column of an association owner.
const fn association_table(owner: AssociationOwner) -> (&'static str, &'static str) {
    match owner {
        AssociationOwner::IdentityProvider(_) => {
            ("identity_provider_saml_attributes", "identity_provider_id")
        }
        AssociationOwner::ServiceProvider(_) => {
            ("service_provider_saml_attributes", "service_provider_id")
        }
    }
}

#[async_trait]
impl OrganizationRepository for PgTransaction {
    async fn find_organization(&mut self, id: Uuid) -> StorageResult<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(from_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_organization_by_identifier(
        &mut self,
        identifier: &str,
    ) -> StorageResult<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT * FROM organizations WHERE identifier = $1",
        )
        .bind(identifier)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_organization_by_domain(
        &mut self,
        domain: &str,
    ) -> StorageResult<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT * FROM organizations WHERE domain = $1",
        )
        .bind(domain)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn insert_organization(&mut self, organization: &Organization) -> StorageResult<()> {
        organization.validate()?;
        sqlx::query(
            r"INSERT INTO organizations (id, identifier, name, domain, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(organization.id)
        .bind(&organization.identifier)
        .bind(&organization.name)
        .bind(&organization.domain)
        .bind(organization.created_at)
        .bind(organization.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_organization(&mut self, organization: &Organization) -> StorageResult<()> {
        organization.validate()?;
        let result = sqlx::query(
            r"UPDATE organizations SET identifier = $2, name = $3, domain = $4, updated_at = $5
              WHERE id = $1",
        )
        .bind(organization.id)
        .bind(&organization.identifier)
        .bind(&organization.name)
        .bind(&organization.domain)
        .bind(organization.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        expect_row(&result, "Organization", organization.id)
    }

    async fn delete_organization(&mut self, id: Uuid) -> StorageResult<()> {
        // referencing providers make the delete fail with a foreign key error
        sqlx::query(
            r"DELETE FROM activations
              WHERE federation_object_type = $1 AND federation_object_id = $2",
        )
        .bind(FederationObjectKind::Organization.as_str())
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(from_sqlx_error)?;
        expect_row(&result, "Organization", id)
    }

    async fn list_organizations(&mut self) -> StorageResult<Vec<Organization>> {
        let rows = sqlx::query_as::<_, OrganizationRow>("SELECT * FROM organizations ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(from_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl IdentityProviderRepository for PgTransaction {
    async fn find_identity_provider_by_entity_id(
        &mut self,
        entity_id: &str,
    ) -> StorageResult<Option<IdentityProvider>> {
        let row = sqlx::query_as::<_, ProviderRow>(
            "SELECT * FROM identity_providers WHERE entity_id = $1",
        )
        .bind(entity_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn insert_identity_provider(&mut self, provider: &IdentityProvider) -> StorageResult<()> {
        provider.validate()?;
        sqlx::query(
            r"INSERT INTO identity_providers
                (id, entity_id, name, organization_id, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(provider.id)
        .bind(&provider.entity_id)
        .bind(&provider.name)
        .bind(provider.organization_id)
        .bind(provider.created_at)
        .bind(provider.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_identity_provider(&mut self, provider: &IdentityProvider) -> StorageResult<()> {
        provider.validate()?;
        let result = sqlx::query(
            r"UPDATE identity_providers
              SET entity_id = $2, name = $3, organization_id = $4, updated_at = $5
              WHERE id = $1",
        )
        .bind(provider.id)
        .bind(&provider.entity_id)
        .bind(&provider.name)
        .bind(provider.organization_id)
        .bind(provider.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        expect_row(&result, "IdentityProvider", provider.id)
    }

    async fn list_identity_providers(&mut self) -> StorageResult<Vec<IdentityProvider>> {
        let rows =
            sqlx::query_as::<_, ProviderRow>("SELECT * FROM identity_providers ORDER BY id")
                .fetch_all(&mut *self.tx)
                .await
                .map_err(from_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ServiceProviderRepository for PgTransaction {
    async fn find_service_provider_by_entity_id(
        &mut self,
        entity_id: &str,
    ) -> StorageResult<Option<ServiceProvider>> {
        let row = sqlx::query_as::<_, ProviderRow>(
            "SELECT * FROM service_providers WHERE entity_id = $1",
        )
        .bind(entity_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn insert_service_provider(&mut self, provider: &ServiceProvider) -> StorageResult<()> {
        provider.validate()?;
        sqlx::query(
            r"INSERT INTO service_providers
                (id, entity_id, name, organization_id, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(provider.id)
        .bind(&provider.entity_id)
        .bind(&provider.name)
        .bind(provider.organization_id)
        .bind(provider.created_at)
        .bind(provider.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_service_provider(&mut self, provider: &ServiceProvider) -> StorageResult<()> {
        provider.validate()?;
        let result = sqlx::query(
            r"UPDATE service_providers
              SET entity_id = $2, name = $3, organization_id = $4, updated_at = $5
              WHERE id = $1",
        )
        .bind(provider.id)
        .bind(&provider.entity_id)
        .bind(&provider.name)
        .bind(provider.organization_id)
        .bind(provider.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        expect_row(&result, "ServiceProvider", provider.id)
    }

    async fn list_service_providers(&mut self) -> StorageResult<Vec<ServiceProvider>> {
        let rows = sqlx::query_as::<_, ProviderRow>("SELECT * FROM service_providers ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(from_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl GenericServiceRepository for PgTransaction {
    async fn find_generic_service_by_identifier(
        &mut self,
        identifier: &str,
    ) -> StorageResult<Option<GenericService>> {
        let row = sqlx::query_as::<_, GenericServiceRow>(
            "SELECT * FROM generic_services WHERE identifier = $1",
        )
        .bind(identifier)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn insert_generic_service(&mut self, service: &GenericService) -> StorageResult<()> {
        service.validate()?;
        sqlx::query(
            r"INSERT INTO generic_services
                (id, identifier, name, service_type, organization_id, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(service.id)
        .bind(&service.identifier)
        .bind(&service.name)
        .bind(&service.service_type)
        .bind(service.organization_id)
        .bind(service.created_at)
        .bind(service.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_generic_service(&mut self, service: &GenericService) -> StorageResult<()> {
        service.validate()?;
        let result = sqlx::query(
            r"UPDATE generic_services
              SET identifier = $2, name = $3, service_type = $4, organization_id = $5,
                  updated_at = $6
              WHERE id = $1",
        )
        .bind(service.id)
        .bind(&service.identifier)
        .bind(&service.name)
        .bind(&service.service_type)
        .bind(service.organization_id)
        .bind(service.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        expect_row(&result, "GenericService", service.id)
    }

    async fn list_generic_services(&mut self) -> StorageResult<Vec<GenericService>> {
        let rows =
            sqlx::query_as::<_, GenericServiceRow>("SELECT * FROM generic_services ORDER BY id")
                .fetch_all(&mut *self.tx)
                .await
                .map_err(from_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl SamlAttributeRepository for PgTransaction {
    async fn find_attribute_by_name(
        &mut self,
        name: &str,
    ) -> StorageResult<Option<SamlAttribute>> {
        let row =
            sqlx::query_as::<_, SamlAttributeRow>("SELECT * FROM saml_attributes WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(from_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn insert_attribute(&mut self, attribute: &SamlAttribute) -> StorageResult<()> {
        attribute.validate()?;
        sqlx::query(
            r"INSERT INTO saml_attributes (id, name, core, description, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(attribute.id)
        .bind(&attribute.name)
        .bind(attribute.core)
        .bind(&attribute.description)
        .bind(attribute.created_at)
        .bind(attribute.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_attribute(&mut self, attribute: &SamlAttribute) -> StorageResult<()> {
        attribute.validate()?;
        let result = sqlx::query(
            r"UPDATE saml_attributes SET name = $2, core = $3, description = $4, updated_at = $5
              WHERE id = $1",
        )
        .bind(attribute.id)
        .bind(&attribute.name)
        .bind(attribute.core)
        .bind(&attribute.description)
        .bind(attribute.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        expect_row(&result, "SamlAttribute", attribute.id)
    }

    async fn delete_attribute(&mut self, id: Uuid) -> StorageResult<()> {
        // associations go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM saml_attributes WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(from_sqlx_error)?;
        expect_row(&result, "SamlAttribute", id)
    }

    async fn list_attributes(&mut self) -> StorageResult<Vec<SamlAttribute>> {
        let rows =
            sqlx::query_as::<_, SamlAttributeRow>("SELECT * FROM saml_attributes ORDER BY id")
                .fetch_all(&mut *self.tx)
                .await
                .map_err(from_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl AssociationRepository for PgTransaction {
    async fn list_associations(
        &mut self,
        owner: AssociationOwner,
    ) -> StorageResult<Vec<AttributeAssociation>> {
        let sql = match owner {
            AssociationOwner::IdentityProvider(_) => {
                r"SELECT id, identity_provider_id AS owner_id, saml_attribute_id,
                         FALSE AS optional, created_at, updated_at
                  FROM identity_provider_saml_attributes
                  WHERE identity_provider_id = $1 ORDER BY id"
            }
            AssociationOwner::ServiceProvider(_) => {
                r"SELECT id, service_provider_id AS owner_id, saml_attribute_id,
                         optional, created_at, updated_at
                  FROM service_provider_saml_attributes
                  WHERE service_provider_id = $1 ORDER BY id"
            }
        };
        let owner_kind: fn(Uuid) -> AssociationOwner = match owner {
            AssociationOwner::IdentityProvider(_) => AssociationOwner::IdentityProvider,
            AssociationOwner::ServiceProvider(_) => AssociationOwner::ServiceProvider,
        };

        let rows = sqlx::query_as::<_, AssociationRow>(sql)
            .bind(owner.id())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(from_sqlx_error)?;
        Ok(rows
            .into_iter()
            .map(|row| association_from_row(row, owner_kind))
            .collect())
    }

    async fn insert_association(
        &mut self,
        association: &AttributeAssociation,
    ) -> StorageResult<()> {
        let (table, column) = association_table(association.owner);
        let optional_column = match association.owner {
            AssociationOwner::IdentityProvider(_) => "",
            AssociationOwner::ServiceProvider(_) => ", optional",
        };
        let optional_value = match association.owner {
            AssociationOwner::IdentityProvider(_) => "",
            AssociationOwner::ServiceProvider(_) => ", $6",
        };
        let sql = format!(
            "INSERT INTO {table} (id, {column}, saml_attribute_id, created_at, updated_at{optional_column}) \
             VALUES ($1, $2, $3, $4, $5{optional_value})"
        );

        let mut query = sqlx::query(&sql)
            .bind(association.id)
            .bind(association.owner.id())
            .bind(association.saml_attribute_id)
            .bind(association.created_at)
            .bind(association.updated_at);
        if matches!(association.owner, AssociationOwner::ServiceProvider(_)) {
            query = query.bind(association.optional);
        }
        query
            .execute(&mut *self.tx)
            .await
            .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_association(
        &mut self,
        association: &AttributeAssociation,
    ) -> StorageResult<()> {
        let result = match association.owner {
            AssociationOwner::IdentityProvider(_) => sqlx::query(
                "UPDATE identity_provider_saml_attributes SET updated_at = $2 WHERE id = $1",
            )
            .bind(association.id)
            .bind(association.updated_at),
            AssociationOwner::ServiceProvider(_) => sqlx::query(
                r"UPDATE service_provider_saml_attributes
                  SET optional = $3, updated_at = $2 WHERE id = $1",
            )
            .bind(association.id)
            .bind(association.updated_at)
            .bind(association.optional),
        }
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        expect_row(&result, "AttributeAssociation", association.id)
    }

    async fn delete_association(
        &mut self,
        association: &AttributeAssociation,
    ) -> StorageResult<()> {
        let (table, _) = association_table(association.owner);
        let sql = format!("DELETE FROM {table} WHERE id = $1");
        let result = sqlx::query(&sql)
            .bind(association.id)
            .execute(&mut *self.tx)
            .await
            .map_err(from_sqlx_error)?;
        expect_row(&result, "AttributeAssociation", association.id)
    }
}

#[async_trait]
impl ActivationRepository for PgTransaction {
    async fn find_activations(
        &mut self,
        object: FederationObjectRef,
    ) -> StorageResult<Vec<Activation>> {
        let rows = sqlx::query_as::<_, ActivationRow>(
            r"SELECT * FROM activations
              WHERE federation_object_type = $1 AND federation_object_id = $2
              ORDER BY id",
        )
        .bind(object.kind.as_str())
        .bind(object.id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        rows.into_iter().map(Activation::try_from).collect()
    }

    async fn insert_activation(&mut self, activation: &Activation) -> StorageResult<()> {
        activation.validate()?;
        sqlx::query(
            r"INSERT INTO activations
                (id, federation_object_type, federation_object_id, activated_at, deactivated_at,
                 created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(activation.id)
        .bind(activation.federation_object.kind.as_str())
        .bind(activation.federation_object.id)
        .bind(activation.activated_at)
        .bind(activation.deactivated_at)
        .bind(activation.created_at)
        .bind(activation.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_activation(&mut self, activation: &Activation) -> StorageResult<()> {
        activation.validate()?;
        let result = sqlx::query(
            r"UPDATE activations SET activated_at = $2, deactivated_at = $3, updated_at = $4
              WHERE id = $1",
        )
        .bind(activation.id)
        .bind(activation.activated_at)
        .bind(activation.deactivated_at)
        .bind(activation.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        expect_row(&result, "Activation", activation.id)
    }

    async fn list_open_activations(
        &mut self,
        kind: FederationObjectKind,
        at: DateTime<Utc>,
    ) -> StorageResult<Vec<Activation>> {
        let rows = sqlx::query_as::<_, ActivationRow>(
            r"SELECT * FROM activations
              WHERE federation_object_type = $1
                AND (deactivated_at IS NULL OR deactivated_at > $2)
              ORDER BY id",
        )
        .bind(kind.as_str())
        .bind(at)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(from_sqlx_error)?;
        rows.into_iter().map(Activation::try_from).collect()
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))
    }
}
