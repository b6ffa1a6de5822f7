//! The registry source seam.

use async_trait::async_trait;

use crate::error::RegistryResult;
use crate::records::{
    RegistryAttribute, RegistryIdentityProvider, RegistryOrganization, RegistryServiceProvider,
};

/// A full registry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Attribute definitions.
    pub attributes: Vec<RegistryAttribute>,
    /// Organizations.
    pub organizations: Vec<RegistryOrganization>,
    /// Identity providers; empty when SAML entities were not requested.
    pub identity_providers: Vec<RegistryIdentityProvider>,
    /// Service providers; empty when SAML entities were not requested.
    pub service_providers: Vec<RegistryServiceProvider>,
}

/// Typed access to the registry's exported object lists.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Lists all organizations.
    async fn organizations(&self) -> RegistryResult<Vec<RegistryOrganization>>;

    /// Lists all identity providers.
    async fn identity_providers(&self) -> RegistryResult<Vec<RegistryIdentityProvider>>;

    /// Lists all service providers.
    async fn service_providers(&self) -> RegistryResult<Vec<RegistryServiceProvider>>;

    /// Lists all attribute definitions.
    async fn attributes(&self) -> RegistryResult<Vec<RegistryAttribute>>;

    /// Fetches everything a sync pass needs.
    ///
    /// Identity and service providers are only requested when
    /// `include_saml_entities` is set.
    ///
    /// ## Errors
    ///
    /// Fails on the first list that cannot be retrieved.
    async fn snapshot(&self, include_saml_entities: bool) -> RegistryResult<RegistrySnapshot> {
        let organizations = self.organizations().await?;
        let (identity_providers, service_providers) = if include_saml_entities {
            (
                self.identity_providers().await?,
                self.service_providers().await?,
            )
        } else {
            (Vec::new(), Vec::new())
        };
        let attributes = self.attributes().await?;

        Ok(RegistrySnapshot {
            attributes,
            organizations,
            identity_providers,
            service_providers,
        })
    }
}
