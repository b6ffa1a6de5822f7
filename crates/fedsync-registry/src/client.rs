//! HTTP client for the registry export API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{RegistryError, RegistryResult};
use crate::records::{
    AttributesEnvelope, IdentityProvidersEnvelope, OrganizationsEnvelope, RegistryAttribute,
    RegistryIdentityProvider, RegistryOrganization, RegistryServiceProvider,
    ServiceProvidersEnvelope,
};
use crate::source::RegistrySource;

/// Authorization scheme expected by the export API.
const AUTH_SCHEME: &str = "AAF-FR-EXPORT";

/// Reads the registry export endpoints over HTTP.
#[derive(Clone)]
pub struct HttpRegistrySource {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl fmt::Debug for HttpRegistrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRegistrySource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpRegistrySource {
    /// Creates a client for the registry at `base_url`.
    ///
    /// ## Errors
    ///
    /// Returns [`RegistryError::InvalidUrl`] if `base_url` is not an absolute
    /// http(s) URL, or [`RegistryError::Http`] if the client cannot be built.
    pub fn new(
        base_url: &str,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> RegistryResult<Self> {
        let parsed =
            Url::parse(base_url).map_err(|e| RegistryError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidUrl(format!(
                "{base_url}: unsupported scheme {}",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.into(),
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn export<T: DeserializeOwned>(&self, resource: &str) -> RegistryResult<T> {
        let url = format!("{}/export/{resource}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("{AUTH_SCHEME} {}", self.secret))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "registry export downloaded");
        serde_json::from_str(&body).map_err(|e| RegistryError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RegistrySource for HttpRegistrySource {
    async fn organizations(&self) -> RegistryResult<Vec<RegistryOrganization>> {
        let envelope: OrganizationsEnvelope = self.export("organizations").await?;
        Ok(envelope.organizations)
    }

    async fn identity_providers(&self) -> RegistryResult<Vec<RegistryIdentityProvider>> {
        let envelope: IdentityProvidersEnvelope = self.export("identityproviders").await?;
        Ok(envelope.identity_providers)
    }

    async fn service_providers(&self) -> RegistryResult<Vec<RegistryServiceProvider>> {
        let envelope: ServiceProvidersEnvelope = self.export("serviceproviders").await?;
        Ok(envelope.service_providers)
    }

    async fn attributes(&self) -> RegistryResult<Vec<RegistryAttribute>> {
        let envelope: AttributesEnvelope = self.export("attributes").await?;
        Ok(envelope.attributes)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn mount(server: &MockServer, resource: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/export/{resource}")))
            .and(header("authorization", "AAF-FR-EXPORT s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> HttpRegistrySource {
        HttpRegistrySource::new(&format!("{}/", server.uri()), "s3cret", Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn snapshot_without_saml_entities_skips_provider_endpoints() {
        let server = MockServer::start().await;
        mount(
            &server,
            "organizations",
            json!({ "organizations": [{
                "id": 1, "display_name": "Example University", "domain": "example.edu",
                "functioning": true,
                "created_at": "2019-03-01T00:00:00Z", "updated_at": "2019-03-02T00:00:00Z"
            }]}),
        )
        .await;
        mount(
            &server,
            "attributes",
            json!({ "attributes": [{ "name": "mail", "description": "Email", "category": { "name": "Core" } }] }),
        )
        .await;

        let snapshot = client(&server).snapshot(false).await.unwrap();
        assert_eq!(snapshot.organizations.len(), 1);
        assert_eq!(snapshot.attributes.len(), 1);
        assert!(snapshot.identity_providers.is_empty());
        assert!(snapshot.service_providers.is_empty());
    }

    #[tokio::test]
    async fn identity_providers_are_unwrapped() {
        let server = MockServer::start().await;
        mount(
            &server,
            "identityproviders",
            json!({ "identity_providers": [{
                "id": 3, "display_name": "Example IdP", "organization": { "id": 1 },
                "saml": {
                    "entity": { "entity_id": "https://idp.example.edu/idp/shibboleth" },
                    "attributes": [{ "name": "mail" }, { "name": "cn" }]
                },
                "functioning": true,
                "created_at": "2019-03-01T00:00:00Z", "updated_at": "2019-03-02T00:00:00Z"
            }]}),
        )
        .await;

        let idps = client(&server).identity_providers().await.unwrap();
        assert_eq!(idps[0].saml.entity.entity_id, "https://idp.example.edu/idp/shibboleth");
        assert_eq!(idps[0].saml.attributes.len(), 2);
    }

    #[tokio::test]
    async fn rejected_secret_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client(&server).organizations().await.unwrap_err();
        assert!(matches!(err, RegistryError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn unexpected_body_is_a_decode_error() {
        let server = MockServer::start().await;
        mount(&server, "attributes", json!({ "unexpected": [] })).await;

        let err = client(&server).attributes().await.unwrap_err();
        assert!(matches!(err, RegistryError::Decode { .. }));
    }

    #[test]
    fn rejects_non_http_urls() {
        let secs = Duration::from_secs(1);
        assert!(HttpRegistrySource::new("ftp://registry", "x", secs).is_err());
        assert!(HttpRegistrySource::new("not a url", "x", secs).is_err());
    }
}
