//! Metadata retrieval.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::{debug, info, instrument, warn};

use crate::document::DocumentTree;
use crate::error::{MetadataError, MetadataResult};
use crate::signature::{verify_document, TrustedCertificate};

/// Media type of SAML metadata.
pub const METADATA_MEDIA_TYPE: &str = "application/samlmetadata+xml";

/// A source of verified metadata documents.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetches, parses and verifies the current document.
    ///
    /// ## Errors
    ///
    /// Returns an error if the document cannot be retrieved, is malformed, or
    /// fails signature verification.
    async fn fetch(&self) -> MetadataResult<DocumentTree>;
}

/// Parses a document and, when a certificate is given, verifies its signature.
///
/// ## Errors
///
/// Returns [`MetadataError::Parse`] for malformed XML and
/// [`MetadataError::SignatureInvalid`] when verification fails.
pub fn load_document(
    xml: &str,
    certificate: Option<&TrustedCertificate>,
) -> MetadataResult<DocumentTree> {
    let tree = DocumentTree::parse(xml)?;
    match certificate {
        Some(certificate) => verify_document(&tree, certificate)?,
        None => warn!("no metadata certificate configured, signature not checked"),
    }
    Ok(tree)
}

/// Downloads metadata over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    client: reqwest::Client,
    url: String,
    certificate: Option<TrustedCertificate>,
}

impl HttpMetadataSource {
    /// Creates a source for `url`.
    ///
    /// ## Errors
    ///
    /// Returns [`MetadataError::Http`] if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        certificate: Option<TrustedCertificate>,
    ) -> MetadataResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            certificate,
        })
    }

    /// Returns the metadata URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> MetadataResult<DocumentTree> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, METADATA_MEDIA_TYPE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "metadata downloaded");

        let tree = load_document(&body, self.certificate.as_ref())?;
        info!(
            entities = tree.descendants(crate::namespaces::MD, "EntityDescriptor").len(),
            "metadata loaded"
        );
        Ok(tree)
    }
}
