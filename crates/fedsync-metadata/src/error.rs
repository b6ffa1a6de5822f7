//! Metadata retrieval errors.

use thiserror::Error;

/// Errors raised while fetching, parsing or verifying a metadata document.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The request could not be sent or the body could not be read.
    #[error("metadata request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("unable to retrieve metadata from {url} ({status})")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The document is not well-formed XML.
    #[error("malformed metadata document: {0}")]
    Parse(String),

    /// The trusted certificate could not be loaded.
    #[error("invalid trusted certificate: {0}")]
    Certificate(String),

    /// The document signature is missing, unsupported or does not verify.
    #[error("invalid metadata signature: {0}")]
    SignatureInvalid(String),
}

impl MetadataError {
    /// Creates a parse error.
    pub fn parse(message: impl ToString) -> Self {
        Self::Parse(message.to_string())
    }

    /// Creates a signature error.
    pub fn signature(message: impl Into<String>) -> Self {
        Self::SignatureInvalid(message.into())
    }

    /// Returns true when the document's integrity could not be established.
    #[must_use]
    pub const fn is_signature_failure(&self) -> bool {
        matches!(self, Self::SignatureInvalid(_))
    }
}

impl From<reqwest::Error> for MetadataError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;
