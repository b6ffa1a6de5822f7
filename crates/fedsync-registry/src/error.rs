//! Registry client errors.

use thiserror::Error;

/// Errors raised while talking to the registry export API.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The base URL is not usable.
    #[error("invalid registry URL: {0}")]
    InvalidUrl(String),

    /// The request could not be sent or the body could not be read.
    #[error("registry request failed: {0}")]
    Http(String),

    /// The registry answered with a non-success status.
    #[error("unable to retrieve {url} ({status})")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The body is not the expected JSON document.
    #[error("malformed response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Deserialization failure.
        message: String,
    },
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
