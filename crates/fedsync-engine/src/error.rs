//! Sync error types.
//!
//! Only fatal conditions are errors. Records the engine skips (unknown
//! attribute references, orphaned providers) are reported on the
//! [`SyncReport`](crate::SyncReport) instead.

use fedsync_metadata::MetadataError;
use fedsync_registry::RegistryError;
use fedsync_storage::StorageError;
use thiserror::Error;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source could not be fetched or its document was malformed.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The metadata document failed signature verification.
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// The store rejected an entity; the transaction was rolled back.
    #[error("Persistence validation failed: {0}")]
    PersistenceValidation(String),

    /// Any other storage failure.
    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),
}

impl SyncError {
    /// Creates a source unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Returns true for failures raised while fetching, before any
    /// transaction was opened.
    #[must_use]
    pub const fn is_fatal_before_transaction(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::SignatureInvalid(_))
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        if err.is_validation() {
            Self::PersistenceValidation(err.to_string())
        } else {
            Self::Storage(err)
        }
    }
}

impl From<MetadataError> for SyncError {
    fn from(err: MetadataError) -> Self {
        if err.is_signature_failure() {
            Self::SignatureInvalid(err.to_string())
        } else {
            Self::SourceUnavailable(err.to_string())
        }
    }
}

impl From<RegistryError> for SyncError {
    fn from(err: RegistryError) -> Self {
        Self::SourceUnavailable(err.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
