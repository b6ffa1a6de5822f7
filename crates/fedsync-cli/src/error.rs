//! CLI error types.

use fedsync_engine::SyncError;
use fedsync_metadata::MetadataError;
use fedsync_registry::RegistryError;
use fedsync_storage::StorageError;
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] fedsync_core::Error),

    /// The store could not be reached or migrated.
    #[error("database error: {0}")]
    Database(#[from] StorageError),

    /// A metadata source could not be built.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// A registry source could not be built.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The sync run failed.
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
