//! SQL storage error mapping.

use fedsync_storage::StorageError;
use sqlx::Error as SqlxError;

/// Converts a `SQLx` error to a storage error.
#[allow(clippy::needless_pass_by_value)]
pub fn from_sqlx_error(err: SqlxError) -> StorageError {
    match err {
        SqlxError::RowNotFound => StorageError::Internal("Row not found".to_string()),
        SqlxError::Database(db_err) => match db_err.code().as_deref() {
            // unique_violation
            Some("23505") => StorageError::Duplicate {
                entity_type: "row",
                field: "unique key",
                value: db_err.constraint().unwrap_or_default().to_string(),
            },
            // foreign_key_violation
            Some("23503") => StorageError::Reference(db_err.message().to_string()),
            // check_violation, not_null_violation
            Some("23514" | "23502") => StorageError::InvalidData(db_err.message().to_string()),
            // serialization_failure
            Some("40001") => StorageError::Transaction(db_err.message().to_string()),
            _ => StorageError::Query(db_err.to_string()),
        },
        SqlxError::PoolTimedOut => StorageError::Connection("Connection pool timeout".to_string()),
        SqlxError::PoolClosed => StorageError::Connection("Connection pool closed".to_string()),
        SqlxError::Io(e) => StorageError::Connection(e.to_string()),
        _ => StorageError::Internal(err.to_string()),
    }
}
