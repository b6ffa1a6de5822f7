//! Command implementations.

pub mod migrate;
pub mod sync;

pub use migrate::run_migrate;
pub use sync::{run_metadata, run_registry};

use fedsync_core::Config;
use fedsync_storage_sql::{create_pool, PgFederationStore, PoolConfig};
use tracing::debug;

use crate::CliResult;

/// Opens the federation store described by `config`.
///
/// ## Errors
///
/// Fails when the database is unreachable.
pub async fn connect(config: &Config) -> CliResult<PgFederationStore> {
    let pool_config = PoolConfig::from(&config.database);
    debug!(max_connections = pool_config.max_connections, "connecting to database");
    let pool = create_pool(&pool_config).await?;
    Ok(PgFederationStore::new(pool))
}
