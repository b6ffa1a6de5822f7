//! Schema migration command.

use fedsync_core::Config;
use fedsync_storage_sql::run_migrations;

use super::connect;
use crate::output::success;
use crate::CliResult;

/// Applies the bundled migrations.
///
/// ## Errors
///
/// Fails when the database is unreachable or a migration fails.
pub async fn run_migrate(config: &Config) -> CliResult<()> {
    let store = connect(config).await?;
    run_migrations(store.pool()).await?;
    success("Database schema is up to date");
    Ok(())
}
