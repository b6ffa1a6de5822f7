//! Sync commands.

use std::sync::Arc;

use fedsync_core::Config;
use fedsync_engine::{MetadataSync, RegistrySync, SyncReport, SyncSettings, Synchronizer};
use fedsync_metadata::{HttpMetadataSource, TrustedCertificate};
use fedsync_registry::HttpRegistrySource;

use super::connect;
use crate::cli::{RegistryArgs, SyncArgs};
use crate::CliResult;

async fn synchronizer(config: &Config, args: SyncArgs) -> CliResult<Synchronizer> {
    let store = connect(config).await?;
    Ok(Synchronizer::new(Arc::new(store), SyncSettings::from(config)).dry_run(args.dry_run))
}

/// Runs a metadata sync.
///
/// ## Errors
///
/// Fails when the feed is not configured or the run aborts.
pub async fn run_metadata(config: &Config, args: SyncArgs) -> CliResult<SyncReport> {
    let url = config.metadata_url()?;
    let certificate = config
        .metadata
        .cert_path
        .as_deref()
        .map(TrustedCertificate::from_file)
        .transpose()?;
    let source = HttpMetadataSource::new(url, config.metadata.timeout(), certificate)?;

    let synchronizer = synchronizer(config, args).await?;
    Ok(synchronizer.run(&MetadataSync::new(source)).await?)
}

/// Runs a registry sync.
///
/// ## Errors
///
/// Fails when the registry is not configured or the run aborts.
pub async fn run_registry(config: &Config, args: RegistryArgs) -> CliResult<SyncReport> {
    let (url, secret) = config.registry_endpoint()?;
    let source = HttpRegistrySource::new(url, secret, config.registry.timeout())?;
    let include = args
        .saml_entities
        .unwrap_or_else(|| config.registry_syncs_saml_entities());

    let synchronizer = synchronizer(config, args.sync).await?;
    let adapter = RegistrySync::new(source).include_saml_entities(include);
    Ok(synchronizer.run(&adapter).await?)
}
