//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Federation sync - reconciles the federation store with its sources.
#[derive(Debug, Parser)]
#[command(name = "fedsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, env = "FEDSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report format.
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile against the signed SAML metadata feed.
    Metadata(SyncArgs),

    /// Reconcile against the registry export API.
    Registry(RegistryArgs),

    /// Apply database migrations.
    Migrate,
}

/// Options shared by sync commands.
#[derive(Debug, Clone, Copy, Args)]
pub struct SyncArgs {
    /// Run the whole pass, then roll it back.
    #[arg(long)]
    pub dry_run: bool,
}

/// Options for the registry sync.
#[derive(Debug, Clone, Copy, Args)]
pub struct RegistryArgs {
    /// Shared sync options.
    #[command(flatten)]
    pub sync: SyncArgs,

    /// Whether to reconcile identity and service providers (overrides config).
    #[arg(long)]
    pub saml_entities: Option<bool>,
}

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables.
    #[default]
    Table,
    /// JSON.
    Json,
}
