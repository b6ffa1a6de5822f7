//! Output formatting utilities.

use colored::Colorize;
use fedsync_engine::{EntityKind, SyncReport};
use tabled::{settings::Style, Table, Tabled};

use crate::cli::OutputFormat;
use crate::CliResult;

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints a warning message.
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

#[derive(Debug, Tabled)]
struct CountRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Created")]
    created: usize,
    #[tabled(rename = "Updated")]
    updated: usize,
    #[tabled(rename = "Unchanged")]
    unchanged: usize,
    #[tabled(rename = "Deactivated")]
    deactivated: usize,
}

#[derive(Debug, Tabled)]
struct SkipRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

fn count_rows(report: &SyncReport) -> Vec<CountRow> {
    [
        EntityKind::SamlAttribute,
        EntityKind::Organization,
        EntityKind::IdentityProvider,
        EntityKind::ServiceProvider,
    ]
    .into_iter()
    .filter(|kind| report.entities.contains_key(kind))
    .map(|kind| {
        let counts = report.counts(kind);
        CountRow {
            kind: kind.to_string(),
            created: counts.created,
            updated: counts.updated,
            unchanged: counts.unchanged,
            deactivated: counts.deactivated,
        }
    })
    .collect()
}

/// Prints a sync report.
///
/// ## Errors
///
/// Fails only if the report cannot be serialized.
pub fn report(report: &SyncReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            let rows = count_rows(report);
            if !rows.is_empty() {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
            println!(
                "associations: {} created, {} updated, {} deleted",
                report.associations_created, report.associations_updated, report.associations_deleted
            );
            println!(
                "activations: {} created, {} updated; attribute definitions pruned: {}",
                report.activations_created, report.activations_updated, report.attributes_pruned
            );

            if !report.skipped.is_empty() {
                let skipped: Vec<SkipRow> = report
                    .skipped
                    .iter()
                    .map(|s| SkipRow {
                        kind: s.kind.to_string(),
                        key: s.key.clone(),
                        reason: s.reason.to_string(),
                    })
                    .collect();
                println!("{}", Table::new(skipped).with(Style::rounded()));
            }

            if report.dry_run {
                warning(&report.status);
            } else {
                success(&report.status);
            }
        }
    }
    Ok(())
}
