//! Sync run accounting.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which source a run reconciled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncSource {
    /// The signed SAML metadata feed.
    Metadata,
    /// The registry export API.
    Registry,
}

impl fmt::Display for SyncSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Metadata => "metadata",
            Self::Registry => "registry",
        })
    }
}

/// Entity kinds the engine writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Attribute definitions.
    SamlAttribute,
    /// Organizations.
    Organization,
    /// Identity providers.
    IdentityProvider,
    /// Service providers.
    ServiceProvider,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SamlAttribute => "SamlAttribute",
            Self::Organization => "Organization",
            Self::IdentityProvider => "IdentityProvider",
            Self::ServiceProvider => "ServiceProvider",
        })
    }
}

/// What happened to a resolved row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new row was inserted.
    Created,
    /// An existing row changed.
    Updated,
    /// An existing row already matched the source.
    Unchanged,
}

/// Per-kind counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    /// Rows inserted.
    pub created: usize,
    /// Rows changed.
    pub updated: usize,
    /// Rows seen but already current.
    pub unchanged: usize,
    /// Rows deactivated by the sweep.
    pub deactivated: usize,
}

/// Why a record was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A declared attribute has no definition.
    UnknownAttributeReference {
        /// Attribute name.
        attribute: String,
    },
    /// The owning organization was not resolved in this pass.
    OrphanedChildRecord {
        /// The organization reference carried by the record.
        organization: String,
    },
    /// The record lacks its identifying key.
    MissingKey {
        /// Name of the missing field.
        field: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAttributeReference { attribute } => {
                write!(f, "unknown attribute '{attribute}'")
            }
            Self::OrphanedChildRecord { organization } => {
                write!(f, "organization '{organization}' not in this pass")
            }
            Self::MissingKey { field } => write!(f, "missing {field}"),
        }
    }
}

/// A source record, or part of one, the engine did not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// Kind of the record.
    pub kind: EntityKind,
    /// The record's key, as far as it is known.
    pub key: String,
    /// Why it was skipped.
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Result of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// The source reconciled against.
    pub source: SyncSource,
    /// Whether the run was rolled back instead of committed.
    pub dry_run: bool,
    /// Per-kind row counters.
    pub entities: BTreeMap<EntityKind, EntityCounts>,
    /// Activation rows inserted.
    pub activations_created: usize,
    /// Activation rows changed in place (sweeps excluded).
    pub activations_updated: usize,
    /// Attribute associations inserted.
    pub associations_created: usize,
    /// Attribute associations changed.
    pub associations_updated: usize,
    /// Attribute associations removed.
    pub associations_deleted: usize,
    /// Attribute definitions removed.
    pub attributes_pruned: usize,
    /// Records not applied.
    pub skipped: Vec<SkippedRecord>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run completed.
    pub completed_at: DateTime<Utc>,
    /// Status message.
    pub status: String,
}

impl SyncReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(source: SyncSource, started_at: DateTime<Utc>) -> Self {
        Self {
            source,
            dry_run: false,
            entities: BTreeMap::new(),
            activations_created: 0,
            activations_updated: 0,
            associations_created: 0,
            associations_updated: 0,
            associations_deleted: 0,
            attributes_pruned: 0,
            skipped: Vec::new(),
            started_at,
            completed_at: started_at,
            status: String::new(),
        }
    }

    /// Marks the run as complete.
    #[must_use]
    pub fn complete(mut self) -> Self {
        self.completed_at = Utc::now();
        let created: usize = self.entities.values().map(|c| c.created).sum();
        let updated: usize = self.entities.values().map(|c| c.updated).sum();
        let deactivated: usize = self.entities.values().map(|c| c.deactivated).sum();
        self.status = format!(
            "{} sync {}: {created} created, {updated} updated, {deactivated} deactivated, {} skipped",
            self.source,
            if self.dry_run { "rolled back" } else { "committed" },
            self.skipped.len()
        );
        self
    }

    /// Counts a resolved row.
    pub fn record(&mut self, kind: EntityKind, outcome: Outcome) {
        let counts = self.entities.entry(kind).or_default();
        match outcome {
            Outcome::Created => counts.created += 1,
            Outcome::Updated => counts.updated += 1,
            Outcome::Unchanged => counts.unchanged += 1,
        }
    }

    /// Counts swept rows.
    pub fn record_deactivated(&mut self, kind: EntityKind, count: usize) {
        self.entities.entry(kind).or_default().deactivated += count;
    }

    /// Records a skipped record.
    pub fn record_skipped(&mut self, skipped: SkippedRecord) {
        self.skipped.push(skipped);
    }

    /// Returns the counters for one kind.
    #[must_use]
    pub fn counts(&self, kind: EntityKind) -> EntityCounts {
        self.entities.get(&kind).copied().unwrap_or_default()
    }

    /// Returns true when the run wrote anything.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.entities
            .values()
            .any(|c| c.created + c.updated + c.deactivated > 0)
            || self.activations_created
                + self.activations_updated
                + self.associations_created
                + self.associations_updated
                + self.associations_deleted
                + self.attributes_pruned
                > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tracking() {
        let mut report = SyncReport::new(SyncSource::Registry, Utc::now());

        report.record(EntityKind::Organization, Outcome::Created);
        report.record(EntityKind::Organization, Outcome::Unchanged);
        report.record(EntityKind::IdentityProvider, Outcome::Updated);
        report.record_deactivated(EntityKind::IdentityProvider, 2);
        report.record_skipped(SkippedRecord {
            kind: EntityKind::ServiceProvider,
            key: "https://sp.example.edu".to_string(),
            reason: SkipReason::OrphanedChildRecord {
                organization: "17".to_string(),
            },
        });

        assert_eq!(report.counts(EntityKind::Organization).created, 1);
        assert_eq!(report.counts(EntityKind::Organization).unchanged, 1);
        assert_eq!(report.counts(EntityKind::IdentityProvider).deactivated, 2);
        assert_eq!(report.counts(EntityKind::ServiceProvider), EntityCounts::default());
        assert!(report.has_changes());

        let report = report.complete();
        assert!(report.status.contains("1 created, 1 updated, 2 deactivated, 1 skipped"));
    }

    #[test]
    fn unchanged_only_run_has_no_changes() {
        let mut report = SyncReport::new(SyncSource::Metadata, Utc::now());
        report.record(EntityKind::SamlAttribute, Outcome::Unchanged);
        assert!(!report.has_changes());
    }

    #[test]
    fn skipped_record_serializes_flat() {
        let skipped = SkippedRecord {
            kind: EntityKind::IdentityProvider,
            key: "https://idp.example.edu".to_string(),
            reason: SkipReason::UnknownAttributeReference {
                attribute: "eduPersonOrcid".to_string(),
            },
        };
        let json = serde_json::to_value(&skipped).unwrap();

        assert_eq!(json["reason"], "unknown_attribute_reference");
        assert_eq!(json["attribute"], "eduPersonOrcid");
        assert_eq!(json["kind"], "IdentityProvider");
    }
}
