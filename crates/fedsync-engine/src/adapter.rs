//! The source adapter seam and the run-scoped context adapters write through.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedsync_model::{AssociationOwner, AttributeAssociation, FederationObjectKind, FederationObjectRef};
use fedsync_storage::StoreTransaction;
use tracing::warn;
use uuid::Uuid;

use crate::activation;
use crate::arbiter::IdentifierArbiter;
use crate::differ::{reconcile_associations, DeclaredAttribute};
use crate::error::SyncResult;
use crate::report::{EntityKind, Outcome, SkipReason, SkippedRecord, SyncReport, SyncSource};
use crate::settings::SyncSettings;

// ============================================================================
// Source Adapter
// ============================================================================

/// A source of federation records.
///
/// Adapters differ only in how they fetch and how they map source fields onto
/// the store; the run itself is driven by the
/// [`Synchronizer`](crate::Synchronizer).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The fetched snapshot.
    type Snapshot: Send + Sync;

    /// Which source this adapter reads.
    fn source(&self) -> SyncSource;

    /// Fetches the full snapshot. Runs before the transaction opens.
    ///
    /// ## Errors
    ///
    /// Returns `SourceUnavailable` or `SignatureInvalid`.
    async fn fetch(&self) -> SyncResult<Self::Snapshot>;

    /// Applies every record of `snapshot` through `ctx`.
    ///
    /// ## Errors
    ///
    /// Any error aborts the run and rolls the transaction back.
    async fn process(&self, ctx: &mut SyncContext<'_>, snapshot: Self::Snapshot) -> SyncResult<()>;

    /// Object kinds whose untouched activations are closed after processing.
    fn swept_kinds(&self) -> Vec<FederationObjectKind>;
}

// ============================================================================
// Sync Context
// ============================================================================

/// State of one run: the open transaction, the report and the touched sets.
pub struct SyncContext<'a> {
    /// The run's transaction.
    pub tx: &'a mut dyn StoreTransaction,
    /// Reconciliation policy.
    pub settings: &'a SyncSettings,
    /// Organization identifier arbiter.
    pub arbiter: IdentifierArbiter,
    /// The run's reference time.
    pub now: DateTime<Utc>,
    /// Accounting for the run.
    pub report: SyncReport,
    touched: BTreeMap<FederationObjectKind, BTreeSet<Uuid>>,
}

impl<'a> SyncContext<'a> {
    /// Creates a context for a run of `source` starting at `now`.
    #[must_use]
    pub fn new(
        tx: &'a mut dyn StoreTransaction,
        settings: &'a SyncSettings,
        source: SyncSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tx,
            settings,
            arbiter: IdentifierArbiter::new(settings.identifiers.clone()),
            now,
            report: SyncReport::new(source, now),
            touched: BTreeMap::new(),
        }
    }

    /// Counts a resolved row.
    pub fn record(&mut self, kind: EntityKind, outcome: Outcome) {
        self.report.record(kind, outcome);
    }

    /// Records a skipped record and logs it.
    pub fn skip(&mut self, kind: EntityKind, key: impl Into<String>, reason: SkipReason) {
        let key = key.into();
        warn!(%kind, %key, %reason, "skipping record");
        self.report.record_skipped(SkippedRecord { kind, key, reason });
    }

    /// Marks `object` as present in this pass so the sweep leaves it alone.
    pub fn touch(&mut self, object: FederationObjectRef) {
        self.touched.entry(object.kind).or_default().insert(object.id);
    }

    /// Returns true when `object` was touched in this pass.
    #[must_use]
    pub fn is_touched(&self, object: FederationObjectRef) -> bool {
        self.touched
            .get(&object.kind)
            .is_some_and(|ids| ids.contains(&object.id))
    }

    /// Stamps the activation of `object`.
    ///
    /// ## Errors
    ///
    /// Propagates storage failures.
    pub async fn activate(
        &mut self,
        object: FederationObjectRef,
        activated_at: DateTime<Utc>,
        deactivated_at: Option<DateTime<Utc>>,
    ) -> SyncResult<()> {
        let outcome = activation::activate(&mut *self.tx, object, activated_at, deactivated_at).await?;
        self.count_activation(outcome);
        Ok(())
    }

    /// Opens an activation at the run's reference time unless one is open.
    ///
    /// ## Errors
    ///
    /// Propagates storage failures.
    pub async fn ensure_active(&mut self, object: FederationObjectRef) -> SyncResult<()> {
        let outcome = activation::ensure_active(&mut *self.tx, object, self.now).await?;
        self.count_activation(outcome);
        Ok(())
    }

    fn count_activation(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.report.activations_created += 1,
            Outcome::Updated => self.report.activations_updated += 1,
            Outcome::Unchanged => {}
        }
    }

    /// Replaces `owner`'s associations with `declared`, reporting names that
    /// have no attribute definition as skipped under `key`.
    ///
    /// ## Errors
    ///
    /// Propagates storage failures.
    pub async fn reconcile_associations<F>(
        &mut self,
        kind: EntityKind,
        key: &str,
        owner: AssociationOwner,
        declared: &[DeclaredAttribute],
        update_fn: F,
    ) -> SyncResult<()>
    where
        F: Fn(&mut AttributeAssociation, &DeclaredAttribute) + Send + Sync,
    {
        let changes = reconcile_associations(&mut *self.tx, owner, declared, update_fn).await?;
        self.report.associations_created += changes.created;
        self.report.associations_updated += changes.updated;
        self.report.associations_deleted += changes.deleted;
        for attribute in changes.unknown {
            self.skip(kind, key, SkipReason::UnknownAttributeReference { attribute });
        }
        Ok(())
    }

    /// Closes the activations of every `kind` object not touched in this pass.
    ///
    /// ## Errors
    ///
    /// Propagates storage failures.
    pub async fn sweep(&mut self, kind: FederationObjectKind) -> SyncResult<usize> {
        let empty = BTreeSet::new();
        let touched = self.touched.get(&kind).unwrap_or(&empty);
        let closed = activation::sweep(&mut *self.tx, kind, touched, self.now).await?;
        if let Some(entity) = entity_kind(kind) {
            self.report.record_deactivated(entity, closed);
        }
        Ok(closed)
    }

    /// Ends the run, returning its report.
    #[must_use]
    pub fn into_report(self) -> SyncReport {
        self.report
    }
}

const fn entity_kind(kind: FederationObjectKind) -> Option<EntityKind> {
    match kind {
        FederationObjectKind::Organization => Some(EntityKind::Organization),
        FederationObjectKind::IdentityProvider => Some(EntityKind::IdentityProvider),
        FederationObjectKind::ServiceProvider => Some(EntityKind::ServiceProvider),
        FederationObjectKind::GenericService => None,
    }
}
