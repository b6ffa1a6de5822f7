//! The sync run state machine.
//!
//! `Fetch -> Process -> Sweep -> Commit`, or rollback on any failure. Fetching
//! completes before the transaction opens, so the transaction never spans
//! source I/O.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fedsync_storage::{FederationStore, StoreTransaction};
use tracing::{error, info, info_span, warn, Instrument};

use crate::adapter::{SourceAdapter, SyncContext};
use crate::error::SyncResult;
use crate::report::SyncReport;
use crate::settings::SyncSettings;

/// Runs source adapters against a federation store.
#[derive(Clone)]
pub struct Synchronizer {
    store: Arc<dyn FederationStore>,
    settings: SyncSettings,
    dry_run: bool,
    now: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("settings", &self.settings)
            .field("dry_run", &self.dry_run)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl Synchronizer {
    /// Creates a synchronizer writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn FederationStore>, settings: SyncSettings) -> Self {
        Self {
            store,
            settings,
            dry_run: false,
            now: None,
        }
    }

    /// Rolls every run back instead of committing it.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Pins the reference time used for sweeps and policy activations.
    #[must_use]
    pub const fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Runs one full pass of `adapter`.
    ///
    /// ## Errors
    ///
    /// Fetch failures are returned before any transaction is opened. Any
    /// failure after that rolls the transaction back, leaving the store as it
    /// was before the run.
    pub async fn run<A: SourceAdapter>(&self, adapter: &A) -> SyncResult<SyncReport> {
        let source = adapter.source();
        let span = info_span!("sync", %source, dry_run = self.dry_run);
        self.run_inner(adapter).instrument(span).await
    }

    async fn run_inner<A: SourceAdapter>(&self, adapter: &A) -> SyncResult<SyncReport> {
        let now = self.now.unwrap_or_else(Utc::now);
        info!("fetching source snapshot");
        let snapshot = adapter.fetch().await.inspect_err(|err| {
            error!(error = %err, "fetch failed, store left untouched");
        })?;

        let mut tx = self.store.begin().await?;
        let mut report = match self.apply(adapter, tx.as_mut(), snapshot, now).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "sync aborted, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                return Err(err);
            }
        };

        report.dry_run = self.dry_run;
        if self.dry_run {
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }

        let report = report.complete();
        info!(
            created = report.entities.values().map(|c| c.created).sum::<usize>(),
            updated = report.entities.values().map(|c| c.updated).sum::<usize>(),
            deactivated = report.entities.values().map(|c| c.deactivated).sum::<usize>(),
            skipped = report.skipped.len(),
            "{}",
            report.status
        );
        Ok(report)
    }

    async fn apply<A: SourceAdapter>(
        &self,
        adapter: &A,
        tx: &mut dyn StoreTransaction,
        snapshot: A::Snapshot,
        now: DateTime<Utc>,
    ) -> SyncResult<SyncReport> {
        let mut ctx = SyncContext::new(tx, &self.settings, adapter.source(), now);
        adapter.process(&mut ctx, snapshot).await?;
        for kind in adapter.swept_kinds() {
            ctx.sweep(kind).await?;
        }
        Ok(ctx.into_report())
    }
}
