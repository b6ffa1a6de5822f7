//! # fedsync-engine
//!
//! Reconciles the canonical federation store against its two sources: the
//! signed SAML metadata feed and the federation registry export API.
//!
//! A run is driven by the [`Synchronizer`] and follows
//! `Fetch -> Process -> Sweep -> Commit`. The whole pass after fetching is one
//! store transaction; any failure rolls it back.
//!
//! ## Building blocks
//!
//! - [`resolver`] - find-or-initialize of rows by their unique key
//! - [`arbiter`] - organization identifiers shared between the two sources
//! - [`differ`] - full-replace reconciliation of attribute associations
//! - [`activation`] - activation upserts and sweeps
//!
//! [`RegistrySync`] and [`MetadataSync`] implement [`SourceAdapter`] and
//! differ only in how they fetch and map source fields.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use fedsync_engine::{RegistrySync, SyncSettings, Synchronizer};
//!
//! let synchronizer = Synchronizer::new(Arc::new(store), SyncSettings::from(&config));
//! let report = synchronizer.run(&RegistrySync::new(registry)).await?;
//! println!("{}", report.status);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod activation;
pub mod adapter;
pub mod arbiter;
pub mod differ;
pub mod error;
pub mod metadata_sync;
pub mod orchestrator;
pub mod registry_sync;
pub mod report;
pub mod resolver;
pub mod settings;

pub use adapter::{SourceAdapter, SyncContext};
pub use arbiter::{IdentifierArbiter, RegistryOrganizationKey};
pub use differ::{AssociationChanges, DeclaredAttribute};
pub use error::{SyncError, SyncResult};
pub use metadata_sync::MetadataSync;
pub use orchestrator::Synchronizer;
pub use registry_sync::RegistrySync;
pub use report::{
    EntityCounts, EntityKind, Outcome, SkipReason, SkippedRecord, SyncReport, SyncSource,
};
pub use resolver::{Resolvable, Resolved};
pub use settings::SyncSettings;
