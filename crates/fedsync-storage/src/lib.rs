//! # fedsync-storage
//!
//! Storage abstraction for the canonical federation store.
//!
//! Every read and write of a sync run goes through one [`StoreTransaction`],
//! opened with [`FederationStore::begin`]. A transaction that is dropped
//! without [`StoreTransaction::commit`] leaves the store untouched.
//!
//! ## Repository Traits
//!
//! - [`OrganizationRepository`] - organizations by identifier or domain
//! - [`IdentityProviderRepository`] / [`ServiceProviderRepository`] - SAML entities by entity ID
//! - [`GenericServiceRepository`] - non-SAML services
//! - [`SamlAttributeRepository`] - attribute definitions by name
//! - [`AssociationRepository`] - provider attribute associations
//! - [`ActivationRepository`] - activation intervals by federation object
//!
//! [`MemoryFederationStore`] implements all of them in memory.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod activation;
pub mod attribute;
pub mod error;
pub mod memory;
pub mod organization;
pub mod provider;
pub mod service;
pub mod transaction;

pub use activation::ActivationRepository;
pub use attribute::{AssociationRepository, SamlAttributeRepository};
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryFederationStore, MemorySnapshot};
pub use organization::OrganizationRepository;
pub use provider::{IdentityProviderRepository, ServiceProviderRepository};
pub use service::GenericServiceRepository;
pub use transaction::{FederationStore, StoreTransaction};
