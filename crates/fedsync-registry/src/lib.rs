//! # fedsync-registry
//!
//! Client for the federation registry export API.
//!
//! The registry publishes full snapshots of organizations, identity providers,
//! service providers and attribute definitions. [`RegistrySource`] is the seam
//! the sync engine depends on; [`HttpRegistrySource`] is the production
//! implementation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod error;
pub mod records;
pub mod source;

pub use client::HttpRegistrySource;
pub use error::{RegistryError, RegistryResult};
pub use records::{
    AttributeCategory, AttributeConsumingService, IdentityProviderSaml, NamedAttribute,
    RegistryAttribute, RegistryIdentityProvider, RegistryOrganization, RegistryReference,
    RegistryServiceProvider, RequestedAttribute, SamlEntity, ServiceProviderSaml,
};
pub use source::{RegistrySnapshot, RegistrySource};
