//! # fedsync-model
//!
//! Domain models for the canonical federation store.
//!
//! ## Entities
//!
//! - [`Organization`] - a federation subscriber, keyed by domain
//! - [`IdentityProvider`] / [`ServiceProvider`] - SAML entities owned by an organization
//! - [`GenericService`] - non-SAML services attached to an organization
//! - [`SamlAttribute`] - attribute definitions, keyed by name
//! - [`AttributeAssociation`] - attributes released by an IdP or requested by an SP
//! - [`Activation`] - the current activation interval of a federation object

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod activation;
pub mod attribute;
pub mod error;
pub mod identifier;
pub mod object;
pub mod organization;
pub mod provider;
pub mod service;

pub use activation::Activation;
pub use attribute::{
    normalize_description, AssociationOwner, AttributeAssociation, SamlAttribute,
    DEFAULT_DESCRIPTION_LIMIT,
};
pub use error::{ModelError, ModelResult};
pub use identifier::{IdentifierPolicy, OrganizationIdentifier};
pub use object::{FederationObject, FederationObjectKind, FederationObjectRef};
pub use organization::Organization;
pub use provider::{IdentityProvider, ServiceProvider};
pub use service::GenericService;
