//! # fedsync-metadata
//!
//! Retrieval and trust verification of the signed SAML metadata feed.
//!
//! [`HttpMetadataSource`] downloads the feed, parses it into a namespace-aware
//! [`DocumentTree`] and, when a trusted certificate is configured, verifies the
//! enveloped XML signature over the document root before handing the tree out.
//! A document that fails verification is never returned.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod document;
pub mod error;
pub mod namespaces;
pub mod signature;
pub mod source;

pub use document::{DocumentTree, Element, Node, XmlAttribute};
pub use error::{MetadataError, MetadataResult};
pub use signature::{verify_document, SignatureAlgorithm, TrustedCertificate};
pub use source::{load_document, HttpMetadataSource, MetadataSource, METADATA_MEDIA_TYPE};
