//! Organization identifier derivation.
//!
//! The registry is the long-term authority for an organization's identifier.
//! Its identifiers are derived from the registry's numeric id. The metadata
//! feed can see an organization first; it then assigns a *temporary*
//! identifier, tagged with a prefix and derived legibly from the domain.

use std::fmt::Write as _;

use aws_lc_rs::digest;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Default namespace mixed into permanent identifiers.
pub const DEFAULT_NAMESPACE: &str = "aaf";

/// Default prefix of temporary identifiers.
pub const DEFAULT_TEMPORARY_PREFIX: &str = "metadata_";

/// Parameters for identifier derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierPolicy {
    /// Namespace mixed into the digest for permanent identifiers.
    pub namespace: String,
    /// Prefix that marks an identifier as temporary.
    pub temporary_prefix: String,
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            temporary_prefix: DEFAULT_TEMPORARY_PREFIX.to_string(),
        }
    }
}

impl IdentifierPolicy {
    /// Derives the permanent identifier for a registry organization id.
    ///
    /// URL-safe base64 (unpadded) of `SHA-256("{namespace}:subscriber:{id}")`.
    #[must_use]
    pub fn permanent(&self, registry_id: i64) -> OrganizationIdentifier {
        let input = format!("{}:subscriber:{registry_id}", self.namespace);
        let hash = digest::digest(&digest::SHA256, input.as_bytes());
        OrganizationIdentifier::Permanent(URL_SAFE_NO_PAD.encode(hash.as_ref()))
    }

    /// Derives a temporary identifier from an organization domain.
    ///
    /// Dots become `_`, so `uni.example.edu` maps to
    /// `metadata_uni_example_edu`. A literal `-` is doubled and any other
    /// byte outside `[A-Za-z0-9]` is written as `-` plus two hex digits.
    /// Distinct domains therefore never share an identifier.
    #[must_use]
    pub fn temporary(&self, domain: &str) -> OrganizationIdentifier {
        let mut identifier = self.temporary_prefix.clone();
        for byte in domain.trim().bytes() {
            match byte {
                b'.' => identifier.push('_'),
                b'-' => identifier.push_str("--"),
                b if b.is_ascii_alphanumeric() => identifier.push(char::from(b)),
                b => {
                    let _ = write!(identifier, "-{b:02x}");
                }
            }
        }
        OrganizationIdentifier::Temporary(identifier)
    }

    /// Classifies a stored identifier.
    #[must_use]
    pub fn classify(&self, identifier: &str) -> OrganizationIdentifier {
        if self.is_temporary(identifier) {
            OrganizationIdentifier::Temporary(identifier.to_string())
        } else {
            OrganizationIdentifier::Permanent(identifier.to_string())
        }
    }

    /// Returns true when the identifier carries the temporary prefix.
    #[must_use]
    pub fn is_temporary(&self, identifier: &str) -> bool {
        identifier.starts_with(&self.temporary_prefix)
    }
}

/// An organization identifier and its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrganizationIdentifier {
    /// Assigned by the registry; never changes once stored.
    Permanent(String),
    /// Assigned by the metadata feed pending registry reconciliation.
    Temporary(String),
}

impl OrganizationIdentifier {
    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Permanent(s) | Self::Temporary(s) => s,
        }
    }

    /// Consumes the identifier, returning the string.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Permanent(s) | Self::Temporary(s) => s,
        }
    }

    /// Returns true for temporary identifiers.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Checks an identifier against the URL-safe base64 alphabet.
    ///
    /// ## Errors
    ///
    /// Returns [`ModelError::InvalidIdentifier`] for empty identifiers or
    /// any character outside `[A-Za-z0-9_-]`.
    pub fn validate(identifier: &str) -> ModelResult<()> {
        let valid = !identifier.is_empty()
            && identifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(ModelError::InvalidIdentifier(identifier.to_string()))
        }
    }
}
