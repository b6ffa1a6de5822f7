//! Model validation errors.

use thiserror::Error;

/// Errors raised when a domain object violates a model invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A required field is empty.
    #[error("{entity_type}: {field} must not be blank")]
    Blank {
        /// Type of entity.
        entity_type: &'static str,
        /// Offending field.
        field: &'static str,
    },

    /// An organization identifier contains characters outside the URL-safe base64 alphabet.
    #[error("invalid organization identifier '{0}'")]
    InvalidIdentifier(String),

    /// An activation ends before it starts.
    #[error("activation for {object} is deactivated before it was activated")]
    InvertedActivation {
        /// The federation object the activation belongs to.
        object: String,
    },
}

impl ModelError {
    /// Creates a blank-field error.
    #[must_use]
    pub const fn blank(entity_type: &'static str, field: &'static str) -> Self {
        Self::Blank { entity_type, field }
    }
}

/// Result type for model validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Fails with [`ModelError::Blank`] when `value` is empty after trimming.
pub(crate) fn require(entity_type: &'static str, field: &'static str, value: &str) -> ModelResult<()> {
    if value.trim().is_empty() {
        Err(ModelError::blank(entity_type, field))
    } else {
        Ok(())
    }
}
