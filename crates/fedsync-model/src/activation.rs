//! Activation intervals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::object::FederationObjectRef;

/// The activation interval of a federation object.
///
/// The sync engine keeps at most one row per object and updates it in place.
/// An object is active at `t` when its row has no `deactivated_at` or the
/// deactivation lies after `t`. An object without a row is not active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    /// Unique row id.
    pub id: Uuid,
    /// The object this interval belongs to.
    pub federation_object: FederationObjectRef,
    /// Start of the interval.
    pub activated_at: DateTime<Utc>,
    /// End of the interval; open when `None`.
    pub deactivated_at: Option<DateTime<Utc>>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Activation {
    /// Creates a new activation row.
    #[must_use]
    pub fn new(
        federation_object: FederationObjectRef,
        activated_at: DateTime<Utc>,
        deactivated_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            federation_object,
            activated_at,
            deactivated_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true when the interval covers `at`.
    #[must_use]
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.activated_at <= at && self.deactivated_at.map_or(true, |end| end > at)
    }

    /// Returns true when the interval has no end, or ends after `at`.
    ///
    /// This is the predicate sweeps use: a future activation still counts,
    /// since the object was seen by its source.
    #[must_use]
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        self.deactivated_at.map_or(true, |end| end > at)
    }

    /// Checks the persistence invariants.
    ///
    /// ## Errors
    ///
    /// Returns [`ModelError::InvertedActivation`] when `deactivated_at`
    /// precedes `activated_at`.
    pub fn validate(&self) -> ModelResult<()> {
        match self.deactivated_at {
            Some(end) if end < self.activated_at => Err(ModelError::InvertedActivation {
                object: self.federation_object.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
