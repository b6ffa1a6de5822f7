//! Engine settings derived from configuration.

use fedsync_core::{Config, MissingRegistrationDate, SyncConfig};
use fedsync_model::{IdentifierPolicy, DEFAULT_DESCRIPTION_LIMIT};

/// Reconciliation policy for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Organization identifier derivation.
    pub identifiers: IdentifierPolicy,
    /// Length bound for attribute descriptions.
    pub description_limit: usize,
    /// Activation policy for metadata entities without a registration date.
    pub missing_registration_date: MissingRegistrationDate,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            identifiers: IdentifierPolicy::default(),
            description_limit: DEFAULT_DESCRIPTION_LIMIT,
            missing_registration_date: MissingRegistrationDate::default(),
        }
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            identifiers: IdentifierPolicy {
                namespace: config.identifier_namespace.clone(),
                temporary_prefix: config.temporary_prefix.clone(),
            },
            description_limit: config.description_limit,
            missing_registration_date: config.missing_registration_date,
        }
    }
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self::from(&config.sync)
    }
}
