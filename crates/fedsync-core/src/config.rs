//! Configuration management for federation sync.
//!
//! A TOML file provides the base configuration; environment variables
//! override individual values. Every section has defaults, so an empty file
//! (or no file) plus `DATABASE_URL` is enough to run a metadata sync.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "FEDSYNC_CONFIG";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Canonical store connection.
    pub database: DatabaseConfig,
    /// Signed SAML metadata feed.
    pub metadata: MetadataConfig,
    /// Registry export API.
    pub registry: RegistryConfig,
    /// Reconciliation policy.
    pub sync: SyncConfig,
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Minimum number of connections in the pool.
    pub min_connections: u32,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/federation".to_string(),
            min_connections: 1,
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

/// Metadata feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Feed URL. When set, the feed owns identity and service providers.
    pub url: Option<String>,
    /// PEM certificate the feed signature must verify against.
    pub cert_path: Option<PathBuf>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            url: None,
            cert_path: None,
            timeout_secs: 60,
        }
    }
}

impl MetadataConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Registry export API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the export API.
    pub url: Option<String>,
    /// Shared secret sent with every export request.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Whether registry sync owns identity and service providers.
    ///
    /// Defaults to true only when no metadata feed is configured.
    pub sync_saml_entities: Option<bool>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            timeout_secs: 60,
            sync_saml_entities: None,
        }
    }
}

impl RegistryConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How a metadata entity without a usable registration date is activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRegistrationDate {
    /// Keep whatever activation the entity already has (none for new entities).
    #[default]
    LeaveUnchanged,
    /// Activate the entity as of the run's start time.
    ActivateNow,
}

/// Reconciliation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Namespace mixed into permanent organization identifiers.
    pub identifier_namespace: String,
    /// Prefix marking metadata-assigned organization identifiers.
    pub temporary_prefix: String,
    /// Length bound for attribute descriptions.
    pub description_limit: usize,
    /// Activation policy for metadata entities without a registration date.
    pub missing_registration_date: MissingRegistrationDate,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            identifier_namespace: "aaf".to_string(),
            temporary_prefix: "metadata_".to_string(),
            description_limit: 255,
            missing_registration_date: MissingRegistrationDate::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a file and the environment.
    ///
    /// The file is `path` if given, else the file named by `FEDSYNC_CONFIG`,
    /// else none. A `.env` file, if present, is loaded before the environment
    /// is read.
    ///
    /// ## Errors
    ///
    /// Fails when `.env` or the file cannot be read or parsed, or the result
    /// does not pass [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        check_dotenv(dotenvy::dotenv())?;

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration file");
                let content = std::fs::read_to_string(&path).map_err(|source| Error::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from TOML.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::Parse`] for malformed input.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Applies overrides from a variable lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(url) = lookup("FEDSYNC_METADATA_URL") {
            self.metadata.url = Some(url);
        }
        if let Some(cert) = lookup("FEDSYNC_METADATA_CERT") {
            self.metadata.cert_path = Some(PathBuf::from(cert));
        }
        if let Some(url) = lookup("FEDSYNC_REGISTRY_URL") {
            self.registry.url = Some(url);
        }
        if let Some(secret) = lookup("FEDSYNC_REGISTRY_SECRET") {
            self.registry.secret = Some(secret);
        }
    }

    /// Checks that the configuration is usable.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::Config`] naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(Error::config("database.url must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(Error::config("database.max_connections must be at least 1"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(Error::config(
                "database.min_connections must not exceed database.max_connections",
            ));
        }
        if self.metadata.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(Error::config("metadata.url must not be empty when set"));
        }
        if self.registry.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(Error::config("registry.url must not be empty when set"));
        }
        if self.sync.description_limit == 0 {
            return Err(Error::config("sync.description_limit must be at least 1"));
        }
        let prefix_ok = !self.sync.temporary_prefix.is_empty()
            && self
                .sync
                .temporary_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !prefix_ok {
            return Err(Error::config(
                "sync.temporary_prefix must be non-empty and use only [A-Za-z0-9_-]",
            ));
        }
        Ok(())
    }

    /// Returns whether registry sync should process identity and service providers.
    #[must_use]
    pub fn registry_syncs_saml_entities(&self) -> bool {
        self.registry
            .sync_saml_entities
            .unwrap_or(self.metadata.url.is_none())
    }

    /// Returns the metadata feed URL.
    ///
    /// ## Errors
    ///
    /// Fails when no feed is configured.
    pub fn metadata_url(&self) -> Result<&str> {
        self.metadata
            .url
            .as_deref()
            .ok_or_else(|| Error::config("metadata.url (FEDSYNC_METADATA_URL) is not set"))
    }

    /// Returns the registry base URL and export secret.
    ///
    /// ## Errors
    ///
    /// Fails when either is missing.
    pub fn registry_endpoint(&self) -> Result<(&str, &str)> {
        let url = self
            .registry
            .url
            .as_deref()
            .ok_or_else(|| Error::config("registry.url (FEDSYNC_REGISTRY_URL) is not set"))?;
        let secret = self.registry.secret.as_deref().ok_or_else(|| {
            Error::config("registry.secret (FEDSYNC_REGISTRY_SECRET) is not set")
        })?;
        Ok((url, secret))
    }
}

/// A missing `.env` is fine; an unreadable or malformed one is not.
fn check_dotenv(loaded: std::result::Result<PathBuf, dotenvy::Error>) -> Result<()> {
    match loaded {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loaded .env");
            Ok(())
        }
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(Error::config(format!("invalid .env file: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_dotenv_is_ignored_but_malformed_fails() {
        assert!(check_dotenv(Ok(PathBuf::from(".env"))).is_ok());

        let missing = dotenvy::Error::Io(std::io::ErrorKind::NotFound.into());
        assert!(check_dotenv(Err(missing)).is_ok());

        let malformed = dotenvy::Error::LineParse("DATABASE_URL postgres://".to_string(), 13);
        let err = check_dotenv(Err(malformed)).unwrap_err();
        assert!(matches!(err, Error::Config(message) if message.starts_with("invalid .env")));

        let unreadable = dotenvy::Error::Io(std::io::ErrorKind::PermissionDenied.into());
        assert!(check_dotenv(Err(unreadable)).is_err());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.description_limit, 255);
        assert_eq!(config.sync.temporary_prefix, "metadata_");
        assert_eq!(
            config.sync.missing_registration_date,
            MissingRegistrationDate::LeaveUnchanged
        );
    }

    #[test]
    fn parses_sections() {
        let config = Config::from_toml_str(
            r#"
            [database]
            url = "postgres://db/fed"
            max_connections = 2

            [metadata]
            url = "https://md.example.org/metadata.xml"
            cert_path = "/etc/fedsync/metadata.pem"

            [sync]
            identifier_namespace = "tuakiri"
            missing_registration_date = "activate_now"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.url, "postgres://db/fed");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(
            config.metadata.cert_path,
            Some(PathBuf::from("/etc/fedsync/metadata.pem"))
        );
        assert_eq!(config.sync.identifier_namespace, "tuakiri");
        assert_eq!(
            config.sync.missing_registration_date,
            MissingRegistrationDate::ActivateNow
        );
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://env/fed"),
            ("FEDSYNC_REGISTRY_URL", "https://registry.example.org"),
            ("FEDSYNC_REGISTRY_SECRET", "s3cret"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.database.url, "postgres://env/fed");
        assert_eq!(
            config.registry_endpoint().unwrap(),
            ("https://registry.example.org", "s3cret")
        );
        assert!(config.metadata_url().is_err());
    }

    #[test]
    fn saml_entity_ownership_follows_metadata_url() {
        let mut config = Config::default();
        assert!(config.registry_syncs_saml_entities());

        config.metadata.url = Some("https://md.example.org/metadata.xml".to_string());
        assert!(!config.registry_syncs_saml_entities());

        config.registry.sync_saml_entities = Some(true);
        assert!(config.registry_syncs_saml_entities());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.database.url = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.min_connections = 10;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sync.temporary_prefix = "tmp.".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn secret_is_not_serialized() {
        let mut config = Config::default();
        config.registry.secret = Some("s3cret".to_string());
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("s3cret"));
    }
}
