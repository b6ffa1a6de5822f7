//! # fedsync-core
//!
//! Configuration and error handling shared by the federation sync crates.
//!
//! Configuration is read from a TOML file and then overridden from the
//! environment (after loading a `.env` file, if present).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;

pub use config::{
    Config, DatabaseConfig, MetadataConfig, MissingRegistrationDate, RegistryConfig, SyncConfig,
};
pub use error::{Error, Result};
