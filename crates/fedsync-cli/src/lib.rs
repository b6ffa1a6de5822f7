//! # fedsync-cli
//!
//! The `fedsync` binary. Each invocation runs one pass:
//! - `fedsync metadata` reconciles against the signed SAML metadata feed
//! - `fedsync registry` reconciles against the registry export API
//! - `fedsync migrate` applies the database schema
//!
//! Runs are meant to be scheduled externally and must not overlap.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use error::{CliError, CliResult};
