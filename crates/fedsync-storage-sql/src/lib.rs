//! # fedsync-storage-sql
//!
//! `PostgreSQL` implementation of the federation store using `SQLx`.
//!
//! Every sync run executes inside one `SERIALIZABLE` transaction.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod convert;
mod entities;
pub mod error;
pub mod pool;
pub mod store;

pub use pool::{create_pool, run_migrations, PoolConfig};
pub use store::{PgFederationStore, PgTransaction};
