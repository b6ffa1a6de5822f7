//! End-to-End Integration Tests
//!
//! Full reconciliation passes over scripted sources. The in-memory store
//! backs most tests; the Postgres tests need Docker and are ignored by
//! default.

mod common;
mod postgres;
mod reconciliation;
