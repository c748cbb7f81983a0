//! PostgreSQL backend.
//!
//! - [`PostgresBackend`]: SQL syntax, type mapping and catalog queries

mod dialect;

pub use dialect::{PostgresBackend, TEXT_POLICY};
