//! Dameng database backend.
//!
//! - [`DamengBackend`]: SQL syntax, type mapping and catalog queries

mod dialect;

pub use dialect::{DamengBackend, TEXT_POLICY};
