//! ClickHouse backend.
//!
//! - [`ClickHouseBackend`]: SQL syntax, type mapping and catalog queries

mod dialect;

pub use dialect::ClickHouseBackend;
