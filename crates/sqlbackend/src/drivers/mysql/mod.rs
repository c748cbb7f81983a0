//! MySQL/MariaDB backend.
//!
//! - [`MysqlBackend`]: SQL syntax, type mapping and catalog queries
//! - [`MysqlExecutor`]: connection pool implementing `Executor`
//!   (feature `mysql`)
//!
//! # Feature Flag
//!
//! The execution handle is only available when the `mysql` feature is
//! enabled:
//!
//! ```toml
//! [dependencies]
//! sqlbackend = { version = "0.1", features = ["mysql"] }
//! ```

mod dialect;
#[cfg(feature = "mysql")]
mod executor;

pub use dialect::{MysqlBackend, TEXT_POLICY};
#[cfg(feature = "mysql")]
pub use executor::MysqlExecutor;
