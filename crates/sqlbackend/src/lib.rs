//! # sqlbackend
//!
//! Pluggable SQL dialect backends.
//!
//! A [`Backend`] turns a dialect-neutral table model into SQL text for one
//! database engine:
//!
//! - **DDL** from [`TableSpec`] values built from host field metadata
//! - **Upserts** as a single MERGE or `ON CONFLICT` / `ON DUPLICATE KEY`
//!   statement with a flattened parameter list
//! - **Introspection** of live columns, indexes and constraints through
//!   any [`Executor`]
//! - **Traced execution** that tags every statement with a correlation id
//!   and the originating call site
//!
//! ## Example
//!
//! ```rust
//! use sqlbackend::{BackendRegistry, FieldKind, FieldMeta, TableSpec};
//!
//! let registry = BackendRegistry::with_builtins();
//! let backend = registry.lookup("postgres")?;
//!
//! let fields = [
//!     FieldMeta::new("id", FieldKind::Int32).tag("primary", "true"),
//!     FieldMeta::new("status", FieldKind::String),
//! ];
//! let table = TableSpec::from_fields(backend.as_ref(), "orders", &fields)?;
//! let sqls = backend.get_create_sqls(&table)?;
//! assert_eq!(sqls[0], r#"CREATE TABLE "orders" ("id" INT NOT NULL, "status" TEXT, PRIMARY KEY ("id"))"#);
//! # Ok::<(), sqlbackend::BackendError>(())
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod trace;

// Re-exports for convenient access
pub use config::{Config, PoolConfig, TableConfig, TraceConfig};
pub use crate::core::{
    Backend, BackendRegistry, Capabilities, Capability, ColumnKind, ColumnSpec, ExecResult,
    Executor, FieldKind, FieldMeta, IndexSpec, PoolStats, Row, SqlValue, TableConstraint,
    TableSpec, UpsertRequest, UpsertStatement,
};
pub use drivers::{ClickHouseBackend, DamengBackend, MysqlBackend, PostgresBackend};
#[cfg(feature = "mysql")]
pub use drivers::MysqlExecutor;
pub use error::{BackendError, Result};
pub use trace::{CallContext, CallSite, CallerAttribution, TracedExecutor};
