//! Core abstractions for dialect backends.
//!
//! - [`schema`]: table, column, index and constraint metadata
//! - [`field`]: host field metadata consumed by type mapping
//! - [`traits`]: the [`Backend`] and [`Executor`] traits
//! - [`registry`]: name-keyed backend registry
//! - [`template`]: `{{ .Placeholder }}` SQL template rendering
//! - [`upsert`]: MERGE and template-based insert-or-update planning
//! - [`introspect`]: catalog queries and row decoding
//! - [`value`]: bound arguments and result rows
//!
//! Dialect modules under `drivers/` implement [`Backend`]; everything here
//! is dialect-neutral.

pub mod create;
pub mod field;
pub mod identifier;
pub mod introspect;
pub mod registry;
pub mod schema;
pub mod template;
pub mod traits;
pub mod typemap;
pub mod upsert;
pub mod value;

pub use field::{FieldKind, FieldMeta, TagMap};
pub use introspect::{CatalogColumn, CatalogQuery};
pub use registry::BackendRegistry;
pub use schema::{ColumnKind, ColumnSpec, ConstraintKind, IndexSpec, TableConstraint, TableSpec};
pub use traits::{Backend, Capabilities, Capability, Executor};
pub use upsert::{UpsertRequest, UpsertStatement};
pub use value::{ExecResult, PoolStats, Row, SqlValue};
