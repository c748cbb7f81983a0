//! Core traits for dialect backends and execution handles.
//!
//! - [`Backend`]: per-dialect capability flags, quoting, SQL templates,
//!   type mapping, DDL generation and catalog introspection
//! - [`Executor`]: a parameterized execution handle (connection pool)
//!
//! # Design Patterns
//!
//! - **Strategy**: each dialect is an interchangeable [`Backend`]
//! - **Template Method**: default trait methods define the algorithm
//!   skeletons (CREATE generation, upsert planning, introspection) and
//!   dialects override only the steps that differ

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BackendError, Result};

use super::create;
use super::field::{FieldKind, TagMap};
use super::identifier::{escape_with, quote_list, quote_with};
use super::introspect::{self, CatalogColumn, CatalogQuery};
use super::schema::{ColumnSpec, IndexSpec, TableConstraint, TableSpec};
use super::template::{render, Placeholder, TemplateArgs};
use super::upsert::{self, UpsertRequest, UpsertStatement};
use super::value::{ExecResult, PoolStats, Row, SqlValue};

/// A SQL feature a backend may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Update,
    Insert,
    InsertOrUpdate,
    RowsAffected,
    IndexesAndConstraints,
}

impl Capability {
    fn operation(self) -> &'static str {
        match self {
            Capability::Update => "update",
            Capability::Insert => "insert",
            Capability::InsertOrUpdate => "insert-or-update",
            Capability::RowsAffected => "rows-affected",
            Capability::IndexesAndConstraints => "indexes and constraints",
        }
    }
}

/// Capability flags advertised by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub update: bool,
    pub insert: bool,
    pub insert_or_update: bool,
    pub rows_affected: bool,
    pub indexes_and_constraints: bool,
}

impl Capabilities {
    /// Every capability enabled.
    pub const ALL: Capabilities = Capabilities {
        update: true,
        insert: true,
        insert_or_update: true,
        rows_affected: true,
        indexes_and_constraints: true,
    };

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Update => self.update,
            Capability::Insert => self.insert,
            Capability::InsertOrUpdate => self.insert_or_update,
            Capability::RowsAffected => self.rows_affected,
            Capability::IndexesAndConstraints => self.indexes_and_constraints,
        }
    }
}

/// Parameterized execution handle.
///
/// Implementations own pooling, timeouts and cancellation, and must be
/// safe to share across tasks.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a statement that returns no rows.
    async fn exec(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<ExecResult>;

    /// Execute a query and collect its rows.
    async fn query(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<Vec<Row>>;

    /// Execute a query and return its first row, if any.
    async fn query_row(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<Option<Row>> {
        Ok(self.query(sql, args).await?.into_iter().next())
    }

    /// Connection pool statistics.
    fn stats(&self) -> PoolStats;

    /// Close the connection pool.
    async fn close(&self);
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn exec(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<ExecResult> {
        (**self).exec(sql, args).await
    }

    async fn query(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<Vec<Row>> {
        (**self).query(sql, args).await
    }

    async fn query_row(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<Option<Row>> {
        (**self).query_row(sql, args).await
    }

    fn stats(&self) -> PoolStats {
        (**self).stats()
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Per-dialect SQL strategy.
///
/// Identifiers embedded in templates are wrapped by the template's own
/// quote characters; list placeholders (`Columns`) receive pre-quoted text.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable identity name (e.g. "dameng", "mysql").
    fn name(&self) -> &str;

    /// Capability flags.
    fn capabilities(&self) -> Capabilities;

    /// Whether the backend supports UPDATE.
    fn can_update(&self) -> bool {
        self.capabilities().update
    }

    /// Whether the backend supports INSERT.
    fn can_insert(&self) -> bool {
        self.capabilities().insert
    }

    /// Whether the backend supports an atomic insert-or-update.
    fn can_insert_or_update(&self) -> bool {
        self.capabilities().insert_or_update
    }

    /// Whether execution results report affected rows.
    fn can_support_rows_affected(&self) -> bool {
        self.capabilities().rows_affected
    }

    /// Whether the backend manages secondary indexes and constraints.
    fn is_support_indexes_and_constraints(&self) -> bool {
        self.capabilities().indexes_and_constraints
    }

    /// Fail with `UnsupportedOperation` unless `capability` is enabled.
    fn require(&self, capability: Capability) -> Result<()> {
        if self.capabilities().supports(capability) {
            Ok(())
        } else {
            Err(BackendError::unsupported(self.name(), capability.operation()))
        }
    }

    /// Identifier quote character(s).
    fn quote_char(&self) -> &'static str;

    /// Quote an identifier with [`quote_char`](Backend::quote_char).
    fn quote_ident(&self, name: &str) -> String {
        quote_with(self.quote_char(), name)
    }

    /// Escape an identifier for a template slot that the template already
    /// wraps in [`quote_char`](Backend::quote_char).
    fn escape_ident(&self, name: &str) -> String {
        escape_with(self.quote_char(), name)
    }

    // ===== Templates =====

    /// Placeholders: Unique, Index, Table, Columns.
    fn create_index_sql_template(&self) -> &'static str;

    /// Placeholders: Index, Table.
    fn drop_index_sql_template(&self) -> &'static str;

    /// Placeholders: Table, Columns, Values.
    fn insert_sql_template(&self) -> &'static str;

    /// Placeholders: Table, Columns (assignments), Conditions.
    fn update_sql_template(&self) -> &'static str;

    /// Native insert-or-update template, if the dialect has one.
    ///
    /// Placeholders: Table, Columns, Values, Conditions (key columns),
    /// SetValues.
    fn insert_or_update_sql_template(&self) -> Option<&'static str> {
        None
    }

    /// Query listing the tables of the current schema, one name per row.
    fn tables_catalog_sql(&self) -> &'static str;

    // ===== Expressions =====

    /// Current UTC timestamp expression.
    fn current_utc_timestamp_expression(&self) -> &'static str;

    /// Current local timestamp expression.
    fn current_timestamp_expression(&self) -> &'static str;

    /// Keyword appended to auto-increment column definitions.
    fn auto_increment_keyword(&self) -> &'static str {
        ""
    }

    /// Clause appended after the column list of CREATE TABLE.
    fn table_options(&self) -> &'static str {
        ""
    }

    // ===== DDL =====

    /// Column clause for CREATE TABLE.
    fn column_definition(&self, column: &ColumnSpec) -> String {
        column.definition_string(self.quote_char(), self.auto_increment_keyword())
    }

    /// Primary key clause for CREATE TABLE.
    fn primary_key_clause(&self, primaries: &[&ColumnSpec]) -> String {
        let names: Vec<&str> = primaries.iter().map(|c| c.name.as_str()).collect();
        format!("PRIMARY KEY ({})", quote_list(self.quote_char(), &names))
    }

    /// CREATE TABLE followed by one CREATE INDEX per secondary index.
    fn get_create_sqls(&self, table: &TableSpec) -> Result<Vec<String>> {
        create::create_sqls(self, table)
    }

    // ===== Type mapping =====

    /// Map a host field to a column of this dialect.
    ///
    /// Unmapped kinds fail with `NoTypeMapping`, which callers must treat
    /// as a schema-definition error.
    fn map_field(
        &self,
        kind: &FieldKind,
        field_name: &str,
        tags: &TagMap,
        is_pointer: bool,
    ) -> Result<ColumnSpec>;

    /// Convert a catalog column row to a column spec.
    fn column_from_catalog(&self, column: &CatalogColumn) -> ColumnSpec {
        introspect::column_from_catalog(column)
    }

    // ===== Rendering =====

    /// Render an INSERT for pre-quoted columns and placeholder values.
    fn render_insert(&self, table: &str, columns: &[String], values: &[String]) -> Result<String> {
        self.require(Capability::Insert)?;
        render(
            self.insert_sql_template(),
            &TemplateArgs::new()
                .set(Placeholder::Table, self.escape_ident(table))
                .set(Placeholder::Columns, columns.join(", "))
                .set(Placeholder::Values, values.join(", ")),
        )
    }

    /// Render an UPDATE from `col = expr` assignments and AND-ed conditions.
    fn render_update(
        &self,
        table: &str,
        assignments: &[String],
        conditions: &[String],
    ) -> Result<String> {
        self.require(Capability::Update)?;
        render(
            self.update_sql_template(),
            &TemplateArgs::new()
                .set(Placeholder::Table, self.escape_ident(table))
                .set(Placeholder::Columns, assignments.join(", "))
                .set(Placeholder::Conditions, conditions.join(" AND ")),
        )
    }

    /// Render CREATE INDEX for a secondary index.
    fn render_create_index(&self, table: &str, index: &IndexSpec) -> Result<String> {
        self.require(Capability::IndexesAndConstraints)?;
        render(
            self.create_index_sql_template(),
            &TemplateArgs::new()
                .set(Placeholder::Unique, if index.unique { "UNIQUE " } else { "" })
                .set(Placeholder::Index, self.escape_ident(&index.name))
                .set(Placeholder::Table, self.escape_ident(table))
                .set(Placeholder::Columns, quote_list(self.quote_char(), &index.columns)),
        )
    }

    /// Render DROP INDEX.
    fn render_drop_index(&self, table: &str, index_name: &str) -> Result<String> {
        self.require(Capability::IndexesAndConstraints)?;
        render(
            self.drop_index_sql_template(),
            &TemplateArgs::new()
                .set(Placeholder::Index, self.escape_ident(index_name))
                .set(Placeholder::Table, self.escape_ident(table)),
        )
    }

    /// Plan one atomic insert-or-update statement and its parameters.
    fn prepare_insert_or_update<'a>(
        &self,
        request: &UpsertRequest<'a>,
    ) -> Result<UpsertStatement<'a>> {
        self.require(Capability::InsertOrUpdate)?;
        upsert::plan_from_template(self, request)
    }

    // ===== Introspection =====

    /// Catalog query for live columns. See [`CatalogColumn`] for the row layout.
    fn columns_catalog_query(&self, table: &str) -> CatalogQuery;

    /// Catalog query for index members. See [`introspect::IndexRow`].
    fn indexes_catalog_query(&self, table: &str) -> CatalogQuery;

    /// Catalog query for constraints. See [`introspect::ConstraintRow`].
    fn constraints_catalog_query(&self, _table: &str) -> Option<CatalogQuery> {
        None
    }

    /// Live columns of `table` in catalog order.
    async fn fetch_column_specs(&self, db: &dyn Executor, table: &str) -> Result<Vec<ColumnSpec>> {
        introspect::fetch_column_specs(self, db, table).await
    }

    /// Live secondary indexes and constraints of `table`.
    async fn fetch_indexes_and_constraints(
        &self,
        db: &dyn Executor,
        table: &str,
    ) -> Result<(Vec<IndexSpec>, Vec<TableConstraint>)> {
        introspect::fetch_indexes_and_constraints(self, db, table).await
    }

    /// Names of the tables in the current schema.
    async fn fetch_tables(&self, db: &dyn Executor) -> Result<Vec<String>> {
        introspect::fetch_tables(self, db).await
    }
}
