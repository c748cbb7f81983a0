//! Live schema introspection through catalog queries.
//!
//! Each backend supplies catalog queries whose result columns follow a fixed
//! positional layout; the row decoders here read cells by position, so the
//! catalog's own column names do not matter.
//!
//! | Query       | Columns                                                                        |
//! |-------------|--------------------------------------------------------------------------------|
//! | columns     | name, data type, width, scale, nullable, default, primary, auto-increment     |
//! | indexes     | index name, column name, position in index, unique, primary                    |
//! | constraints | name, kind, columns (comma list), referenced table, referenced columns (list) |

use std::collections::HashMap;

use tracing::debug;

use crate::error::{BackendError, Result};

use super::identifier::{fetch_columns, strip_quotes};
use super::schema::{
    is_bounded_text_type, ColumnKind, ColumnSpec, ConstraintKind, IndexSpec, TableConstraint,
};
use super::traits::{Backend, Capability, Executor};
use super::value::{Row, SqlValue};

/// A catalog query and its bound arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub sql: String,
    pub args: Vec<SqlValue<'static>>,
}

impl CatalogQuery {
    /// Query bound to a single table-name argument.
    pub fn for_table(sql: impl Into<String>, table: &str) -> Self {
        Self {
            sql: sql.into(),
            args: vec![SqlValue::from(table.to_string())],
        }
    }
}

/// One row of the columns catalog query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub data_type: String,
    pub width: u32,
    pub scale: u32,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary: bool,
    pub auto_increment: bool,
}

fn cell_u32(row: &Row, idx: usize) -> u32 {
    row.get_i64(idx)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

fn missing(what: &str, idx: usize) -> BackendError {
    BackendError::driver(format!("catalog row has no {what} at position {idx}"))
}

impl CatalogColumn {
    pub fn from_row(row: &Row) -> Result<Self> {
        let name = row.get_str(0).ok_or_else(|| missing("column name", 0))?;
        let data_type = row.get_str(1).ok_or_else(|| missing("data type", 1))?;
        Ok(Self {
            name: name.trim().to_string(),
            data_type: data_type.trim().to_string(),
            width: cell_u32(row, 2),
            scale: cell_u32(row, 3),
            nullable: row.get_bool(4).unwrap_or(true),
            default: row.get_str(5).map(|s| s.trim().to_string()),
            primary: row.get_bool(6).unwrap_or(false),
            auto_increment: row.get_bool(7).unwrap_or(false),
        })
    }
}

/// One row of the indexes catalog query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub index_name: String,
    pub column_name: String,
    pub position: i64,
    pub unique: bool,
    pub primary: bool,
}

impl IndexRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            index_name: row
                .get_str(0)
                .ok_or_else(|| missing("index name", 0))?
                .to_string(),
            column_name: row
                .get_str(1)
                .ok_or_else(|| missing("column name", 1))?
                .to_string(),
            position: row.get_i64(2).unwrap_or(0),
            unique: row.get_bool(3).unwrap_or(false),
            primary: row.get_bool(4).unwrap_or(false),
        })
    }
}

/// One row of the constraints catalog query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRow {
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    pub ref_table: Option<String>,
    pub ref_columns: Vec<String>,
}

impl ConstraintRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        let name = row.get_str(0).ok_or_else(|| missing("constraint name", 0))?;
        let kind = match row.get_str(1).map(|s| s.trim().to_uppercase()).as_deref() {
            Some("FOREIGN KEY" | "R" | "F") => ConstraintKind::ForeignKey,
            Some("UNIQUE" | "U") => ConstraintKind::Unique,
            other => {
                return Err(BackendError::driver(format!(
                    "unknown constraint kind {:?}",
                    other
                )))
            }
        };
        Ok(Self {
            name: name.to_string(),
            kind,
            columns: row.get_str(2).map(fetch_columns).unwrap_or_default(),
            ref_table: row
                .get_str(3)
                .map(strip_quotes)
                .filter(|s| !s.is_empty())
                .map(String::from),
            ref_columns: row.get_str(4).map(fetch_columns).unwrap_or_default(),
        })
    }

    pub fn into_constraint(self) -> TableConstraint {
        TableConstraint {
            name: self.name,
            kind: self.kind,
            columns: self.columns,
            ref_table: self.ref_table,
            ref_columns: self.ref_columns,
        }
    }
}

/// Strip a single pair of surrounding single quotes from a catalog default.
pub fn unquote_default(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
    {
        Some(inner) => inner.replace("''", "'"),
        None => trimmed.to_string(),
    }
}

/// Convert a catalog column using the common type conventions.
///
/// The width is kept only for bounded text and decimals, matching what type
/// mapping produces for declared columns.
pub fn column_from_catalog(column: &CatalogColumn) -> ColumnSpec {
    let kind = ColumnKind::from_catalog_type(&column.data_type);
    let sql_type = column
        .data_type
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase();

    let (width, precision) = match kind {
        ColumnKind::Decimal => (column.width, column.scale),
        ColumnKind::Text | ColumnKind::Compound if is_bounded_text_type(&sql_type) => {
            (column.width, 0)
        }
        _ => (0, 0),
    };

    let default = column.default.as_deref().map(|d| {
        if kind.quotes_default() {
            unquote_default(d)
        } else {
            d.to_string()
        }
    });

    ColumnSpec {
        name: column.name.clone(),
        kind,
        sql_type,
        width,
        precision,
        nullable: column.nullable,
        primary: column.primary,
        default,
        auto_increment: column.auto_increment,
    }
}

/// Group index rows by index name.
///
/// Groups appear in first-seen order; columns within a group are ordered by
/// their position in the index. The primary key pseudo-index is included.
pub fn group_index_rows(rows: Vec<IndexRow>) -> Vec<IndexSpec> {
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(IndexSpec, Vec<(i64, String)>)> = Vec::new();

    for row in rows {
        let slot = match order.get(&row.index_name) {
            Some(&slot) => slot,
            None => {
                let slot = groups.len();
                order.insert(row.index_name.clone(), slot);
                let mut spec = IndexSpec::new(row.index_name.clone(), Vec::<String>::new());
                spec.unique = row.unique || row.primary;
                spec.primary = row.primary;
                groups.push((spec, Vec::new()));
                slot
            }
        };
        groups[slot].1.push((row.position, row.column_name));
    }

    groups
        .into_iter()
        .map(|(mut spec, mut members)| {
            members.sort_by_key(|(position, _)| *position);
            spec.columns = members.into_iter().map(|(_, name)| name).collect();
            spec
        })
        .collect()
}

/// Live columns of `table`.
pub async fn fetch_column_specs<B: Backend + ?Sized>(
    backend: &B,
    db: &dyn Executor,
    table: &str,
) -> Result<Vec<ColumnSpec>> {
    const OPERATION: &str = "fetch column specs";

    let query = backend.columns_catalog_query(table);
    let rows = db
        .query(&query.sql, &query.args)
        .await
        .map_err(|e| BackendError::introspection(OPERATION, table, e))?;

    let columns = rows
        .iter()
        .map(|row| CatalogColumn::from_row(row).map(|c| backend.column_from_catalog(&c)))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| BackendError::introspection(OPERATION, table, e))?;

    debug!(
        backend = backend.name(),
        table,
        columns = columns.len(),
        "Fetched column specs"
    );
    Ok(columns)
}

/// Live secondary indexes and constraints of `table`.
///
/// Fails with `UnsupportedOperation` when the backend has no index support.
pub async fn fetch_indexes_and_constraints<B: Backend + ?Sized>(
    backend: &B,
    db: &dyn Executor,
    table: &str,
) -> Result<(Vec<IndexSpec>, Vec<TableConstraint>)> {
    backend.require(Capability::IndexesAndConstraints)?;

    let query = backend.indexes_catalog_query(table);
    let rows = db
        .query(&query.sql, &query.args)
        .await
        .map_err(|e| BackendError::introspection("fetch indexes", table, e))?;
    let index_rows = rows
        .iter()
        .map(IndexRow::from_row)
        .collect::<Result<Vec<_>>>()
        .map_err(|e| BackendError::introspection("fetch indexes", table, e))?;

    let indexes: Vec<IndexSpec> = group_index_rows(index_rows)
        .into_iter()
        .filter(|i| !i.primary)
        .collect();

    let constraints = match backend.constraints_catalog_query(table) {
        Some(query) => {
            let rows = db
                .query(&query.sql, &query.args)
                .await
                .map_err(|e| BackendError::introspection("fetch constraints", table, e))?;
            rows.iter()
                .map(|r| ConstraintRow::from_row(r).map(ConstraintRow::into_constraint))
                .collect::<Result<Vec<_>>>()
                .map_err(|e| BackendError::introspection("fetch constraints", table, e))?
        }
        None => Vec::new(),
    };

    debug!(
        backend = backend.name(),
        table,
        indexes = indexes.len(),
        constraints = constraints.len(),
        "Fetched indexes and constraints"
    );
    Ok((indexes, constraints))
}

/// Table names of the current schema.
pub async fn fetch_tables<B: Backend + ?Sized>(backend: &B, db: &dyn Executor) -> Result<Vec<String>> {
    let rows = db
        .query(backend.tables_catalog_sql(), &[])
        .await
        .map_err(|e| BackendError::introspection("fetch tables", "*", e))?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get_str(0).map(String::from))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::rows_from;

    fn text(s: &str) -> SqlValue<'static> {
        SqlValue::from(s.to_string())
    }

    fn index_row(index: &str, column: &str, position: i64) -> IndexRow {
        IndexRow {
            index_name: index.to_string(),
            column_name: column.to_string(),
            position,
            unique: false,
            primary: false,
        }
    }

    #[test]
    fn test_group_index_rows_first_seen_order() {
        let rows = vec![
            index_row("ix_b", "y", 2),
            index_row("ix_a", "a", 1),
            index_row("ix_b", "x", 1),
            index_row("ix_a", "b", 2),
        ];

        let grouped = group_index_rows(rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].name, "ix_b");
        assert_eq!(grouped[0].columns, vec!["x", "y"]);
        assert_eq!(grouped[1].name, "ix_a");
        assert_eq!(grouped[1].columns, vec!["a", "b"]);
    }

    #[test]
    fn test_group_index_rows_primary_flag() {
        let mut pk = index_row("PRIMARY", "id", 1);
        pk.primary = true;
        let grouped = group_index_rows(vec![pk]);
        assert!(grouped[0].primary);
        assert!(grouped[0].unique);
    }

    #[test]
    fn test_catalog_column_decoding() {
        let rows = rows_from(
            &["COLUMN_NAME", "DATA_TYPE", "LEN", "SCALE", "NULLABLE", "DEF", "PK", "AI"],
            vec![vec![
                text("status"),
                text("varchar"),
                SqlValue::I64(32),
                SqlValue::Null,
                text("NO"),
                text("'new'"),
                SqlValue::I64(0),
                SqlValue::Null,
            ]],
        );

        let col = CatalogColumn::from_row(&rows[0]).unwrap();
        assert_eq!(col.width, 32);
        assert!(!col.nullable);

        let spec = column_from_catalog(&col);
        assert_eq!(spec.kind, ColumnKind::Text);
        assert_eq!(spec.type_string(), "VARCHAR(32)");
        assert_eq!(spec.default.as_deref(), Some("new"));
        assert!(!spec.primary);
    }

    #[test]
    fn test_catalog_text_width_dropped() {
        let col = CatalogColumn {
            name: "body".into(),
            data_type: "text".into(),
            width: 65535,
            scale: 0,
            nullable: true,
            default: None,
            primary: false,
            auto_increment: false,
        };
        let spec = column_from_catalog(&col);
        assert_eq!(spec.width, 0);
        assert_eq!(spec.type_string(), "TEXT");
    }

    #[test]
    fn test_catalog_decimal() {
        let col = CatalogColumn {
            name: "price".into(),
            data_type: "DECIMAL".into(),
            width: 10,
            scale: 2,
            nullable: true,
            default: Some("0.00".into()),
            primary: false,
            auto_increment: false,
        };
        let spec = column_from_catalog(&col);
        assert_eq!(spec.type_string(), "DECIMAL(10, 2)");
        assert_eq!(spec.default.as_deref(), Some("0.00"));
    }

    #[test]
    fn test_constraint_row() {
        let rows = rows_from(
            &["name", "kind", "cols", "ref_table", "ref_cols"],
            vec![vec![
                text("fk_orders_customer"),
                text("FOREIGN KEY"),
                text("`tenant_id`,`customer_id`"),
                text("customers"),
                text("tenant_id,id"),
            ]],
        );
        let c = ConstraintRow::from_row(&rows[0]).unwrap().into_constraint();
        assert_eq!(c.kind, ConstraintKind::ForeignKey);
        assert_eq!(c.columns, vec!["tenant_id", "customer_id"]);
        assert_eq!(c.ref_table.as_deref(), Some("customers"));
        assert_eq!(c.ref_columns, vec!["tenant_id", "id"]);
    }

    #[test]
    fn test_unquote_default() {
        assert_eq!(unquote_default("'it''s'"), "it's");
        assert_eq!(unquote_default("CURRENT_TIMESTAMP"), "CURRENT_TIMESTAMP");
    }
}
