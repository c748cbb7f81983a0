//! ClickHouse SQL dialect (Strategy pattern).
//!
//! ClickHouse is append-oriented: no row-level UPDATE, no upsert, no
//! affected-row counts and no secondary indexes in the relational sense.
//! Tables are created on the MergeTree engine ordered by the primary key.

use async_trait::async_trait;
use tracing::warn;

use crate::core::field::{FieldKind, TagMap};
use crate::core::identifier::quote_list;
use crate::core::introspect::{self, CatalogColumn, CatalogQuery};
use crate::core::schema::{ColumnKind, ColumnSpec, TableSpec};
use crate::core::traits::{Backend, Capabilities};
use crate::core::typemap::{apply_stamp, apply_tags, decimal_column};
use crate::error::{BackendError, Result};

const COLUMNS_SQL: &str = r#"
SELECT
    name,
    type,
    0,
    0,
    startsWith(type, 'Nullable('),
    nullIf(default_expression, ''),
    is_in_primary_key,
    0
FROM system.columns
WHERE database = currentDatabase() AND table = ?
ORDER BY position
"#;

const INDEXES_SQL: &str = r#"
SELECT name, expr, 1, 0, 0
FROM system.data_skipping_indices
WHERE database = currentDatabase() AND table = ?
"#;

/// ClickHouse backend.
#[derive(Debug, Clone, Default)]
pub struct ClickHouseBackend;

impl ClickHouseBackend {
    /// Create a new ClickHouse backend instance.
    pub fn new() -> Self {
        Self
    }

    fn integer(name: &str, sql_type: &str) -> ColumnSpec {
        ColumnSpec::new(name, ColumnKind::Integer, sql_type)
    }
}

/// Unwrap `Nullable(T)` and `LowCardinality(T)` wrappers.
fn unwrap_type(data_type: &str) -> &str {
    let mut t = data_type.trim();
    for wrapper in ["Nullable(", "LowCardinality("] {
        if let Some(inner) = t.strip_prefix(wrapper).and_then(|s| s.strip_suffix(')')) {
            t = inner.trim();
        }
    }
    t
}

/// Precision and scale from `Decimal(P, S)` or `Decimal(P)`.
///
/// `system.columns` only reports them inside the type name.
fn decimal_args(data_type: &str) -> Option<(u32, u32)> {
    let args = data_type.split_once('(')?.1.trim().strip_suffix(')')?;
    let mut parts = args.split(',').map(|p| p.trim().parse::<u32>());
    let precision = parts.next()?.ok()?;
    let scale = match parts.next() {
        Some(scale) => scale.ok()?,
        None => 0,
    };
    Some((precision, scale))
}

#[async_trait]
impl Backend for ClickHouseBackend {
    fn name(&self) -> &str {
        "clickhouse"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            update: false,
            insert: true,
            insert_or_update: false,
            rows_affected: false,
            indexes_and_constraints: false,
        }
    }

    fn quote_char(&self) -> &'static str {
        "`"
    }

    fn create_index_sql_template(&self) -> &'static str {
        "ALTER TABLE `{{ .Table }}` ADD INDEX `{{ .Index }}` ({{ .Columns }}) TYPE minmax"
    }

    fn drop_index_sql_template(&self) -> &'static str {
        "ALTER TABLE `{{ .Table }}` DROP INDEX `{{ .Index }}`"
    }

    fn insert_sql_template(&self) -> &'static str {
        "INSERT INTO `{{ .Table }}` ({{ .Columns }}) VALUES ({{ .Values }})"
    }

    fn update_sql_template(&self) -> &'static str {
        "ALTER TABLE `{{ .Table }}` UPDATE {{ .Columns }} WHERE {{ .Conditions }}"
    }

    fn tables_catalog_sql(&self) -> &'static str {
        "SHOW TABLES"
    }

    fn current_utc_timestamp_expression(&self) -> &'static str {
        "now('UTC')"
    }

    fn current_timestamp_expression(&self) -> &'static str {
        "now()"
    }

    fn column_definition(&self, column: &ColumnSpec) -> String {
        let ty = if column.nullable && !column.primary {
            format!("Nullable({})", column.type_string())
        } else {
            column.type_string()
        };
        let mut def = format!("{} {}", self.quote_ident(&column.name), ty);
        if let Some(default) = column.default_string() {
            def.push_str(" DEFAULT ");
            def.push_str(&default);
        }
        def
    }

    fn get_create_sqls(&self, table: &TableSpec) -> Result<Vec<String>> {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        let primaries: Vec<&str> = table
            .primary_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();

        let mut sql = format!(
            "CREATE TABLE {} ({}) ENGINE = MergeTree()",
            self.quote_ident(&table.name),
            columns.join(", ")
        );
        if primaries.is_empty() {
            sql.push_str(" ORDER BY tuple()");
        } else {
            let keys = quote_list(self.quote_char(), &primaries);
            sql.push_str(&format!(" PRIMARY KEY ({keys}) ORDER BY ({keys})"));
        }

        if !table.indexes.is_empty() {
            warn!(
                table = %table.name,
                indexes = table.indexes.len(),
                "ClickHouse does not support secondary indexes, skipping"
            );
        }

        Ok(vec![sql])
    }

    fn map_field(
        &self,
        kind: &FieldKind,
        field_name: &str,
        tags: &TagMap,
        is_pointer: bool,
    ) -> Result<ColumnSpec> {
        let column = match kind {
            FieldKind::String => ColumnSpec::new(field_name, ColumnKind::Text, "String"),
            FieldKind::Int8 => Self::integer(field_name, "Int8"),
            FieldKind::Int16 => Self::integer(field_name, "Int16"),
            FieldKind::Int | FieldKind::Int32 => Self::integer(field_name, "Int32"),
            FieldKind::Int64 => Self::integer(field_name, "Int64"),
            FieldKind::Uint8 => Self::integer(field_name, "UInt8"),
            FieldKind::Uint16 => Self::integer(field_name, "UInt16"),
            FieldKind::Uint | FieldKind::Uint32 => Self::integer(field_name, "UInt32"),
            FieldKind::Uint64 => Self::integer(field_name, "UInt64"),
            FieldKind::Bool => ColumnSpec::new(field_name, ColumnKind::Boolean, "Bool"),
            FieldKind::Float32 => decimal_column(field_name, "Decimal", tags)
                .unwrap_or_else(|| ColumnSpec::new(field_name, ColumnKind::Float, "Float32")),
            FieldKind::Float64 => decimal_column(field_name, "Decimal", tags)
                .unwrap_or_else(|| ColumnSpec::new(field_name, ColumnKind::Float, "Float64")),
            FieldKind::Map | FieldKind::Slice | FieldKind::Serializable => {
                ColumnSpec::new(field_name, ColumnKind::Compound, "String")
            }
            FieldKind::TriState => {
                let mut column = apply_tags(
                    ColumnSpec::new(field_name, ColumnKind::TriState, "UInt8"),
                    tags,
                    is_pointer,
                );
                column.nullable = true;
                return Ok(column);
            }
            FieldKind::Time => {
                let column = apply_tags(
                    ColumnSpec::new(field_name, ColumnKind::DateTime, "DateTime"),
                    tags,
                    is_pointer,
                );
                return Ok(apply_stamp(column, tags, self.current_utc_timestamp_expression()));
            }
            FieldKind::Opaque(_) => {
                return Err(BackendError::no_type_mapping(field_name, kind));
            }
        };
        Ok(apply_tags(column, tags, is_pointer))
    }

    fn column_from_catalog(&self, column: &CatalogColumn) -> ColumnSpec {
        let inner = unwrap_type(&column.data_type);
        let mut spec = introspect::column_from_catalog(&CatalogColumn {
            data_type: inner.to_string(),
            ..column.clone()
        });
        // ClickHouse type names are case-sensitive.
        spec.sql_type = inner.split('(').next().unwrap_or(inner).trim().to_string();
        if spec.kind == ColumnKind::Decimal {
            if let Some((precision, scale)) = decimal_args(inner) {
                spec.width = precision;
                spec.precision = scale;
            }
        }
        spec
    }

    fn columns_catalog_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::for_table(COLUMNS_SQL.trim(), table)
    }

    fn indexes_catalog_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::for_table(INDEXES_SQL.trim(), table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::IndexSpec;
    use crate::core::traits::Capability;

    fn orders() -> TableSpec {
        TableSpec::new("orders")
            .with_column(ColumnSpec::new("id", ColumnKind::Integer, "UInt64").primary())
            .with_column(ColumnSpec::new("status", ColumnKind::Text, "String"))
            .with_index(IndexSpec::new("ix_orders_status", ["status"]))
    }

    #[test]
    fn test_capabilities() {
        let backend = ClickHouseBackend::new();
        assert!(!backend.can_update());
        assert!(backend.can_insert());
        assert!(!backend.can_insert_or_update());
        assert!(!backend.can_support_rows_affected());
        assert!(!backend.is_support_indexes_and_constraints());
    }

    #[test]
    fn test_create_uses_merge_tree_and_skips_indexes() {
        let sqls = ClickHouseBackend::new().get_create_sqls(&orders()).unwrap();
        assert_eq!(
            sqls,
            vec![
                "CREATE TABLE `orders` (`id` UInt64, `status` Nullable(String)) \
                 ENGINE = MergeTree() PRIMARY KEY (`id`) ORDER BY (`id`)"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_create_without_primary_key() {
        let table = TableSpec::new("events")
            .with_column(ColumnSpec::new("payload", ColumnKind::Text, "String").not_null());
        let sqls = ClickHouseBackend::new().get_create_sqls(&table).unwrap();
        assert_eq!(
            sqls[0],
            "CREATE TABLE `events` (`payload` String) ENGINE = MergeTree() ORDER BY tuple()"
        );
        assert!(!sqls[0].contains("PRIMARY KEY"));
    }

    #[test]
    fn test_unsupported_operations() {
        let backend = ClickHouseBackend::new();
        let err = backend
            .render_update("orders", &["status = ?".to_string()], &["id = ?".to_string()])
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::UnsupportedOperation { ref backend, ref operation }
                if backend == "clickhouse" && operation == "update"
        ));
        assert!(backend.render_drop_index("orders", "ix").is_err());
        assert!(backend.require(Capability::InsertOrUpdate).is_err());
        assert!(backend
            .render_insert("orders", &["`id`".to_string()], &["?".to_string()])
            .is_ok());
    }

    #[test]
    fn test_catalog_nullable_unwrapped() {
        let col = CatalogColumn {
            name: "status".into(),
            data_type: "Nullable(String)".into(),
            width: 0,
            scale: 0,
            nullable: true,
            default: None,
            primary: false,
            auto_increment: false,
        };
        let spec = ClickHouseBackend::new().column_from_catalog(&col);
        assert_eq!(spec.sql_type, "String");
        assert_eq!(spec.kind, ColumnKind::Text);

        let col = CatalogColumn {
            data_type: "Decimal(18, 4)".into(),
            ..col
        };
        let spec = ClickHouseBackend::new().column_from_catalog(&col);
        assert_eq!(spec.kind, ColumnKind::Decimal);
        assert_eq!(spec.sql_type, "Decimal");
        assert_eq!((spec.width, spec.precision), (18, 4));
    }

    #[test]
    fn test_decimal_args() {
        assert_eq!(decimal_args("Decimal(12, 4)"), Some((12, 4)));
        assert_eq!(decimal_args("Decimal(10)"), Some((10, 0)));
        assert_eq!(decimal_args("Decimal"), None);
        assert_eq!(decimal_args("Decimal(x, 2)"), None);
    }

    #[test]
    fn test_catalog_types_match_declared_types() {
        let backend = ClickHouseBackend::new();
        let decimal = TagMap::from([
            ("width".to_string(), "12".to_string()),
            ("precision".to_string(), "4".to_string()),
        ]);
        let cases = [
            (FieldKind::String, TagMap::new()),
            (FieldKind::Int8, TagMap::new()),
            (FieldKind::Int32, TagMap::new()),
            (FieldKind::Uint64, TagMap::new()),
            (FieldKind::Bool, TagMap::new()),
            (FieldKind::Float32, TagMap::new()),
            (FieldKind::Float64, decimal),
            (FieldKind::Slice, TagMap::new()),
            (FieldKind::TriState, TagMap::new()),
            (FieldKind::Time, TagMap::new()),
        ];

        for (kind, tags) in cases {
            let declared = backend.map_field(&kind, "c", &tags, false).unwrap();
            let type_name = if declared.nullable {
                format!("Nullable({})", declared.type_string())
            } else {
                declared.type_string()
            };
            let live = backend.column_from_catalog(&CatalogColumn {
                name: "c".into(),
                data_type: type_name,
                width: 0,
                scale: 0,
                nullable: declared.nullable,
                default: None,
                primary: false,
                auto_increment: false,
            });
            assert_eq!(live.type_string(), declared.type_string(), "{kind}");
        }
    }
}
