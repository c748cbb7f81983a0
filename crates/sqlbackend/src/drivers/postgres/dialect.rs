//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Catalog queries use `$n` placeholders and are scoped to
//! `current_schema()`.

use async_trait::async_trait;

use crate::core::field::{FieldKind, TagMap};
use crate::core::introspect::{self, unquote_default, CatalogColumn, CatalogQuery};
use crate::core::schema::{ColumnKind, ColumnSpec};
use crate::core::traits::{Backend, Capabilities};
use crate::core::typemap::{apply_stamp, apply_tags, decimal_column, TextPolicy};
use crate::error::{BackendError, Result};

/// VARCHAR is bounded by the 10 MiB varlena limit.
pub const TEXT_POLICY: TextPolicy = TextPolicy {
    max_bounded: 10_485_760,
    bounded: "VARCHAR",
    unbounded: "TEXT",
};

const COLUMNS_SQL: &str = r#"
SELECT
    c.column_name,
    c.data_type,
    COALESCE(c.character_maximum_length, c.numeric_precision, 0),
    COALESCE(c.numeric_scale, 0),
    c.is_nullable,
    c.column_default,
    EXISTS (
        SELECT 1
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
          ON kcu.constraint_name = tc.constraint_name
         AND kcu.table_schema = tc.table_schema
        WHERE tc.constraint_type = 'PRIMARY KEY'
          AND tc.table_schema = c.table_schema
          AND tc.table_name = c.table_name
          AND kcu.column_name = c.column_name
    ),
    c.is_identity = 'YES' OR COALESCE(c.column_default, '') LIKE 'nextval(%'
FROM information_schema.columns c
WHERE c.table_schema = current_schema() AND c.table_name = $1
ORDER BY c.ordinal_position
"#;

const INDEXES_SQL: &str = r#"
SELECT
    i.relname,
    a.attname,
    k.ord,
    ix.indisunique,
    ix.indisprimary
FROM pg_index ix
JOIN pg_class t ON t.oid = ix.indrelid
JOIN pg_class i ON i.oid = ix.indexrelid
JOIN pg_namespace n ON n.oid = t.relnamespace
CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE n.nspname = current_schema() AND t.relname = $1
ORDER BY i.relname, k.ord
"#;

const CONSTRAINTS_SQL: &str = r#"
SELECT
    con.conname,
    CASE con.contype WHEN 'f' THEN 'FOREIGN KEY' ELSE 'UNIQUE' END,
    (SELECT string_agg(a.attname, ',' ORDER BY k.ord)
       FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
       JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum),
    ref.relname,
    (SELECT string_agg(a.attname, ',' ORDER BY k.ord)
       FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
       JOIN pg_attribute a ON a.attrelid = con.confrelid AND a.attnum = k.attnum)
FROM pg_constraint con
JOIN pg_class t ON t.oid = con.conrelid
JOIN pg_namespace n ON n.oid = t.relnamespace
LEFT JOIN pg_class ref ON ref.oid = con.confrelid
WHERE n.nspname = current_schema() AND t.relname = $1 AND con.contype IN ('f', 'u')
ORDER BY con.conname
"#;

const TABLES_SQL: &str = "SELECT tablename AS name FROM pg_tables WHERE schemaname = current_schema()";

/// Declared spelling of an `information_schema` data type.
///
/// The catalog reports SQL-standard long names; DDL from [`map_field`]
/// uses the short ones. Types spelled the same both ways are absent.
///
/// [`map_field`]: Backend::map_field
fn declared_type(catalog_type: &str) -> Option<&'static str> {
    match catalog_type.to_lowercase().as_str() {
        "character varying" => Some("VARCHAR"),
        "integer" => Some("INT"),
        "timestamp without time zone" => Some("TIMESTAMP"),
        "timestamp with time zone" => Some("TIMESTAMPTZ"),
        _ => None,
    }
}

/// PostgreSQL backend.
#[derive(Debug, Clone, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    /// Create a new PostgreSQL backend instance.
    pub fn new() -> Self {
        Self
    }

    fn integer(name: &str, sql_type: &str) -> ColumnSpec {
        ColumnSpec::new(name, ColumnKind::Integer, sql_type)
    }
}

/// Strip a trailing `::type` cast from a catalog default.
fn strip_cast(default: &str) -> &str {
    match default.rfind("::") {
        Some(pos) if default.starts_with('\'') => &default[..pos],
        _ => default,
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn name(&self) -> &str {
        "postgres"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn quote_char(&self) -> &'static str {
        "\""
    }

    fn create_index_sql_template(&self) -> &'static str {
        r#"CREATE {{ .Unique }}INDEX "{{ .Index }}" ON "{{ .Table }}" ({{ .Columns }})"#
    }

    fn drop_index_sql_template(&self) -> &'static str {
        r#"DROP INDEX "{{ .Index }}""#
    }

    fn insert_sql_template(&self) -> &'static str {
        r#"INSERT INTO "{{ .Table }}" ({{ .Columns }}) VALUES ({{ .Values }})"#
    }

    fn update_sql_template(&self) -> &'static str {
        r#"UPDATE "{{ .Table }}" SET {{ .Columns }} WHERE {{ .Conditions }}"#
    }

    fn insert_or_update_sql_template(&self) -> Option<&'static str> {
        Some(r#"INSERT INTO "{{ .Table }}" ({{ .Columns }}) VALUES ({{ .Values }}) ON CONFLICT ({{ .Conditions }}) DO UPDATE SET {{ .SetValues }}"#)
    }

    fn tables_catalog_sql(&self) -> &'static str {
        TABLES_SQL
    }

    fn current_utc_timestamp_expression(&self) -> &'static str {
        "TIMEZONE('UTC', NOW())"
    }

    fn current_timestamp_expression(&self) -> &'static str {
        "NOW()"
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "GENERATED BY DEFAULT AS IDENTITY"
    }

    fn map_field(
        &self,
        kind: &FieldKind,
        field_name: &str,
        tags: &TagMap,
        is_pointer: bool,
    ) -> Result<ColumnSpec> {
        let column = match kind {
            FieldKind::String => TEXT_POLICY.column(field_name, ColumnKind::Text, tags),
            FieldKind::Int8 | FieldKind::Int16 | FieldKind::Uint8 => {
                Self::integer(field_name, "SMALLINT")
            }
            FieldKind::Int | FieldKind::Int32 | FieldKind::Uint16 => Self::integer(field_name, "INT"),
            FieldKind::Int64 | FieldKind::Uint | FieldKind::Uint32 | FieldKind::Uint64 => {
                Self::integer(field_name, "BIGINT")
            }
            FieldKind::Bool => ColumnSpec::new(field_name, ColumnKind::Boolean, "BOOLEAN"),
            FieldKind::Float32 => decimal_column(field_name, "NUMERIC", tags)
                .unwrap_or_else(|| ColumnSpec::new(field_name, ColumnKind::Float, "REAL")),
            FieldKind::Float64 => decimal_column(field_name, "NUMERIC", tags).unwrap_or_else(|| {
                ColumnSpec::new(field_name, ColumnKind::Float, "DOUBLE PRECISION")
            }),
            FieldKind::Map | FieldKind::Slice | FieldKind::Serializable => {
                TEXT_POLICY.column(field_name, ColumnKind::Compound, tags)
            }
            FieldKind::TriState => {
                let mut column = apply_tags(
                    ColumnSpec::new(field_name, ColumnKind::TriState, "SMALLINT"),
                    tags,
                    is_pointer,
                );
                column.nullable = true;
                return Ok(column);
            }
            FieldKind::Time => {
                let column = apply_tags(
                    ColumnSpec::new(field_name, ColumnKind::DateTime, "TIMESTAMP"),
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
        let mut spec = introspect::column_from_catalog(column);
        if let Some(declared) = declared_type(&column.data_type) {
            spec.sql_type = declared.to_string();
        }
        if let Some(default) = column.default.as_deref() {
            let default = strip_cast(default.trim());
            spec.default = Some(if spec.kind.quotes_default() {
                unquote_default(default)
            } else {
                default.to_string()
            });
        }
        // Identity sequences are not literal defaults.
        if spec.auto_increment {
            spec.default = None;
        }
        spec
    }

    fn columns_catalog_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::for_table(COLUMNS_SQL.trim(), table)
    }

    fn indexes_catalog_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::for_table(INDEXES_SQL.trim(), table)
    }

    fn constraints_catalog_query(&self, table: &str) -> Option<CatalogQuery> {
        Some(CatalogQuery::for_table(CONSTRAINTS_SQL.trim(), table))
    }
}
