//! Dameng SQL dialect (Strategy pattern).
//!
//! Dameng has no native upsert clause, so insert-or-update is planned as a
//! `MERGE INTO ... USING (SELECT ... FROM DUAL)` statement.

use async_trait::async_trait;

use crate::core::field::{FieldKind, TagMap};
use crate::core::identifier::quote_list;
use crate::core::introspect::CatalogQuery;
use crate::core::schema::{ColumnKind, ColumnSpec};
use crate::core::traits::{Backend, Capabilities, Capability};
use crate::core::typemap::{apply_stamp, apply_tags, decimal_column, TextPolicy};
use crate::core::upsert::{plan_merge, UpsertRequest, UpsertStatement, MERGE_TEMPLATE};
use crate::error::{BackendError, Result};

/// Text up to 975 characters is stored as VARCHAR.
pub const TEXT_POLICY: TextPolicy = TextPolicy {
    max_bounded: 975,
    bounded: "VARCHAR",
    unbounded: "TEXT",
};

const COLUMNS_SQL: &str = r#"
SELECT
    c.COLUMN_NAME,
    c.DATA_TYPE,
    CASE WHEN c.DATA_PRECISION IS NULL THEN c.DATA_LENGTH ELSE c.DATA_PRECISION END,
    NVL(c.DATA_SCALE, 0),
    c.NULLABLE,
    c.DATA_DEFAULT,
    CASE WHEN EXISTS (
        SELECT 1 FROM USER_CONSTRAINTS uc
        JOIN USER_CONS_COLUMNS ucc ON ucc.CONSTRAINT_NAME = uc.CONSTRAINT_NAME
        WHERE uc.TABLE_NAME = c.TABLE_NAME
          AND uc.CONSTRAINT_TYPE = 'P'
          AND ucc.COLUMN_NAME = c.COLUMN_NAME
    ) THEN 1 ELSE 0 END,
    0
FROM USER_TAB_COLUMNS c
WHERE c.TABLE_NAME = ?
ORDER BY c.COLUMN_ID
"#;

const INDEXES_SQL: &str = r#"
SELECT
    ic.INDEX_NAME,
    ic.COLUMN_NAME,
    ic.COLUMN_POSITION,
    CASE WHEN i.UNIQUENESS = 'UNIQUE' THEN 1 ELSE 0 END,
    CASE WHEN EXISTS (
        SELECT 1 FROM USER_CONSTRAINTS uc
        WHERE uc.INDEX_NAME = ic.INDEX_NAME AND uc.CONSTRAINT_TYPE = 'P'
    ) THEN 1 ELSE 0 END
FROM USER_IND_COLUMNS ic
JOIN USER_INDEXES i ON i.INDEX_NAME = ic.INDEX_NAME
WHERE ic.TABLE_NAME = ?
ORDER BY ic.INDEX_NAME, ic.COLUMN_POSITION
"#;

/// Dameng backend.
#[derive(Debug, Clone, Default)]
pub struct DamengBackend;

impl DamengBackend {
    /// Create a new Dameng backend instance.
    pub fn new() -> Self {
        Self
    }

    fn integer(name: &str, sql_type: &str) -> ColumnSpec {
        ColumnSpec::new(name, ColumnKind::Integer, sql_type)
    }
}

#[async_trait]
impl Backend for DamengBackend {
    fn name(&self) -> &str {
        "dameng"
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
        r#"DROP INDEX "{{ .Index }}" ON "{{ .Table }}""#
    }

    fn insert_sql_template(&self) -> &'static str {
        r#"INSERT INTO "{{ .Table }}" ({{ .Columns }}) VALUES ({{ .Values }})"#
    }

    fn update_sql_template(&self) -> &'static str {
        r#"UPDATE "{{ .Table }}" SET {{ .Columns }} WHERE {{ .Conditions }}"#
    }

    fn tables_catalog_sql(&self) -> &'static str {
        r#"SELECT table_name AS "name" FROM user_tables"#
    }

    fn current_utc_timestamp_expression(&self) -> &'static str {
        "GETUTCDATE()"
    }

    fn current_timestamp_expression(&self) -> &'static str {
        "GETDATE()"
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "IDENTITY(1, 1)"
    }

    fn primary_key_clause(&self, primaries: &[&ColumnSpec]) -> String {
        let names: Vec<&str> = primaries.iter().map(|c| c.name.as_str()).collect();
        format!("NOT CLUSTER PRIMARY KEY ({})", quote_list(self.quote_char(), &names))
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
            FieldKind::Int | FieldKind::Int32 | FieldKind::Uint | FieldKind::Uint32 => {
                Self::integer(field_name, "INT")
            }
            FieldKind::Int8 | FieldKind::Uint8 => Self::integer(field_name, "TINYINT"),
            FieldKind::Int16 | FieldKind::Uint16 => Self::integer(field_name, "SMALLINT"),
            FieldKind::Int64 | FieldKind::Uint64 => Self::integer(field_name, "BIGINT"),
            FieldKind::Bool => ColumnSpec::new(field_name, ColumnKind::Boolean, "BIT"),
            FieldKind::Float32 => decimal_column(field_name, "DECIMAL", tags)
                .unwrap_or_else(|| ColumnSpec::new(field_name, ColumnKind::Float, "REAL")),
            FieldKind::Float64 => decimal_column(field_name, "DECIMAL", tags)
                .unwrap_or_else(|| ColumnSpec::new(field_name, ColumnKind::Float, "DOUBLE")),
            FieldKind::Map | FieldKind::Slice | FieldKind::Serializable => {
                TEXT_POLICY.column(field_name, ColumnKind::Compound, tags)
            }
            FieldKind::TriState => {
                let mut column = ColumnSpec::new(field_name, ColumnKind::TriState, "TINYINT");
                column = apply_tags(column, tags, is_pointer);
                column.nullable = true;
                return Ok(column);
            }
            FieldKind::Time => {
                let column = ColumnSpec::new(field_name, ColumnKind::DateTime, "DATETIME");
                let column = apply_tags(column, tags, is_pointer);
                return Ok(apply_stamp(column, tags, self.current_utc_timestamp_expression()));
            }
            FieldKind::Opaque(_) => {
                return Err(BackendError::no_type_mapping(field_name, kind));
            }
        };
        Ok(apply_tags(column, tags, is_pointer))
    }

    fn prepare_insert_or_update<'a>(
        &self,
        request: &UpsertRequest<'a>,
    ) -> Result<UpsertStatement<'a>> {
        self.require(Capability::InsertOrUpdate)?;
        plan_merge(self, MERGE_TEMPLATE, request)
    }

    fn columns_catalog_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::for_table(COLUMNS_SQL.trim(), table)
    }

    fn indexes_catalog_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::for_table(INDEXES_SQL.trim(), table)
    }
}
