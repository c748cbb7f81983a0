//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.

use async_trait::async_trait;

use crate::core::field::{FieldKind, TagMap};
use crate::core::introspect::{self, CatalogColumn, CatalogQuery};
use crate::core::schema::{ColumnKind, ColumnSpec};
use crate::core::traits::{Backend, Capabilities};
use crate::core::typemap::{apply_stamp, apply_tags, decimal_column, TextPolicy};
use crate::error::{BackendError, Result};

/// Largest VARCHAR width that still fits an index key in utf8mb4.
pub const TEXT_POLICY: TextPolicy = TextPolicy {
    max_bounded: 768,
    bounded: "VARCHAR",
    unbounded: "TEXT",
};

const COLUMNS_SQL: &str = r#"
SELECT
    COLUMN_NAME,
    COLUMN_TYPE,
    COALESCE(CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, 0),
    COALESCE(NUMERIC_SCALE, 0),
    IS_NULLABLE,
    COLUMN_DEFAULT,
    COLUMN_KEY = 'PRI',
    EXTRA LIKE '%auto_increment%'
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION
"#;

const INDEXES_SQL: &str = r#"
SELECT
    INDEX_NAME,
    COLUMN_NAME,
    SEQ_IN_INDEX,
    NON_UNIQUE = 0,
    INDEX_NAME = 'PRIMARY'
FROM information_schema.STATISTICS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY INDEX_NAME, SEQ_IN_INDEX
"#;

const CONSTRAINTS_SQL: &str = r#"
SELECT
    kcu.CONSTRAINT_NAME,
    'FOREIGN KEY',
    GROUP_CONCAT(kcu.COLUMN_NAME ORDER BY kcu.ORDINAL_POSITION),
    kcu.REFERENCED_TABLE_NAME,
    GROUP_CONCAT(kcu.REFERENCED_COLUMN_NAME ORDER BY kcu.ORDINAL_POSITION)
FROM information_schema.KEY_COLUMN_USAGE kcu
WHERE kcu.TABLE_SCHEMA = DATABASE()
  AND kcu.TABLE_NAME = ?
  AND kcu.REFERENCED_TABLE_NAME IS NOT NULL
GROUP BY kcu.CONSTRAINT_NAME, kcu.REFERENCED_TABLE_NAME
"#;

/// MySQL/MariaDB backend.
#[derive(Debug, Clone, Default)]
pub struct MysqlBackend;

impl MysqlBackend {
    /// Create a new MySQL backend instance.
    pub fn new() -> Self {
        Self
    }

    /// Unbounded text type large enough for `width`.
    fn text_type(width: u32) -> &'static str {
        match width {
            0..=65_535 => "TEXT",
            65_536..=16_777_215 => "MEDIUMTEXT",
            _ => "LONGTEXT",
        }
    }

    fn text_column(name: &str, kind: ColumnKind, tags: &TagMap) -> ColumnSpec {
        let mut column = TEXT_POLICY.column(name, kind, tags);
        if column.width == 0 {
            column.sql_type = Self::text_type(crate::core::field::tag_width(tags)).to_string();
        }
        column
    }

    fn integer(name: &str, sql_type: &str) -> ColumnSpec {
        ColumnSpec::new(name, ColumnKind::Integer, sql_type)
    }
}

#[async_trait]
impl Backend for MysqlBackend {
    fn name(&self) -> &str {
        "mysql"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn quote_char(&self) -> &'static str {
        "`"
    }

    fn create_index_sql_template(&self) -> &'static str {
        "CREATE {{ .Unique }}INDEX `{{ .Index }}` ON `{{ .Table }}` ({{ .Columns }})"
    }

    fn drop_index_sql_template(&self) -> &'static str {
        "DROP INDEX `{{ .Index }}` ON `{{ .Table }}`"
    }

    fn insert_sql_template(&self) -> &'static str {
        "INSERT INTO `{{ .Table }}` ({{ .Columns }}) VALUES ({{ .Values }})"
    }

    fn update_sql_template(&self) -> &'static str {
        "UPDATE `{{ .Table }}` SET {{ .Columns }} WHERE {{ .Conditions }}"
    }

    fn insert_or_update_sql_template(&self) -> Option<&'static str> {
        Some("INSERT INTO `{{ .Table }}` ({{ .Columns }}) VALUES ({{ .Values }}) ON DUPLICATE KEY UPDATE {{ .SetValues }}")
    }

    fn tables_catalog_sql(&self) -> &'static str {
        "SHOW TABLES"
    }

    fn current_utc_timestamp_expression(&self) -> &'static str {
        "UTC_TIMESTAMP()"
    }

    fn current_timestamp_expression(&self) -> &'static str {
        "NOW()"
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn table_options(&self) -> &'static str {
        "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
    }

    fn map_field(
        &self,
        kind: &FieldKind,
        field_name: &str,
        tags: &TagMap,
        is_pointer: bool,
    ) -> Result<ColumnSpec> {
        let column = match kind {
            FieldKind::String => Self::text_column(field_name, ColumnKind::Text, tags),
            FieldKind::Int | FieldKind::Int32 => Self::integer(field_name, "INT"),
            FieldKind::Int8 => Self::integer(field_name, "TINYINT"),
            FieldKind::Int16 => Self::integer(field_name, "SMALLINT"),
            FieldKind::Int64 => Self::integer(field_name, "BIGINT"),
            FieldKind::Uint | FieldKind::Uint32 => Self::integer(field_name, "INT UNSIGNED"),
            FieldKind::Uint8 => Self::integer(field_name, "TINYINT UNSIGNED"),
            FieldKind::Uint16 => Self::integer(field_name, "SMALLINT UNSIGNED"),
            FieldKind::Uint64 => Self::integer(field_name, "BIGINT UNSIGNED"),
            FieldKind::Bool => ColumnSpec::new(field_name, ColumnKind::Boolean, "TINYINT(1)"),
            FieldKind::Float32 => decimal_column(field_name, "DECIMAL", tags)
                .unwrap_or_else(|| ColumnSpec::new(field_name, ColumnKind::Float, "FLOAT")),
            FieldKind::Float64 => decimal_column(field_name, "DECIMAL", tags)
                .unwrap_or_else(|| ColumnSpec::new(field_name, ColumnKind::Float, "DOUBLE")),
            FieldKind::Map | FieldKind::Slice | FieldKind::Serializable => {
                Self::text_column(field_name, ColumnKind::Compound, tags)
            }
            FieldKind::TriState => {
                let mut column = apply_tags(
                    ColumnSpec::new(field_name, ColumnKind::TriState, "TINYINT"),
                    tags,
                    is_pointer,
                );
                column.nullable = true;
                return Ok(column);
            }
            FieldKind::Time => {
                let column = apply_tags(
                    ColumnSpec::new(field_name, ColumnKind::DateTime, "DATETIME"),
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
        // COLUMN_TYPE carries the display width; keep the boolean spelling
        // and the unsigned suffix so declared and live columns compare equal.
        let full = column.data_type.to_uppercase();
        if spec.kind == ColumnKind::Boolean {
            spec.sql_type = "TINYINT(1)".to_string();
        } else if spec.kind == ColumnKind::Integer
            && full.contains("UNSIGNED")
            && !spec.sql_type.ends_with("UNSIGNED")
        {
            spec.sql_type = format!("{} UNSIGNED", spec.sql_type);
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
