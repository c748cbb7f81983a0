//! Schema model: tables, columns, indexes and constraints.
//!
//! These types are the backend-neutral representation shared by DDL
//! generation (declared schema) and catalog introspection (live schema).
//! Both sides produce the same types so that a consumer can diff them.

use serde::{Deserialize, Serialize};

use super::field::FieldMeta;
use super::identifier::quote_with;
use super::traits::Backend;
use crate::error::Result;

/// Logical kind of a column, independent of the dialect's type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Integer,
    Boolean,
    Float,
    Decimal,
    DateTime,
    TriState,
    /// Map, slice or self-serializing value stored as text.
    Compound,
}

impl ColumnKind {
    /// Classify a catalog-reported data type name.
    ///
    /// Unknown types are treated as text.
    pub fn from_catalog_type(data_type: &str) -> Self {
        let lower = data_type
            .trim()
            .to_lowercase()
            .replace(" unsigned", "")
            .replace(" zerofill", "");
        let base = lower.split('(').next().unwrap_or_default().trim();
        match base {
            "tinyint" if lower.starts_with("tinyint(1)") => ColumnKind::Boolean,
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "mediumint" | "byte"
            | "int2" | "int4" | "int8" | "int16" | "int32" | "int64" | "uint8" | "uint16"
            | "uint32" | "uint64" | "serial" | "bigserial" | "smallserial" => ColumnKind::Integer,
            "bit" | "bool" | "boolean" => ColumnKind::Boolean,
            "real" | "float" | "double" | "double precision" | "float4" | "float8"
            | "float32" | "float64" => ColumnKind::Float,
            "decimal" | "numeric" | "dec" | "number" => ColumnKind::Decimal,
            "date" | "datetime" | "datetime2" | "timestamp" | "timestamptz"
            | "timestamp with time zone" | "timestamp without time zone" => ColumnKind::DateTime,
            "json" | "jsonb" => ColumnKind::Compound,
            _ => ColumnKind::Text,
        }
    }

    /// Whether defaults of this kind are rendered as quoted string literals.
    pub fn quotes_default(self) -> bool {
        matches!(self, ColumnKind::Text | ColumnKind::Compound)
    }
}

/// Whether a type name takes a length argument (`VARCHAR(n)`).
pub fn is_bounded_text_type(sql_type: &str) -> bool {
    matches!(
        sql_type.to_uppercase().as_str(),
        "VARCHAR" | "CHAR" | "NVARCHAR" | "NCHAR" | "VARCHAR2" | "CHARACTER VARYING"
    )
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, unique within the table.
    pub name: String,

    /// Logical kind.
    pub kind: ColumnKind,

    /// Dialect type name without arguments (e.g. "VARCHAR", "BIGINT").
    pub sql_type: String,

    /// Length for bounded text, total digits for decimals, 0 otherwise.
    pub width: u32,

    /// Digits after the point for decimals.
    pub precision: u32,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Whether the column is part of the primary key.
    pub primary: bool,

    /// Default value, rendered literally or quoted depending on kind.
    pub default: Option<String>,

    /// Whether the column is auto-incremented by the database.
    pub auto_increment: bool,
}

impl ColumnSpec {
    /// Create a nullable, non-primary column.
    pub fn new(name: impl Into<String>, kind: ColumnKind, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            sql_type: sql_type.into(),
            width: 0,
            precision: 0,
            nullable: true,
            primary: false,
            default: None,
            auto_increment: false,
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Type with its arguments, e.g. `VARCHAR(64)` or `DECIMAL(10, 2)`.
    pub fn type_string(&self) -> String {
        match self.kind {
            ColumnKind::Decimal if self.width > 0 => {
                format!("{}({}, {})", self.sql_type, self.width, self.precision)
            }
            ColumnKind::Text | ColumnKind::Compound
                if self.width > 0 && is_bounded_text_type(&self.sql_type) =>
            {
                format!("{}({})", self.sql_type, self.width)
            }
            _ => self.sql_type.clone(),
        }
    }

    /// Default value as it appears after `DEFAULT`.
    pub fn default_string(&self) -> Option<String> {
        let default = self.default.as_ref()?;
        if self.kind.quotes_default() {
            Some(format!("'{}'", default.replace('\'', "''")))
        } else {
            Some(default.clone())
        }
    }

    /// Column clause for CREATE TABLE.
    ///
    /// `auto_increment_keyword` is appended for auto-increment columns when
    /// non-empty.
    pub fn definition_string(&self, quote_char: &str, auto_increment_keyword: &str) -> String {
        let mut def = format!("{} {}", quote_with(quote_char, &self.name), self.type_string());
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = self.default_string() {
            def.push_str(" DEFAULT ");
            def.push_str(&default);
        }
        if self.auto_increment && !auto_increment_keyword.is_empty() {
            def.push(' ');
            def.push_str(auto_increment_keyword);
        }
        def
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,

    /// Indexed column names, in index order.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    #[serde(default)]
    pub unique: bool,

    /// Whether this is the primary key pseudo-index.
    #[serde(default)]
    pub primary: bool,
}

impl IndexSpec {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            primary: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Kind of a table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
}

/// Table constraint metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConstraint {
    /// Constraint name.
    pub name: String,

    pub kind: ConstraintKind,

    /// Constrained column names.
    pub columns: Vec<String>,

    /// Referenced table (foreign keys only).
    pub ref_table: Option<String>,

    /// Referenced column names (foreign keys only).
    pub ref_columns: Vec<String>,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub name: String,

    /// Column definitions in declared order.
    pub columns: Vec<ColumnSpec>,

    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Build a declared table from host field metadata.
    ///
    /// Fails on the first field whose kind has no mapping in `backend`.
    pub fn from_fields(
        backend: &dyn Backend,
        name: impl Into<String>,
        fields: &[FieldMeta],
    ) -> Result<Self> {
        let mut table = Self::new(name);
        for field in fields {
            let col = backend.map_field(&field.kind, field.column_name(), &field.tags, field.is_pointer)?;
            table.columns.push(col);
        }
        Ok(table)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key columns in declared order.
    pub fn primary_columns(&self) -> Vec<&ColumnSpec> {
        self.columns.iter().filter(|c| c.primary).collect()
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        self.columns.iter().any(|c| c.primary)
    }

    /// Whether `columns` is exactly the primary key, in any order.
    pub fn is_primary_key(&self, columns: &[String]) -> bool {
        let mut pk: Vec<&str> = self.primary_columns().iter().map(|c| c.name.as_str()).collect();
        let mut other: Vec<&str> = columns.iter().map(String::as_str).collect();
        pk.sort_unstable();
        other.sort_unstable();
        !pk.is_empty() && pk == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableSpec {
        TableSpec::new("orders")
            .with_column(ColumnSpec::new("id", ColumnKind::Integer, "INT").primary())
            .with_column(ColumnSpec::new("region", ColumnKind::Text, "VARCHAR").with_width(8).primary())
            .with_column(ColumnSpec::new("status", ColumnKind::Text, "TEXT"))
    }

    #[test]
    fn test_from_catalog_type() {
        assert_eq!(ColumnKind::from_catalog_type("VARCHAR"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_catalog_type("bigint"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_catalog_type("tinyint(1)"), ColumnKind::Boolean);
        assert_eq!(ColumnKind::from_catalog_type("tinyint(4)"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_catalog_type("int unsigned"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_catalog_type("DECIMAL(10,2)"), ColumnKind::Decimal);
        assert_eq!(ColumnKind::from_catalog_type("double precision"), ColumnKind::Float);
        assert_eq!(
            ColumnKind::from_catalog_type("timestamp without time zone"),
            ColumnKind::DateTime
        );
        assert_eq!(ColumnKind::from_catalog_type("jsonb"), ColumnKind::Compound);
        assert_eq!(ColumnKind::from_catalog_type("geometry"), ColumnKind::Text);
    }

    #[test]
    fn test_type_string() {
        let col = ColumnSpec::new("name", ColumnKind::Text, "VARCHAR").with_width(64);
        assert_eq!(col.type_string(), "VARCHAR(64)");

        let col = ColumnSpec::new("body", ColumnKind::Text, "TEXT").with_width(4096);
        assert_eq!(col.type_string(), "TEXT");

        let col = ColumnSpec::new("price", ColumnKind::Decimal, "DECIMAL")
            .with_width(10)
            .with_precision(2);
        assert_eq!(col.type_string(), "DECIMAL(10, 2)");
    }

    #[test]
    fn test_definition_string() {
        let col = ColumnSpec::new("status", ColumnKind::Text, "VARCHAR")
            .with_width(16)
            .not_null()
            .with_default("it's new");
        assert_eq!(
            col.definition_string("\"", ""),
            "\"status\" VARCHAR(16) NOT NULL DEFAULT 'it''s new'"
        );

        let col = ColumnSpec::new("id", ColumnKind::Integer, "BIGINT")
            .not_null()
            .auto_increment();
        assert_eq!(
            col.definition_string("`", "AUTO_INCREMENT"),
            "`id` BIGINT NOT NULL AUTO_INCREMENT"
        );

        let col = ColumnSpec::new("created_at", ColumnKind::DateTime, "DATETIME")
            .with_default("GETUTCDATE()");
        assert_eq!(
            col.definition_string("\"", ""),
            "\"created_at\" DATETIME DEFAULT GETUTCDATE()"
        );
    }

    #[test]
    fn test_primary_columns_keep_declared_order() {
        let table = orders();
        let names: Vec<&str> = table.primary_columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "region"]);
    }

    #[test]
    fn test_is_primary_key_order_independent() {
        let table = orders();
        assert!(table.is_primary_key(&["region".to_string(), "id".to_string()]));
        assert!(!table.is_primary_key(&["id".to_string()]));
        assert!(!TableSpec::new("empty").is_primary_key(&[]));
    }
}
