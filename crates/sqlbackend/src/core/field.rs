//! Host-side field metadata consumed by type mapping.
//!
//! A [`FieldMeta`] describes one field of a record type in the schema
//! definition layer: its kind, its tag options, and whether it is held
//! behind a pointer (which makes the column nullable).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag key: declared column width.
pub const TAG_WIDTH: &str = "width";
/// Tag key: decimal precision (digits after the point).
pub const TAG_PRECISION: &str = "precision";
/// Tag key: `"false"` makes the column NOT NULL.
pub const TAG_NULLABLE: &str = "nullable";
/// Tag key: `"true"` marks a primary key column.
pub const TAG_PRIMARY: &str = "primary";
/// Tag key: column default value.
pub const TAG_DEFAULT: &str = "default";
/// Tag key: `"true"` marks an auto-increment integer column.
pub const TAG_AUTOINCREMENT: &str = "auto_increment";
/// Tag key: timestamp set on insert.
pub const TAG_CREATED_AT: &str = "created_at";
/// Tag key: timestamp set on insert and update.
pub const TAG_UPDATED_AT: &str = "updated_at";
/// Tag key: overrides the column name.
pub const TAG_NAME: &str = "name";

/// Tag options attached to a field.
///
/// Ordered so that anything derived from a tag map is deterministic.
pub type TagMap = BTreeMap<String, String>;

/// Kind of a host field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Bool,
    Float32,
    Float64,
    Map,
    Slice,
    /// A custom type that serializes itself to text.
    Serializable,
    /// True / false / unset.
    TriState,
    /// Point in time.
    Time,
    /// Any other type. Never mapped to a column.
    Opaque(String),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Opaque(name) => write!(f, "opaque({})", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A reflected field: name, kind, tags and pointer flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub tags: TagMap,
    #[serde(default)]
    pub is_pointer: bool,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tags: TagMap::new(),
            is_pointer: false,
        }
    }

    /// Add a tag option.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Mark the field as held behind a pointer.
    pub fn pointer(mut self) -> Self {
        self.is_pointer = true;
        self
    }

    /// Column name: the `name` tag if present, else the field name.
    pub fn column_name(&self) -> &str {
        self.tags
            .get(TAG_NAME)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.name.as_str())
    }
}

/// Read a boolean tag. Accepts `true/false`, `yes/no`, `1/0`.
pub fn tag_bool(tags: &TagMap, key: &str) -> Option<bool> {
    match tags.get(key)?.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Read the width tag. Missing or non-numeric widths read as 0.
pub fn tag_width(tags: &TagMap) -> u32 {
    tags.get(TAG_WIDTH)
        .and_then(|w| w.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// Read the precision tag. Missing or non-numeric precisions read as 0.
pub fn tag_precision(tags: &TagMap) -> u32 {
    tags.get(TAG_PRECISION)
        .and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(0)
}
