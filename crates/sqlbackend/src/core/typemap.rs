//! Helpers shared by the per-dialect field mappings.

use super::field::{
    tag_bool, tag_precision, tag_width, TagMap, TAG_AUTOINCREMENT, TAG_CREATED_AT, TAG_DEFAULT,
    TAG_NULLABLE, TAG_PRIMARY, TAG_UPDATED_AT, TAG_WIDTH,
};
use super::schema::{ColumnKind, ColumnSpec};

/// Bounded/unbounded text selection by declared width.
#[derive(Debug, Clone, Copy)]
pub struct TextPolicy {
    /// Largest width stored in the bounded type.
    pub max_bounded: u32,
    /// Bounded type name (takes a length).
    pub bounded: &'static str,
    /// Unbounded type name.
    pub unbounded: &'static str,
}

impl TextPolicy {
    /// Text column: bounded when `0 < width <= max_bounded`, else unbounded.
    pub fn column(&self, name: &str, kind: ColumnKind, tags: &TagMap) -> ColumnSpec {
        let width = tag_width(tags);
        if width > 0 && width <= self.max_bounded {
            ColumnSpec::new(name, kind, self.bounded).with_width(width)
        } else {
            ColumnSpec::new(name, kind, self.unbounded)
        }
    }
}

/// Decimal column when a width tag is present.
pub fn decimal_column(name: &str, sql_type: &str, tags: &TagMap) -> Option<ColumnSpec> {
    tags.contains_key(TAG_WIDTH).then(|| {
        ColumnSpec::new(name, ColumnKind::Decimal, sql_type)
            .with_width(tag_width(tags))
            .with_precision(tag_precision(tags))
    })
}

/// Whether the field is an automatically stamped timestamp.
pub fn is_stamped(tags: &TagMap) -> bool {
    tag_bool(tags, TAG_CREATED_AT).unwrap_or(false) || tag_bool(tags, TAG_UPDATED_AT).unwrap_or(false)
}

/// Apply the common tag options to a mapped column.
///
/// - `nullable`: defaults to true; a pointer field is always nullable
/// - `primary`: implies NOT NULL
/// - `default`: literal default value
/// - `auto_increment`: only honored for integer columns
pub fn apply_tags(mut column: ColumnSpec, tags: &TagMap, is_pointer: bool) -> ColumnSpec {
    column.nullable = tag_bool(tags, TAG_NULLABLE).unwrap_or(true) || is_pointer;

    if tag_bool(tags, TAG_PRIMARY).unwrap_or(false) {
        column.primary = true;
        column.nullable = false;
    }
    if let Some(default) = tags.get(TAG_DEFAULT) {
        column.default = Some(default.clone());
    }
    if column.kind == ColumnKind::Integer && tag_bool(tags, TAG_AUTOINCREMENT).unwrap_or(false) {
        column.auto_increment = true;
        column.nullable = false;
    }
    column
}

/// Stamped timestamps are NOT NULL and default to `now_expression`.
pub fn apply_stamp(mut column: ColumnSpec, tags: &TagMap, now_expression: &str) -> ColumnSpec {
    if is_stamped(tags) {
        column.nullable = false;
        column.default = Some(now_expression.to_string());
    }
    column
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const POLICY: TextPolicy = TextPolicy {
        max_bounded: 975,
        bounded: "VARCHAR",
        unbounded: "TEXT",
    };

    #[test]
    fn test_text_policy_boundaries() {
        let col = POLICY.column("c", ColumnKind::Text, &tags(&[("width", "975")]));
        assert_eq!(col.type_string(), "VARCHAR(975)");

        let col = POLICY.column("c", ColumnKind::Text, &tags(&[("width", "976")]));
        assert_eq!(col.type_string(), "TEXT");

        let col = POLICY.column("c", ColumnKind::Text, &tags(&[]));
        assert_eq!(col.type_string(), "TEXT");
    }

    #[test]
    fn test_apply_tags() {
        let col = ColumnSpec::new("id", ColumnKind::Integer, "INT");
        let col = apply_tags(col, &tags(&[("primary", "true"), ("auto_increment", "true")]), false);
        assert!(col.primary);
        assert!(col.auto_increment);
        assert!(!col.nullable);

        let col = ColumnSpec::new("note", ColumnKind::Text, "TEXT");
        let col = apply_tags(col, &tags(&[("nullable", "false")]), true);
        assert!(col.nullable);

        let col = ColumnSpec::new("name", ColumnKind::Text, "TEXT");
        let col = apply_tags(col, &tags(&[("auto_increment", "true")]), false);
        assert!(!col.auto_increment);
    }

    #[test]
    fn test_decimal_column() {
        assert!(decimal_column("p", "DECIMAL", &tags(&[])).is_none());
        let col = decimal_column("p", "DECIMAL", &tags(&[("width", "10"), ("precision", "2")]))
            .unwrap();
        assert_eq!(col.type_string(), "DECIMAL(10, 2)");
    }
}
