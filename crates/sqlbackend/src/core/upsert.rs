//! Insert-or-update planning.
//!
//! Two planners produce one atomic statement plus its ordered parameters:
//!
//! - [`plan_merge`]: a `MERGE INTO ... USING (SELECT ... FROM DUAL)` statement
//!   for dialects without a native upsert clause. The insert values are bound
//!   twice (once for the source row, once for the insert branch).
//! - [`plan_from_template`]: the dialect's own upsert template
//!   (`ON DUPLICATE KEY UPDATE`, `ON CONFLICT ... DO UPDATE`).
//!
//! Column names and placeholders are used exactly as the caller passes them.

use crate::error::{BackendError, Result};

use super::identifier::strip_quotes;
use super::template::{render, Placeholder, TemplateArgs};
use super::traits::Backend;
use super::value::SqlValue;

/// Alias of the merge target.
pub const TARGET_ALIAS: &str = "target";

/// Alias of the merge source row.
pub const SOURCE_ALIAS: &str = "source";

/// Input to an insert-or-update planner.
#[derive(Debug, Clone, Copy)]
pub struct UpsertRequest<'a> {
    /// Target table name.
    pub table: &'a str,
    /// Insert column names.
    pub insert_columns: &'a [String],
    /// One placeholder per insert column (e.g. `?`).
    pub insert_placeholders: &'a [String],
    /// Unique-key columns that decide between insert and update.
    pub key_columns: &'a [String],
    /// Values bound to the insert placeholders, one per column.
    pub insert_values: &'a [SqlValue<'a>],
    /// Update assignments of the form `col = expr`.
    pub update_assignments: &'a [String],
    /// Values bound to placeholders inside the update assignments.
    pub update_values: &'a [SqlValue<'a>],
}

/// Planned statement and its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertStatement<'a> {
    pub sql: String,
    pub params: Vec<SqlValue<'a>>,
}

/// Dameng-style MERGE template.
pub const MERGE_TEMPLATE: &str = "MERGE INTO \"{{ .Table }}\" target USING (SELECT {{ .SelectValues }} FROM DUAL) source ON ({{ .OnConditions }}) WHEN NOT MATCHED THEN INSERT({{ .Columns }}) VALUES ({{ .Values }}) WHEN MATCHED THEN UPDATE SET {{ .SetValues }}";

fn check_shape(request: &UpsertRequest<'_>) -> Result<()> {
    if request.insert_columns.len() != request.insert_placeholders.len() {
        return Err(BackendError::Template(format!(
            "{} insert columns but {} placeholders",
            request.insert_columns.len(),
            request.insert_placeholders.len()
        )));
    }
    if request.insert_values.len() != request.insert_columns.len() {
        return Err(BackendError::Template(format!(
            "{} insert columns but {} insert values",
            request.insert_columns.len(),
            request.insert_values.len()
        )));
    }
    if request.key_columns.is_empty() {
        return Err(BackendError::Template(
            "insert-or-update requires at least one key column".to_string(),
        ));
    }
    Ok(())
}

/// Plan a MERGE statement.
///
/// Parameters are the insert values, the insert values again, then the
/// update values. The table name is escaped with the backend's quote
/// character; `template` supplies the surrounding quotes.
pub fn plan_merge<'a, B: Backend + ?Sized>(
    backend: &B,
    template: &str,
    request: &UpsertRequest<'a>,
) -> Result<UpsertStatement<'a>> {
    check_shape(request)?;

    let select_values: Vec<String> = request
        .insert_columns
        .iter()
        .zip(request.insert_placeholders)
        .map(|(col, ph)| format!("{} AS {}", ph, col))
        .collect();

    let on_conditions: Vec<String> = request
        .key_columns
        .iter()
        .map(|k| format!("{TARGET_ALIAS}.{k} = {SOURCE_ALIAS}.{k}"))
        .collect();

    let set_values = request
        .update_assignments
        .iter()
        .map(|a| rewrite_assignment(a, TARGET_ALIAS))
        .collect::<Result<Vec<_>>>()?;

    let sql = render(
        template,
        &TemplateArgs::new()
            .set(Placeholder::Table, backend.escape_ident(request.table))
            .set(Placeholder::SelectValues, select_values.join(", "))
            .set(Placeholder::OnConditions, on_conditions.join(" AND "))
            .set(Placeholder::Columns, request.insert_columns.join(", "))
            .set(Placeholder::Values, request.insert_placeholders.join(", "))
            .set(Placeholder::SetValues, set_values.join(", ")),
    )?;

    let mut params =
        Vec::with_capacity(request.insert_values.len() * 2 + request.update_values.len());
    params.extend_from_slice(request.insert_values);
    params.extend_from_slice(request.insert_values);
    params.extend_from_slice(request.update_values);

    Ok(UpsertStatement { sql, params })
}

/// Plan through the backend's native upsert template.
///
/// Parameters are the insert values followed by the update values.
pub fn plan_from_template<'a, B: Backend + ?Sized>(
    backend: &B,
    request: &UpsertRequest<'a>,
) -> Result<UpsertStatement<'a>> {
    let template = backend
        .insert_or_update_sql_template()
        .ok_or_else(|| BackendError::unsupported(backend.name(), "insert-or-update"))?;
    check_shape(request)?;

    for assignment in request.update_assignments {
        split_assignment(assignment)?;
    }

    let sql = render(
        template,
        &TemplateArgs::new()
            .set(Placeholder::Table, backend.escape_ident(request.table))
            .set(Placeholder::Columns, request.insert_columns.join(", "))
            .set(Placeholder::Values, request.insert_placeholders.join(", "))
            .set(Placeholder::Conditions, request.key_columns.join(", "))
            .set(Placeholder::SetValues, request.update_assignments.join(", ")),
    )?;

    let mut params = Vec::with_capacity(request.insert_values.len() + request.update_values.len());
    params.extend_from_slice(request.insert_values);
    params.extend_from_slice(request.update_values);

    Ok(UpsertStatement { sql, params })
}

/// Rewrite `col = expr` as `<alias>.col = expr`.
pub fn rewrite_assignment(assignment: &str, alias: &str) -> Result<String> {
    let (column, expr) = split_assignment(assignment)?;
    Ok(format!("{alias}.{column} = {expr}"))
}

/// Split an assignment at its single top-level `=`.
///
/// `=` inside parentheses or quotes does not count, nor do the comparison
/// operators `<=`, `>=`, `!=` and `==`. The column has its quotes stripped.
pub fn split_assignment(assignment: &str) -> Result<(&str, &str)> {
    let invalid = || BackendError::InvalidAssignment(assignment.to_string());

    let bytes = assignment.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut found: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                let comparison = matches!(prev, Some(b'<' | b'>' | b'!' | b'='))
                    || next == Some(b'=');
                if !comparison {
                    if found.is_some() {
                        return Err(invalid());
                    }
                    found = Some(i);
                }
            }
            _ => {}
        }
    }

    let pos = found.ok_or_else(invalid)?;
    let column = strip_quotes(&assignment[..pos]);
    let expr = assignment[pos + 1..].trim();
    if column.is_empty() || expr.is_empty() {
        return Err(invalid());
    }
    Ok((column, expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{DamengBackend, MysqlBackend};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rewrite_assignment() {
        assert_eq!(rewrite_assignment("status=?", "target").unwrap(), "target.status = ?");
        assert_eq!(
            rewrite_assignment(" \"status\" = ? ", "target").unwrap(),
            "target.status = ?"
        );
        assert_eq!(
            rewrite_assignment("total = COALESCE(total, 0) + ?", "target").unwrap(),
            "target.total = COALESCE(total, 0) + ?"
        );
    }

    #[test]
    fn test_nested_equals_are_not_top_level() {
        let (col, expr) = split_assignment("flag = (CASE WHEN a = 1 THEN 0 ELSE 1 END)").unwrap();
        assert_eq!(col, "flag");
        assert_eq!(expr, "(CASE WHEN a = 1 THEN 0 ELSE 1 END)");

        let (col, expr) = split_assignment("note = 'a=b'").unwrap();
        assert_eq!(col, "note");
        assert_eq!(expr, "'a=b'");
    }

    #[test]
    fn test_comparison_operators_are_ignored() {
        let (col, expr) = split_assignment("ok = ? >= 1").unwrap();
        assert_eq!(col, "ok");
        assert_eq!(expr, "? >= 1");
        assert!(split_assignment("a <= b").is_err());
        assert!(split_assignment("a != b").is_err());
    }

    #[test]
    fn test_invalid_assignments() {
        for bad in ["status", "= ?", "a = b = c", "status =", ""] {
            assert!(
                matches!(split_assignment(bad), Err(BackendError::InvalidAssignment(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    fn request<'a>(
        columns: &'a [String],
        placeholders: &'a [String],
        keys: &'a [String],
        insert_values: &'a [SqlValue<'a>],
        assignments: &'a [String],
        update_values: &'a [SqlValue<'a>],
    ) -> UpsertRequest<'a> {
        UpsertRequest {
            table: "orders",
            insert_columns: columns,
            insert_placeholders: placeholders,
            key_columns: keys,
            insert_values,
            update_assignments: assignments,
            update_values,
        }
    }

    #[test]
    fn test_plan_merge() {
        let columns = strings(&["id", "status"]);
        let placeholders = strings(&["?", "?"]);
        let keys = strings(&["id"]);
        let assignments = strings(&["status=?"]);
        let insert_values = [SqlValue::from(1i64), SqlValue::from("new")];
        let update_values = [SqlValue::from("paid")];

        let request = request(
            &columns,
            &placeholders,
            &keys,
            &insert_values,
            &assignments,
            &update_values,
        );

        let stmt = plan_merge(&DamengBackend::new(), MERGE_TEMPLATE, &request).unwrap();
        assert_eq!(
            stmt.sql,
            "MERGE INTO \"orders\" target USING (SELECT ? AS id, ? AS status FROM DUAL) source \
             ON (target.id = source.id) WHEN NOT MATCHED THEN INSERT(id, status) VALUES (?, ?) \
             WHEN MATCHED THEN UPDATE SET target.status = ?"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::from(1i64),
                SqlValue::from("new"),
                SqlValue::from(1i64),
                SqlValue::from("new"),
                SqlValue::from("paid"),
            ]
        );
    }

    #[test]
    fn test_plan_merge_composite_key() {
        let columns = strings(&["tenant", "code", "name"]);
        let placeholders = strings(&["?", "?", "?"]);
        let keys = strings(&["tenant", "code"]);
        let assignments = strings(&["name = ?"]);
        let insert_values = [SqlValue::from(1i64), SqlValue::from("A1"), SqlValue::from("first")];
        let update_values = [SqlValue::from("renamed")];

        let request = request(
            &columns,
            &placeholders,
            &keys,
            &insert_values,
            &assignments,
            &update_values,
        );

        let stmt = plan_merge(&DamengBackend::new(), MERGE_TEMPLATE, &request).unwrap();
        assert!(stmt
            .sql
            .contains("ON (target.tenant = source.tenant AND target.code = source.code)"));
        assert_eq!(stmt.params.len(), 7);
    }

    #[test]
    fn test_plan_merge_rejects_bad_assignment() {
        let columns = strings(&["id"]);
        let placeholders = strings(&["?"]);
        let keys = strings(&["id"]);
        let assignments = strings(&["status"]);
        let insert_values = [SqlValue::from(1i64)];

        let request = request(&columns, &placeholders, &keys, &insert_values, &assignments, &[]);

        assert!(matches!(
            plan_merge(&DamengBackend::new(), MERGE_TEMPLATE, &request),
            Err(BackendError::InvalidAssignment(_))
        ));
    }

    #[test]
    fn test_plan_merge_rejects_mismatched_placeholders() {
        let columns = strings(&["id", "status"]);
        let placeholders = strings(&["?"]);
        let keys = strings(&["id"]);
        let insert_values = [SqlValue::from(1i64), SqlValue::from("new")];

        let request = request(&columns, &placeholders, &keys, &insert_values, &[], &[]);

        assert!(matches!(
            plan_merge(&DamengBackend::new(), MERGE_TEMPLATE, &request),
            Err(BackendError::Template(_))
        ));
    }

    #[test]
    fn test_planners_reject_short_insert_values() {
        let columns = strings(&["id", "status"]);
        let placeholders = strings(&["?", "?"]);
        let keys = strings(&["id"]);
        let assignments = strings(&["status = ?"]);
        let insert_values = [SqlValue::from(1i64)];
        let update_values = [SqlValue::from("paid")];

        let request = request(
            &columns,
            &placeholders,
            &keys,
            &insert_values,
            &assignments,
            &update_values,
        );

        let err = plan_merge(&DamengBackend::new(), MERGE_TEMPLATE, &request).unwrap_err();
        assert!(matches!(err, BackendError::Template(ref m) if m.contains("2 insert columns but 1 insert values")));
        assert!(matches!(
            plan_from_template(&MysqlBackend::new(), &request),
            Err(BackendError::Template(_))
        ));
    }

    #[test]
    fn test_table_name_is_escaped_for_template_quotes() {
        let columns = strings(&["id"]);
        let placeholders = strings(&["?"]);
        let keys = strings(&["id"]);
        let insert_values = [SqlValue::from(1i64)];
        let mut request = request(&columns, &placeholders, &keys, &insert_values, &[], &[]);
        request.table = "odd\"name";

        let stmt = plan_merge(&DamengBackend::new(), MERGE_TEMPLATE, &request).unwrap();
        assert!(stmt.sql.starts_with("MERGE INTO \"odd\"\"name\" target"));
    }
}
