//! CREATE TABLE / CREATE INDEX generation.

use crate::error::Result;

use super::schema::TableSpec;
use super::traits::Backend;

/// Statements creating `table` and its secondary indexes.
///
/// The first statement is CREATE TABLE: one clause per column in declared
/// order, then the primary key clause when at least one column is primary.
/// One CREATE INDEX follows per secondary index, in declared order.
pub fn create_sqls<B: Backend + ?Sized>(backend: &B, table: &TableSpec) -> Result<Vec<String>> {
    let mut clauses: Vec<String> = table
        .columns
        .iter()
        .map(|c| backend.column_definition(c))
        .collect();

    let primaries = table.primary_columns();
    if !primaries.is_empty() {
        clauses.push(backend.primary_key_clause(&primaries));
    }

    let mut create = format!(
        "CREATE TABLE {} ({})",
        backend.quote_ident(&table.name),
        clauses.join(", ")
    );
    let options = backend.table_options();
    if !options.is_empty() {
        create.push(' ');
        create.push_str(options);
    }

    let mut sqls = Vec::with_capacity(1 + table.indexes.len());
    sqls.push(create);
    for index in table.indexes.iter().filter(|i| !i.primary) {
        sqls.push(backend.render_create_index(&table.name, index)?);
    }

    Ok(sqls)
}
