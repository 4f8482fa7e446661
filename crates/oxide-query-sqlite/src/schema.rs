//! Corrective DDL from static schemas.

use oxide_query::{DdlProvider, Model, SchemaObject};
use oxide_query_core::{quote_identifier, ColumnInfo};

/// Column definition for `CREATE TABLE`.
#[must_use]
pub fn column_definition(column: &ColumnInfo) -> String {
    let mut parts = vec![quote_identifier(&column.name), column.sql_type.clone()];

    if column.is_primary_key {
        parts.push(String::from("PRIMARY KEY"));
    }

    if !column.nullable && !column.is_primary_key {
        parts.push(String::from("NOT NULL"));
    }

    if column.is_unique && !column.is_primary_key {
        parts.push(String::from("UNIQUE"));
    }

    if let Some(fk) = &column.foreign_key {
        parts.push(format!(
            "REFERENCES {}({})",
            quote_identifier(&fk.table),
            quote_identifier(&fk.column)
        ));
    }

    parts.join(" ")
}

/// `CREATE TABLE IF NOT EXISTS` for a column list.
#[must_use]
pub fn create_table_sql(table: &str, columns: &[ColumnInfo]) -> String {
    let definitions: Vec<String> = columns.iter().map(column_definition).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(table),
        definitions.join(", ")
    )
}

/// `ALTER TABLE ... ADD COLUMN` with the column's name and type.
///
/// SQLite rejects added columns that are keys, unique or NOT NULL without a
/// default, so constraints are left out.
#[must_use]
pub fn add_column_sql(table: &str, column: &ColumnInfo) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_identifier(table),
        quote_identifier(&column.name),
        column.sql_type
    )
}

/// Creates missing tables and columns that a model's static schema declares.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDdl;

impl DdlProvider for SqliteDdl {
    fn corrective_ddl(&self, model: &Model, missing: &SchemaObject) -> Option<String> {
        let columns = model.schema()?;
        match missing {
            SchemaObject::Table(table) if table == model.table() => {
                Some(create_table_sql(model.table(), columns))
            }
            SchemaObject::Column { table, column } => {
                if table.as_deref().is_some_and(|t| t != model.table()) {
                    return None;
                }
                columns
                    .iter()
                    .find(|c| c.name == *column)
                    .map(|c| add_column_sql(model.table(), c))
            }
            SchemaObject::Table(_) => None,
        }
    }
}
