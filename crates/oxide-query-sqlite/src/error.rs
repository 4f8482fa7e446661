//! Classification of SQLite errors.

use oxide_query::{QueryError, SchemaObject};

/// The table or column an SQLite error message reports as missing.
///
/// Recognizes `no such table: t`, `no such column: t.c` (or a bare `c`) and
/// `table t has no column named c`.
#[must_use]
pub fn missing_object(message: &str) -> Option<SchemaObject> {
    if let Some(rest) = message.strip_prefix("no such table: ") {
        // schema-qualified names come back as `main.t`
        let table = rest.trim().rsplit('.').next().unwrap_or_default();
        return Some(SchemaObject::Table(table.to_string()));
    }
    if let Some(rest) = message.strip_prefix("no such column: ") {
        let rest = rest.trim();
        return Some(match rest.rsplit_once('.') {
            Some((table, column)) => SchemaObject::Column {
                table: Some(table.to_string()),
                column: column.to_string(),
            },
            None => SchemaObject::Column {
                table: None,
                column: rest.to_string(),
            },
        });
    }
    let (table, column) = message
        .strip_prefix("table ")?
        .split_once(" has no column named ")?;
    Some(SchemaObject::Column {
        table: Some(table.trim().to_string()),
        column: column.trim().to_string(),
    })
}

/// Maps an sqlx error onto the engine's error type.
pub(crate) fn classify(err: sqlx::Error) -> QueryError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(object) = missing_object(db.message()) {
            return QueryError::MissingSchema {
                object,
                message: db.message().to_string(),
            };
        }
    }
    QueryError::Database(err)
}
