//! The SQLite connection.

use std::fmt;

use oxide_query::{ColumnInfo, Connection, ExecResult, QueryError, Result, Row, Value};
use oxide_query_core::quote_identifier;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, Transaction, TypeInfo, ValueRef};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::classify;

/// A [`Connection`] over an sqlx SQLite pool.
///
/// Statements go to the pool until a transaction is opened; from then on
/// they run on the transaction's connection until it is committed or rolled
/// back.
pub struct SqliteBackend {
    pool: SqlitePool,
    tx: Mutex<Option<Transaction<'static, Sqlite>>>,
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }

    /// Opens a pool on `url`.
    ///
    /// An in-memory database lives as long as its connection, so the pool
    /// keeps a single one.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be opened.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_sqlite(&self, sql: &str) -> Result<Vec<SqliteRow>> {
        let mut tx = self.tx.lock().await;
        let rows = match tx.as_mut() {
            Some(tx) => sqlx::query(sql).fetch_all(&mut **tx).await,
            None => sqlx::query(sql).fetch_all(&self.pool).await,
        };
        rows.map_err(classify)
    }
}

/// Decodes a row by the storage class of each value.
fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => Value::Int(row.try_get(index)?),
                "REAL" => Value::Float(row.try_get(index)?),
                "BLOB" => Value::Blob(row.try_get(index)?),
                _ => Value::Text(row.try_get(index)?),
            }
        };
        decoded.insert(column.name(), value);
    }
    Ok(decoded)
}

fn column_info(row: &Row) -> Option<ColumnInfo> {
    let name = row.get("name").and_then(Value::as_str)?;
    let sql_type = row.get("type").and_then(Value::as_str).unwrap_or_default();
    let mut column = ColumnInfo::new(name, sql_type);
    if row.get("notnull").and_then(Value::as_i64).unwrap_or(0) != 0 {
        column = column.not_null();
    }
    if row.get("pk").and_then(Value::as_i64).unwrap_or(0) > 0 {
        column = column.primary_key();
    }
    Some(column)
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"))
}

impl Connection for SqliteBackend {
    async fn fetch_all(&self, sql: &str) -> Result<Vec<Row>> {
        self.fetch_sqlite(sql).await?.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str) -> Result<ExecResult> {
        let mut tx = self.tx.lock().await;
        let result = match tx.as_mut() {
            Some(tx) => sqlx::query(sql).execute(&mut **tx).await,
            None => sqlx::query(sql).execute(&self.pool).await,
        }
        .map_err(classify)?;
        Ok(ExecResult {
            affected_rows: result.rows_affected(),
            insert_id: is_insert(sql).then(|| result.last_insert_rowid()),
        })
    }

    async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table));
        let rows = self.fetch_all(&sql).await?;
        Ok(rows.iter().filter_map(column_info).collect())
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let rows = self
            .fetch_all(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn begin_transaction(&self) -> Result<()> {
        let mut slot = self.tx.lock().await;
        if slot.is_some() {
            return Err(QueryError::Transaction(String::from(
                "a transaction is already open",
            )));
        }
        *slot = Some(self.pool.begin().await?);
        debug!("transaction opened");
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let tx = self.tx.lock().await.take().ok_or_else(|| {
            QueryError::Transaction(String::from("commit without an open transaction"))
        })?;
        tx.commit().await?;
        debug!("transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let tx = self.tx.lock().await.take().ok_or_else(|| {
            QueryError::Transaction(String::from("rollback without an open transaction"))
        })?;
        tx.rollback().await?;
        debug!("transaction rolled back");
        Ok(())
    }

    async fn end(&self) -> Result<()> {
        if let Some(tx) = self.tx.lock().await.take() {
            warn!("transaction left open, rolling back");
            tx.rollback().await?;
        }
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> SqliteBackend {
        SqliteBackend::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_decode_storage_classes() {
        let conn = backend().await;
        let rows = conn
            .fetch_all("SELECT 1 AS i, 2.5 AS f, 'x' AS t, X'0A' AS b, NULL AS n")
            .await
            .unwrap();
        let row = &rows[0];
        assert_eq!(row.get("i"), Some(&Value::Int(1)));
        assert_eq!(row.get("f"), Some(&Value::Float(2.5)));
        assert_eq!(row.get("t"), Some(&Value::Text("x".into())));
        assert_eq!(row.get("b"), Some(&Value::Blob(vec![10])));
        assert_eq!(row.get("n"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_describe_and_table_names() {
        let conn = backend().await;
        conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL, bio TEXT)")
            .await
            .unwrap();

        let columns = conn.describe("users").await.unwrap();
        assert_eq!(columns.len(), 3);
        assert!(columns[0].is_primary_key);
        assert!(!columns[1].nullable);
        assert!(columns[2].nullable);
        assert_eq!(columns[1].sql_type, "TEXT");

        assert!(conn.describe("missing").await.unwrap().is_empty());
        assert_eq!(conn.table_names().await.unwrap(), vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_table_is_classified() {
        let conn = backend().await;
        let err = conn.fetch_all("SELECT * FROM \"ghosts\"").await.unwrap_err();
        assert!(matches!(
            err.missing_schema(),
            Some(oxide_query::SchemaObject::Table(t)) if t == "ghosts"
        ));
    }

    #[tokio::test]
    async fn test_insert_id_only_for_inserts() {
        let conn = backend().await;
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
            .await
            .unwrap();
        let inserted = conn.execute("INSERT INTO t (v) VALUES ('a')").await.unwrap();
        assert_eq!(inserted.insert_id, Some(1));
        assert_eq!(inserted.affected_rows, 1);
        let updated = conn.execute("UPDATE t SET v = 'b'").await.unwrap();
        assert_eq!(updated.insert_id, None);
    }

    #[tokio::test]
    async fn test_commit_without_transaction() {
        let conn = backend().await;
        assert!(matches!(conn.commit().await, Err(QueryError::Transaction(_))));
        assert!(matches!(conn.rollback().await, Err(QueryError::Transaction(_))));
        conn.begin_transaction().await.unwrap();
        assert!(matches!(
            conn.begin_transaction().await,
            Err(QueryError::Transaction(_))
        ));
        conn.rollback().await.unwrap();
    }
}
