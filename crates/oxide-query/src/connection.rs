//! Collaborator interfaces: the database connection and the schema (DDL)
//! provider.

use std::fmt;
use std::future::Future;

use oxide_query_core::{ColumnInfo, Row};
use tracing::warn;

use crate::error::{Result, SchemaObject};
use crate::model::Model;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows changed.
    pub affected_rows: u64,
    /// Row id of the last inserted row, when the driver reports one.
    pub insert_id: Option<i64>,
}

/// A database connection.
///
/// While a transaction is open, every statement sent through the connection
/// runs inside it, whichever query (or clone of a query) sends it.
/// Implementations classify missing tables and columns as
/// [`QueryError::MissingSchema`](crate::QueryError::MissingSchema) so that
/// schema recovery can act on them.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Runs a statement and returns its rows.
    async fn fetch_all(&self, sql: &str) -> Result<Vec<Row>>;

    /// Runs a statement that returns no rows.
    async fn execute(&self, sql: &str) -> Result<ExecResult>;

    /// Live column list of a table; empty when the table does not exist.
    async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Names of all tables.
    async fn table_names(&self) -> Result<Vec<String>>;

    /// Opens a transaction.
    async fn begin_transaction(&self) -> Result<()>;

    /// Commits the open transaction.
    async fn commit(&self) -> Result<()>;

    /// Rolls back the open transaction.
    async fn rollback(&self) -> Result<()>;

    /// Releases the connection, rolling back any transaction left open.
    async fn end(&self) -> Result<()>;
}

/// Runs `f` inside a transaction.
///
/// Commits when `f` succeeds and rolls back when it fails; the error from `f`
/// is returned even if the rollback fails too.
pub async fn transaction<'c, C, F, Fut, T>(conn: &'c C, f: F) -> Result<T>
where
    C: Connection,
    F: FnOnce(&'c C) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    conn.begin_transaction().await?;
    match f(conn).await {
        Ok(value) => {
            conn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = conn.rollback().await {
                warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Produces a corrective DDL statement for a missing table or column from a
/// model's static schema.
pub trait DdlProvider: Send + Sync + fmt::Debug {
    /// The statement creating `missing`, or `None` when the schema does not
    /// declare it.
    fn corrective_ddl(&self, model: &Model, missing: &SchemaObject) -> Option<String>;
}
