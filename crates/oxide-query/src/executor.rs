//! Statement execution with logging and missing-schema recovery.

use std::future::Future;
use std::sync::Arc;

use oxide_query_core::Row;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ExecResult};
use crate::error::{QueryError, Result, SchemaObject};
use crate::model::Model;
use crate::registry::Registry;
use crate::state::QueryFlags;

/// Attempts per statement, counting the first one.
pub const MAX_ATTEMPTS: usize = 3;

/// Sends one query's statements to a connection.
pub(crate) struct Executor<'a, C> {
    conn: &'a C,
    registry: &'a Registry,
    model: &'a Model,
    flags: QueryFlags,
}

impl<'a, C: Connection> Executor<'a, C> {
    pub(crate) const fn new(
        conn: &'a C,
        registry: &'a Registry,
        model: &'a Model,
        flags: QueryFlags,
    ) -> Self {
        Self {
            conn,
            registry,
            model,
            flags,
        }
    }

    fn log(&self, sql: &str) {
        if self.flags.debug {
            info!(model = self.model.name(), dry_run = self.flags.void, sql = %sql, "statement");
        } else {
            debug!(model = self.model.name(), dry_run = self.flags.void, sql = %sql, "statement");
        }
    }

    /// Runs a row-returning statement.
    pub(crate) async fn fetch(&self, sql: &str) -> Result<Vec<Row>> {
        self.log(sql);
        if self.flags.void {
            return Ok(Vec::new());
        }
        let conn = self.conn;
        self.recover(move || conn.fetch_all(sql)).await
    }

    /// Runs a statement that returns no rows.
    pub(crate) async fn execute(&self, sql: &str) -> Result<ExecResult> {
        self.log(sql);
        if self.flags.void {
            return Ok(ExecResult::default());
        }
        let conn = self.conn;
        self.recover(move || conn.execute(sql)).await
    }

    /// The model whose static schema declares `missing`.
    fn owner_of(&self, missing: &SchemaObject) -> Option<Arc<Model>> {
        let table = match missing {
            SchemaObject::Table(table)
            | SchemaObject::Column {
                table: Some(table), ..
            } => table.as_str(),
            SchemaObject::Column { table: None, .. } => self.model.table(),
        };
        self.registry.model_for_table(table).or_else(|| {
            (table == self.model.table()).then(|| Arc::new(self.model.clone()))
        })
    }

    /// The corrective statement for a failure, if recovery applies.
    fn corrective_ddl(&self, err: &QueryError) -> Option<String> {
        let missing = err.missing_schema()?;
        let provider = self.registry.ddl_provider()?;
        let model = self.owner_of(missing)?;
        model.schema()?;
        provider.corrective_ddl(&model, missing)
    }

    /// Runs `attempt`, repairing a missing table or column through the DDL
    /// provider and retrying, up to [`MAX_ATTEMPTS`] times in total.
    ///
    /// Errors that are not missing-schema errors, or that the provider cannot
    /// repair, are returned unchanged; when the DDL itself fails, the
    /// statement's error is returned.
    async fn recover<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 1;
        loop {
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempts >= MAX_ATTEMPTS {
                return Err(err);
            }
            let Some(ddl) = self.corrective_ddl(&err) else {
                return Err(err);
            };
            warn!(
                model = self.model.name(),
                attempt = attempts,
                error = %err,
                ddl = %ddl,
                "repairing missing schema"
            );
            if let Err(ddl_err) = self.conn.execute(&ddl).await {
                warn!(error = %ddl_err, "corrective DDL failed");
                return Err(err);
            }
            attempts += 1;
        }
    }
}
