//! QuerySet implementation for chainable queries.
//!
//! Chained calls only record clauses in the query's [`QueryState`]; nothing
//! touches the database until a terminal method (`get`, `first`, `count`,
//! `update`, ...) is awaited with a [`Connection`].

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oxide_query_core::naming::freeze;
use oxide_query_core::{quote_identifier, ColumnInfo, Row, SqlValue, ToSqlValue, Value};
use tracing::debug;

use crate::cache::Cache;
use crate::compiler::{order_fragment, select_fragment, SqlCompiler, AGGREGATE_ALIAS, COUNT_ALIAS};
use crate::connection::{Connection, ExecResult};
use crate::error::{QueryError, Result};
use crate::executor::Executor;
use crate::model::Model;
use crate::query::{Aggregate, Q};
use crate::registry::Registry;
use crate::relation::{loader, RelationMode, RelationOptions, ResolvedRelation};
use crate::state::{Connector, QueryFlags, QueryState, Slot, Trashed};

/// A chainable query against one model.
///
/// Cloning a QuerySet deep-copies its state, so a clone can be refined
/// independently of its source.
///
/// # Example
///
/// ```ignore
/// use oxide_query::Q;
///
/// let users = registry
///     .query("User")?
///     .filter(Q::eq("is_active", true))
///     .exclude(Q::eq("role", "banned"))
///     .with("posts.comments")?
///     .with_count("followers")?
///     .order_by("-created_at")
///     .limit(10)
///     .get(&conn)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct QuerySet {
    pub(crate) registry: Arc<Registry>,
    model: Arc<Model>,
    state: QueryState,
    cache: Option<(String, Option<Duration>)>,
}

impl QuerySet {
    /// Creates a query over `model` with the flags its configuration asks for.
    #[must_use]
    pub fn new(registry: Arc<Registry>, model: Arc<Model>) -> Self {
        let config = model.settings();
        let flags = QueryFlags {
            soft_delete: config.soft_delete,
            trashed: Trashed::Exclude,
            global_scope: config.global_scope,
            scope_limit: true,
            debug: config.debug,
            void: false,
        };
        Self {
            registry,
            model,
            state: QueryState::with_flags(flags),
            cache: None,
        }
    }

    /// The queried model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The recorded clauses.
    #[must_use]
    pub const fn state(&self) -> &QueryState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    /// Selects specific fields; `field AS alias` and `$raw:` expressions are
    /// accepted.
    #[must_use]
    pub fn select(mut self, fields: &[&str]) -> Self {
        for field in fields {
            self.state.push_select(select_fragment(&self.model, field));
        }
        self
    }

    /// Selects `table.*`.
    #[must_use]
    pub fn select_all(mut self) -> Self {
        self.state.set_wildcard(true);
        self
    }

    /// Makes the query return distinct rows.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.state.set_distinct(true);
        self
    }

    /// Adds a filter, combined with AND.
    #[must_use]
    pub fn filter(mut self, q: Q) -> Self {
        let sql = q.render(&self.model);
        self.state.push_where(Connector::And, sql);
        self
    }

    /// Adds a filter, combined with OR.
    #[must_use]
    pub fn or_filter(mut self, q: Q) -> Self {
        let sql = q.render(&self.model);
        self.state.push_where(Connector::Or, sql);
        self
    }

    /// Excludes rows matching the filter.
    #[must_use]
    pub fn exclude(mut self, q: Q) -> Self {
        let sql = q.not().render(&self.model);
        self.state.push_where(Connector::And, sql);
        self
    }

    /// Adds a raw condition; each `?` takes the next escaped parameter.
    #[must_use]
    pub fn where_raw(self, sql: &str, params: Vec<SqlValue>) -> Self {
        self.filter(Q::raw(sql, params))
    }

    fn push_join(mut self, kind: &str, table: &str, left: &str, right: &str) -> Self {
        let clause = format!(
            "{kind} {} ON {} = {}",
            quote_identifier(table),
            self.model.column(left),
            self.model.column(right)
        );
        self.state.push_join(clause);
        self
    }

    /// Adds `INNER JOIN table ON left = right`; the sides are `table.field`
    /// references.
    #[must_use]
    pub fn join(self, table: &str, left: &str, right: &str) -> Self {
        self.push_join("INNER JOIN", table, left, right)
    }

    /// Adds `LEFT JOIN table ON left = right`.
    #[must_use]
    pub fn left_join(self, table: &str, left: &str, right: &str) -> Self {
        self.push_join("LEFT JOIN", table, left, right)
    }

    /// Groups by a field.
    #[must_use]
    pub fn group_by(mut self, field: &str) -> Self {
        let column = self.model.column(field);
        self.state.push_group_by(column);
        self
    }

    /// Adds a HAVING condition.
    #[must_use]
    pub fn having(mut self, q: Q) -> Self {
        let sql = q.render(&self.model);
        self.state.push_having(sql);
        self
    }

    /// Adds an ordering; prefix the field with `-` for descending order.
    #[must_use]
    pub fn order_by(mut self, spec: &str) -> Self {
        let fragment = order_fragment(&self.model, spec);
        self.state.push_order_by(fragment);
        self
    }

    /// Limits the number of rows.
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.state.set_limit(Some(n));
        self
    }

    /// Skips rows.
    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.state.set_offset(Some(n));
        self
    }

    /// Includes soft-deleted rows.
    #[must_use]
    pub fn with_trashed(mut self) -> Self {
        self.state.flags_mut().trashed = Trashed::Include;
        self
    }

    /// Returns only soft-deleted rows.
    #[must_use]
    pub fn only_trashed(mut self) -> Self {
        self.state.flags_mut().trashed = Trashed::Only;
        self
    }

    /// Skips the model's global scope.
    #[must_use]
    pub fn without_global_scope(mut self) -> Self {
        self.state.flags_mut().global_scope = false;
        self
    }

    /// Logs every statement of this query at `info` level.
    #[must_use]
    pub fn debug(mut self) -> Self {
        self.state.flags_mut().debug = true;
        self
    }

    /// Compiles and logs statements without sending them.
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.state.flags_mut().void = true;
        self
    }

    /// Caches the result of [`get_cached`](Self::get_cached) under `key`.
    #[must_use]
    pub fn cache(mut self, key: &str, ttl: Option<Duration>) -> Self {
        self.cache = Some((key.to_string(), ttl));
        self
    }

    /// Resets the named clause slots.
    #[must_use]
    pub fn unset(mut self, slots: &[Slot]) -> Self {
        self.state.unset(slots);
        self
    }

    /// Sets a column for [`update`](Self::update).
    #[must_use]
    pub fn set<V: ToSqlValue>(mut self, field: &str, value: V) -> Self {
        let column = quote_identifier(&self.model.column_name(field));
        self.state
            .push_assignment(column, value.to_sql_value().to_sql_inline());
        self
    }

    /// Eager-loads a relation. Dotted paths (`posts.comments`) load every
    /// segment.
    pub fn with(self, path: &str) -> Result<Self> {
        self.with_relation(path, RelationOptions::default(), Ok)
    }

    /// Eager-loads a relation whose innermost query is refined by `f`.
    pub fn with_query<F>(self, path: &str, f: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Self>,
    {
        self.with_relation(path, RelationOptions::default(), f)
    }

    /// Attaches the number of related rows.
    pub fn with_count(self, path: &str) -> Result<Self> {
        self.with_relation(path, RelationOptions::mode(RelationMode::Count), Ok)
    }

    /// Keeps rows that have a related row.
    pub fn with_exists(self, path: &str) -> Result<Self> {
        self.with_relation(path, RelationOptions::mode(RelationMode::Exists), Ok)
    }

    /// Keeps rows that have no related row.
    pub fn with_not_exists(self, path: &str) -> Result<Self> {
        self.with_relation(path, RelationOptions::mode(RelationMode::NotExists), Ok)
    }

    /// Requests a relation with explicit options.
    ///
    /// For a dotted path, the leading segments are loaded (or, in an
    /// existence mode, nested as existence predicates); `options` and `f`
    /// apply to the last segment.
    ///
    /// # Errors
    ///
    /// [`QueryError::UnknownRelation`] for an undeclared segment and
    /// [`QueryError::Configuration`] for an unregistered target.
    pub fn with_relation<F>(self, path: &str, options: RelationOptions, f: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Self>,
    {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(QueryError::Configuration(format!(
                "invalid relation path `{path}`"
            )));
        }
        self.with_segments(&segments, options, f)
    }

    fn with_segments<F>(mut self, segments: &[&str], options: RelationOptions, f: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Self>,
    {
        let Some((head, rest)) = segments.split_first() else {
            return Ok(self);
        };
        let mode = if rest.is_empty() || options.mode.is_existence() {
            options.mode
        } else {
            RelationMode::Load
        };
        let mut relation = match self.state.take_relation(head, mode) {
            Some(relation) => relation,
            None => self.resolve(head, mode)?,
        };
        if rest.is_empty() {
            let mut query = relation.query;
            if options.trashed || options.all {
                relation.trashed = true;
                query = query.with_trashed();
            }
            if options.all {
                relation.all = true;
                query = query.without_global_scope();
            }
            relation.query = f(query)?;
        } else {
            relation.query = relation.query.with_segments(rest, options.nested(), f)?;
        }
        self.state.push_relation(relation);
        Ok(self)
    }

    fn resolve(&self, name: &str, mode: RelationMode) -> Result<ResolvedRelation> {
        let (declaration, target, keys) = self.registry.resolve_relation(&self.model, name)?;
        let query = Self::new(Arc::clone(&self.registry), Arc::clone(&target));
        Ok(ResolvedRelation {
            declaration,
            owner: Arc::clone(&self.model),
            target,
            keys,
            query,
            mode,
            trashed: false,
            all: false,
        })
    }

    /// Renders the SELECT this query runs, using the static schema (or
    /// `table.*` without one) as the default column list.
    #[must_use]
    pub fn to_sql(&self) -> String {
        SqlCompiler::new(&self.model).select(&self.state, self.model.schema().unwrap_or_default())
    }

    fn compiler(&self) -> SqlCompiler<'_> {
        SqlCompiler::new(&self.model)
    }

    fn executor<'a, C: Connection>(&'a self, conn: &'a C) -> Executor<'a, C> {
        Executor::new(conn, &self.registry, &self.model, *self.state.flags())
    }

    /// The default column list: the static schema, else the live one.
    async fn default_columns<C: Connection>(&self, conn: &C) -> Result<Vec<ColumnInfo>> {
        if self.state.wildcard() || !self.state.select().is_empty() {
            return Ok(Vec::new());
        }
        match self.model.schema() {
            Some(columns) => Ok(columns.to_vec()),
            None if self.state.flags().void => Ok(Vec::new()),
            None => self.registry.introspect(conn, &self.model).await,
        }
    }

    /// Runs the SELECT without resolving relations.
    pub(crate) async fn fetch_rows<C: Connection>(&self, conn: &C) -> Result<Vec<Row>> {
        let columns = self.default_columns(conn).await?;
        let sql = self.compiler().select(&self.state, &columns);
        self.executor(conn).fetch(&sql).await
    }

    /// A relation whose sub-query carries this query's debug and dry-run
    /// flags.
    fn inherit_flags<'r>(&self, relation: &'r ResolvedRelation) -> Cow<'r, ResolvedRelation> {
        let flags = self.state.flags();
        let sub = relation.query.state.flags();
        if (!flags.debug || sub.debug) && (!flags.void || sub.void) {
            return Cow::Borrowed(relation);
        }
        let mut relation = relation.clone();
        let sub = relation.query.state.flags_mut();
        sub.debug |= flags.debug;
        sub.void |= flags.void;
        Cow::Owned(relation)
    }

    /// Runs the query and resolves its requested relations onto the rows.
    ///
    /// # Errors
    ///
    /// Connection errors, and [`QueryError::MissingRelationKey`] when a row
    /// lacks the key a requested relation joins on. A failing relation
    /// fetch fails the whole call.
    pub async fn get<C: Connection>(&self, conn: &C) -> Result<Vec<Row>> {
        let mut rows = self.fetch_rows(conn).await?;
        for relation in self.state.relations() {
            if relation.mode.is_existence() {
                continue;
            }
            let relation = self.inherit_flags(relation);
            loader::load(conn, &mut rows, &relation).await?;
        }
        Ok(rows)
    }

    /// Returns the first row, if any.
    pub async fn first<C: Connection>(&self, conn: &C) -> Result<Option<Row>> {
        let rows = self.clone().limit(1).get(conn).await?;
        Ok(rows.into_iter().next())
    }

    /// Returns exactly one row.
    ///
    /// # Errors
    ///
    /// [`QueryError::NotFound`] or [`QueryError::MultipleObjectsReturned`]
    /// when zero or several rows match.
    pub async fn one<C: Connection>(&self, conn: &C) -> Result<Row> {
        let mut rows = self.clone().limit(2).get(conn).await?.into_iter();
        match (rows.next(), rows.next()) {
            (None, _) => Err(QueryError::NotFound),
            (Some(row), None) => Ok(row),
            (Some(_), Some(_)) => Err(QueryError::MultipleObjectsReturned),
        }
    }

    /// Returns the row with the given primary key, if any.
    pub async fn find<C: Connection, V: ToSqlValue>(&self, conn: &C, pk: V) -> Result<Option<Row>> {
        let field = freeze(&self.model.primary_key_column());
        self.clone().filter(Q::eq(&field, pk)).first(conn).await
    }

    /// Counts matching rows.
    pub async fn count<C: Connection>(&self, conn: &C) -> Result<i64> {
        let columns = if self.state.distinct() || !self.state.group_by().is_empty() {
            self.default_columns(conn).await?
        } else {
            Vec::new()
        };
        let sql = self.compiler().count(&self.state, &columns);
        let rows = self.executor(conn).fetch(&sql).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(COUNT_ALIAS))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Whether any row matches.
    pub async fn exists<C: Connection>(&self, conn: &C) -> Result<bool> {
        let sql = self.compiler().exists(&self.state);
        Ok(!self.executor(conn).fetch(&sql).await?.is_empty())
    }

    /// Computes an aggregate over the matching rows; `None` for SQL NULL.
    #[allow(clippy::cast_precision_loss)]
    pub async fn aggregate<C: Connection>(&self, conn: &C, aggregate: Aggregate) -> Result<Option<f64>> {
        let sql = self.compiler().aggregate(&self.state, &aggregate);
        let rows = self.executor(conn).fetch(&sql).await?;
        let value = rows.first().and_then(|row| row.get(AGGREGATE_ALIAS));
        Ok(match value {
            Some(Value::Int(n)) => Some(*n as f64),
            Some(Value::Float(f)) => Some(*f),
            Some(Value::Text(s)) => s.parse().ok(),
            _ => None,
        })
    }

    fn literal_pairs(&self, row: &Row) -> Vec<(String, String)> {
        row.iter()
            .filter_map(|(field, value)| {
                let literal = value.to_sql_value()?.to_sql_inline();
                Some((quote_identifier(&self.model.column_name(field)), literal))
            })
            .collect()
    }

    /// Inserts one row. Attached relation values are ignored.
    pub async fn insert<C: Connection>(&self, conn: &C, row: &Row) -> Result<ExecResult> {
        self.insert_many(conn, std::slice::from_ref(row)).await
    }

    /// Inserts several rows in one statement; every row must set the same
    /// fields.
    pub async fn insert_many<C: Connection>(&self, conn: &C, rows: &[Row]) -> Result<ExecResult> {
        let mut state = self.state.clone();
        state.unset(&[Slot::Values]);
        for row in rows {
            state.push_values(self.literal_pairs(row));
        }
        let sql = self.compiler().insert(&state)?;
        self.executor(conn).execute(&sql).await
    }

    /// Applies the [`set`](Self::set) assignments to the matching rows and
    /// returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// [`QueryError::UnsafeStatement`] without a WHERE condition, before
    /// anything is sent.
    pub async fn update<C: Connection>(&self, conn: &C) -> Result<u64> {
        let sql = self.compiler().update(&self.state)?;
        Ok(self.executor(conn).execute(&sql).await?.affected_rows)
    }

    /// Deletes the matching rows and returns how many were removed.
    ///
    /// # Errors
    ///
    /// [`QueryError::UnsafeStatement`] without a WHERE condition, before
    /// anything is sent.
    pub async fn delete<C: Connection>(&self, conn: &C) -> Result<u64> {
        let sql = self.compiler().delete(&self.state)?;
        Ok(self.executor(conn).execute(&sql).await?.affected_rows)
    }

    fn deleted_at(&self) -> Result<String> {
        self.model.deleted_at_column().ok_or_else(|| {
            QueryError::Configuration(format!(
                "model `{}` does not use soft delete",
                self.model.name()
            ))
        })
    }

    /// Stamps the matching rows as deleted. Rows already deleted are left
    /// alone.
    pub async fn soft_delete<C: Connection>(&self, conn: &C) -> Result<u64> {
        let column = self.deleted_at()?;
        let mut query = self.clone();
        query.state.flags_mut().trashed = Trashed::Exclude;
        query.state.push_assignment(
            quote_identifier(&column),
            SqlValue::DateTime(Utc::now().naive_utc()).to_sql_inline(),
        );
        query.update(conn).await
    }

    /// Clears the deletion stamp of the matching deleted rows.
    pub async fn restore<C: Connection>(&self, conn: &C) -> Result<u64> {
        let column = self.deleted_at()?;
        let mut query = self.clone();
        query.state.flags_mut().trashed = Trashed::Only;
        query
            .state
            .push_assignment(quote_identifier(&column), SqlValue::Null.to_sql_inline());
        query.update(conn).await
    }

    /// Like [`get`](Self::get), answered from `cache` when the query was given
    /// a key with [`cache`](Self::cache).
    pub async fn get_cached<C: Connection, K: Cache>(&self, conn: &C, cache: &K) -> Result<Vec<Row>> {
        let Some((key, ttl)) = &self.cache else {
            return self.get(conn).await;
        };
        if let Some(rows) = cache.get(key).await? {
            debug!(model = self.model.name(), key = key.as_str(), "cache hit");
            return Ok(rows);
        }
        let rows = self.get(conn).await?;
        cache.set(key, &rows, *ttl).await?;
        Ok(rows)
    }
}
