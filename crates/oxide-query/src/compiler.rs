//! SQL rendering.
//!
//! [`SqlCompiler`] turns a [`QueryState`] into statement text. It never
//! mutates the state it is given: the global scope is merged into a local
//! copy for every compilation, and the soft-delete predicate is appended
//! while the WHERE clause is assembled.

use std::borrow::Cow;

use oxide_query_core::naming::{split_marker, Marker};
use oxide_query_core::{quote_identifier, ColumnInfo};

use crate::error::{QueryError, Result};
use crate::model::Model;
use crate::query::Aggregate;
use crate::relation::exists;
use crate::state::{Connector, QueryState, Slot, Trashed};

/// Alias of the count column in COUNT statements.
pub const COUNT_ALIAS: &str = "__count";

/// Alias of the value column in aggregate statements.
pub const AGGREGATE_ALIAS: &str = "__aggregate";

/// Renders an ordering such as `-created_at` against a model.
#[must_use]
pub fn order_fragment(model: &Model, spec: &str) -> String {
    match spec.strip_prefix('-') {
        Some(field) => format!("{} DESC", model.column(field)),
        None => format!("{} ASC", model.column(spec)),
    }
}

/// Renders a selected field, honoring `field AS alias`.
///
/// `$raw:` expressions are emitted as written, alias included.
#[must_use]
pub fn select_fragment(model: &Model, field: &str) -> String {
    if split_marker(field).0 == Marker::Raw {
        return model.column(field);
    }
    let lower = field.to_ascii_lowercase();
    match lower.rfind(" as ") {
        Some(at) if is_bare_identifier(field[at + 4..].trim()) => format!(
            "{} AS {}",
            model.column(field[..at].trim()),
            quote_identifier(field[at + 4..].trim())
        ),
        _ => model.column(field),
    }
}

fn is_bare_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Stateless statement rendering for one model.
#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler<'a> {
    model: &'a Model,
}

impl<'a> SqlCompiler<'a> {
    /// Creates a compiler for `model`.
    #[must_use]
    pub const fn new(model: &'a Model) -> Self {
        Self { model }
    }

    /// The state with the model's global scope merged in, when enabled.
    fn scoped<'s>(&self, state: &'s QueryState) -> Cow<'s, QueryState> {
        let Some(scope) = self.model.scope() else {
            return Cow::Borrowed(state);
        };
        if !state.flags().global_scope {
            return Cow::Borrowed(state);
        }
        let mut merged = state.clone();
        for q in &scope.filters {
            merged.push_where(Connector::And, q.render(self.model));
        }
        for field in &scope.select {
            merged.push_select(select_fragment(self.model, field));
        }
        for spec in &scope.order_by {
            merged.push_order_by(order_fragment(self.model, spec));
        }
        if scope.limit.is_some() && state.flags().scope_limit {
            merged.set_limit(scope.limit);
        }
        Cow::Owned(merged)
    }

    /// The soft-delete predicate the state's flags call for.
    fn soft_delete_predicate(&self, state: &QueryState) -> Option<String> {
        let flags = state.flags();
        if !flags.soft_delete {
            return None;
        }
        let column = self.model.physical(&self.model.deleted_at_column()?);
        let predicate = match flags.trashed {
            Trashed::Include => return None,
            Trashed::Exclude => format!("{column} IS NULL"),
            Trashed::Only => format!("{column} IS NOT NULL"),
        };
        let or_connected = state
            .wheres()
            .iter()
            .skip(1)
            .any(|w| w.connector == Connector::Or);
        let present = !or_connected
            && state
                .wheres()
                .iter()
                .any(|w| conjuncts(&w.sql).contains(&predicate.as_str()));
        (!present).then_some(predicate)
    }

    /// User conditions joined by their connectors.
    fn user_conditions(state: &QueryState) -> Option<String> {
        let mut wheres = state.wheres().iter();
        let first = wheres.next()?;
        let mut sql = wrap_or(&first.sql);
        let mut has_or = false;
        for fragment in wheres {
            has_or |= fragment.connector == Connector::Or;
            sql.push(' ');
            sql.push_str(fragment.connector.as_sql());
            sql.push(' ');
            sql.push_str(&wrap_or(&fragment.sql));
        }
        if has_or {
            sql = format!("({sql})");
        }
        Some(sql)
    }

    /// The full WHERE body of `state` without the global scope: user
    /// conditions, existence predicates of relations, then the soft-delete
    /// predicate.
    fn conditions(&self, state: &QueryState) -> Vec<String> {
        let mut conditions: Vec<String> = Self::user_conditions(state).into_iter().collect();
        conditions.extend(
            state
                .relations()
                .iter()
                .filter(|r| r.mode.is_existence())
                .map(exists::predicate),
        );
        conditions.extend(self.soft_delete_predicate(state));
        conditions
    }

    /// The WHERE body of `state` with the global scope applied, as used by
    /// correlated sub-queries. `None` when there is no condition.
    #[must_use]
    pub fn where_sql(&self, state: &QueryState) -> Option<String> {
        let state = self.scoped(state);
        let conditions = self.conditions(&state);
        (!conditions.is_empty()).then(|| conditions.join(" AND "))
    }

    fn push_where(&self, sql: &mut String, state: &QueryState) {
        let conditions = self.conditions(state);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
    }

    fn push_from(&self, sql: &mut String, state: &QueryState) {
        sql.push_str(" FROM ");
        sql.push_str(&quote_identifier(self.model.table()));
        for join in state.joins() {
            sql.push(' ');
            sql.push_str(join);
        }
    }

    fn push_tail(sql: &mut String, state: &QueryState) {
        if !state.group_by().is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&state.group_by().join(", "));
        }
        if !state.having().is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&state.having().join(" AND "));
        }
        if !state.order_by().is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&state.order_by().join(", "));
        }
        match (state.limit(), state.offset()) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite needs a LIMIT for OFFSET
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
    }

    fn projection(&self, state: &QueryState, columns: &[ColumnInfo]) -> String {
        let mut fields: Vec<String> = Vec::new();
        if state.wildcard() {
            fields.push(format!("{}.*", quote_identifier(self.model.table())));
        }
        fields.extend(state.select().iter().cloned());
        if fields.is_empty() {
            if columns.is_empty() {
                fields.push(format!("{}.*", quote_identifier(self.model.table())));
            } else {
                fields.extend(columns.iter().map(|c| self.model.physical(&c.name)));
            }
        }
        fields.join(", ")
    }

    /// Renders a SELECT.
    ///
    /// Without selected fields or a wildcard, `columns` (the static schema or
    /// the introspected one) become the qualified column list; an empty list
    /// falls back to `table.*`.
    #[must_use]
    pub fn select(&self, state: &QueryState, columns: &[ColumnInfo]) -> String {
        let state = self.scoped(state);
        let mut sql = String::from("SELECT ");
        if state.distinct() {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.projection(&state, columns));
        self.push_from(&mut sql, &state);
        self.push_where(&mut sql, &state);
        Self::push_tail(&mut sql, &state);
        sql
    }

    /// Renders a row count. Grouped or distinct queries are counted as a
    /// sub-select.
    #[must_use]
    pub fn count(&self, state: &QueryState, columns: &[ColumnInfo]) -> String {
        if state.distinct() || !state.group_by().is_empty() {
            let mut inner = state.clone();
            inner.unset(&[Slot::OrderBy]);
            return format!(
                "SELECT COUNT(*) AS {} FROM ({}) AS \"__counted\"",
                quote_identifier(COUNT_ALIAS),
                self.select(&inner, columns)
            );
        }
        let state = self.scoped(state);
        let mut sql = format!("SELECT COUNT(*) AS {}", quote_identifier(COUNT_ALIAS));
        self.push_from(&mut sql, &state);
        self.push_where(&mut sql, &state);
        sql
    }

    /// Renders an existence probe returning at most one row.
    #[must_use]
    pub fn exists(&self, state: &QueryState) -> String {
        let state = self.scoped(state);
        let mut sql = String::from("SELECT 1 AS \"__exists\"");
        self.push_from(&mut sql, &state);
        self.push_where(&mut sql, &state);
        if !state.group_by().is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&state.group_by().join(", "));
        }
        if !state.having().is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&state.having().join(" AND "));
        }
        sql.push_str(" LIMIT 1");
        sql
    }

    /// Renders a single aggregate over the matching rows.
    #[must_use]
    pub fn aggregate(&self, state: &QueryState, aggregate: &Aggregate) -> String {
        let state = self.scoped(state);
        let mut sql = format!(
            "SELECT {} AS {}",
            aggregate.to_sql(self.model),
            quote_identifier(AGGREGATE_ALIAS)
        );
        self.push_from(&mut sql, &state);
        self.push_where(&mut sql, &state);
        sql
    }

    /// Renders an INSERT of the state's value rows.
    ///
    /// Every row must name the same columns as the first one.
    pub fn insert(&self, state: &QueryState) -> Result<String> {
        let table = quote_identifier(self.model.table());
        let Some(first) = state.values().first() else {
            return Err(QueryError::InvalidField(String::from("no rows to insert")));
        };
        if first.is_empty() {
            if state.values().len() > 1 {
                return Err(QueryError::InvalidField(String::from(
                    "cannot insert several rows without columns",
                )));
            }
            return Ok(format!("INSERT INTO {table} DEFAULT VALUES"));
        }
        let columns: Vec<&str> = first.iter().map(|(c, _)| c.as_str()).collect();
        let mut tuples = Vec::with_capacity(state.values().len());
        for row in state.values() {
            if row.len() != columns.len() || row.iter().zip(&columns).any(|((c, _), e)| c.as_str() != *e) {
                return Err(QueryError::InvalidField(format!(
                    "every inserted row must set the columns {}",
                    columns.join(", ")
                )));
            }
            let literals: Vec<&str> = row.iter().map(|(_, v)| v.as_str()).collect();
            tuples.push(format!("({})", literals.join(", ")));
        }
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES {}",
            columns.join(", "),
            tuples.join(", ")
        ))
    }

    /// Refuses a write that would touch every row.
    ///
    /// A write needs a user condition or an existence predicate, and a
    /// condition on the soft-delete column alone does not count.
    fn guard(&self, state: &QueryState, statement: &str) -> Result<()> {
        let deleted_at = self
            .model
            .deleted_at_column()
            .map(|c| self.model.physical(&c));
        let soft_delete_only = |sql: &str| {
            deleted_at.as_ref().is_some_and(|column| {
                let sql = sql.trim();
                sql == format!("{column} IS NULL") || sql == format!("{column} IS NOT NULL")
            })
        };
        let restricted = state.wheres().iter().any(|w| !soft_delete_only(&w.sql))
            || state.relations().iter().any(|r| r.mode.is_existence());
        if restricted {
            Ok(())
        } else {
            Err(QueryError::UnsafeStatement(format!(
                "{statement} on `{}` without a WHERE condition",
                self.model.table()
            )))
        }
    }

    /// Renders an UPDATE of the state's assignments.
    pub fn update(&self, state: &QueryState) -> Result<String> {
        self.guard(state, "UPDATE")?;
        if state.assignments().is_empty() {
            return Err(QueryError::InvalidField(String::from("no columns to update")));
        }
        let set: Vec<String> = state
            .assignments()
            .iter()
            .map(|(column, value)| format!("{column} = {value}"))
            .collect();
        let mut sql = format!(
            "UPDATE {} SET {}",
            quote_identifier(self.model.table()),
            set.join(", ")
        );
        self.push_where(&mut sql, state);
        Ok(sql)
    }

    /// Renders a DELETE.
    pub fn delete(&self, state: &QueryState) -> Result<String> {
        self.guard(state, "DELETE")?;
        let mut sql = format!("DELETE FROM {}", quote_identifier(self.model.table()));
        self.push_where(&mut sql, state);
        Ok(sql)
    }
}

/// Whether one pair of parentheses spans the whole fragment.
fn is_enclosed(sql: &str) -> bool {
    if !(sql.starts_with('(') && sql.ends_with(')')) {
        return false;
    }
    let mut depth = 0_usize;
    let mut in_literal = false;
    for (i, ch) in sql.char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == sql.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn strip_enclosing(mut sql: &str) -> &str {
    sql = sql.trim();
    while is_enclosed(sql) {
        sql = sql[1..sql.len() - 1].trim();
    }
    sql
}

/// The top-level `AND` operands of a fragment. A fragment with a top-level
/// `OR` is a single operand.
fn conjuncts(sql: &str) -> Vec<&str> {
    let sql = strip_enclosing(sql);
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut in_literal = false;
    let mut start = 0;
    for (i, ch) in sql.char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => depth = depth.saturating_sub(1),
            ' ' if !in_literal && depth == 0 => {
                let rest = &sql[i..];
                if rest.starts_with(" OR ") {
                    return vec![sql];
                }
                if rest.starts_with(" AND ") && i >= start {
                    parts.push(strip_enclosing(&sql[start..i]));
                    start = i + 5;
                }
            }
            _ => {}
        }
    }
    parts.push(strip_enclosing(&sql[start..]));
    parts
}

/// Parenthesizes a fragment holding an `OR`.
fn wrap_or(sql: &str) -> String {
    if sql.contains(" OR ") && !is_enclosed(sql) {
        format!("({sql})")
    } else {
        sql.to_string()
    }
}
