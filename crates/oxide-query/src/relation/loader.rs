//! Eager loading of relations onto parent rows.
//!
//! Each relation costs one batched query over the unique parent keys, or two
//! through a pivot table, whatever the number of parents. Results are
//! computed in full before anything is attached, so a failed fetch (in this
//! relation or a nested one) leaves the parents untouched.

use std::collections::{HashMap, HashSet};

use futures::future::{FutureExt, LocalBoxFuture};
use oxide_query_core::{quote_identifier, Row, RowKey, Value};
use tracing::debug;

use super::{PivotKeys, RelationMode, ResolvedRelation};
use crate::compiler::COUNT_ALIAS;
use crate::connection::Connection;
use crate::error::{QueryError, Result};
use crate::query::Aggregate;
use crate::state::{Connector, Slot};

/// Unique non-null keys of `column` across `rows`, in first-seen order.
fn collect_keys(rows: &[Row], column: &str, relation: &str) -> Result<Vec<RowKey>> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for row in rows {
        let value = row
            .get(column)
            .ok_or_else(|| QueryError::MissingRelationKey {
                relation: relation.to_string(),
                key: column.to_string(),
            })?;
        if let Some(key) = value.key() {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }
    Ok(keys)
}

/// `column IN (...)`; an empty key set matches nothing but still costs the
/// one query.
fn in_keys(column: &str, keys: &[RowKey]) -> String {
    if keys.is_empty() {
        return format!("{column} IN (NULL)");
    }
    let literals: Vec<String> = keys.iter().map(RowKey::to_sql_inline).collect();
    format!("{column} IN ({})", literals.join(", "))
}

fn row_key(row: &Row, column: &str) -> Option<RowKey> {
    row.get(column).and_then(Value::key)
}

/// Loads `relation` onto `parents`.
///
/// Relations in an existence mode are compiled into the parent query and are
/// skipped here.
pub(crate) fn load<'a, C: Connection>(
    conn: &'a C,
    parents: &'a mut [Row],
    relation: &'a ResolvedRelation,
) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        if relation.mode.is_existence() {
            return Ok(());
        }
        match &relation.keys.pivot {
            None => load_direct(conn, parents, relation).await,
            Some(pivot) => load_through_pivot(conn, parents, relation, pivot).await,
        }
    }
    .boxed_local()
}

async fn load_direct<C: Connection>(
    conn: &C,
    parents: &mut [Row],
    relation: &ResolvedRelation,
) -> Result<()> {
    let name = relation.declaration.name.as_str();
    let local_key = relation.keys.local_key.as_str();
    let foreign_key = relation.keys.foreign_key.as_str();
    let keys = collect_keys(parents, local_key, name)?;

    let foreign_column = relation.target.physical(foreign_key);
    let mut query = relation.query.clone();
    query.state_mut().flags_mut().scope_limit = false;
    query
        .state_mut()
        .push_where(Connector::And, in_keys(&foreign_column, &keys));

    if relation.mode == RelationMode::Count {
        let state = query.state_mut();
        state.unset(&[
            Slot::Select,
            Slot::OrderBy,
            Slot::Limit,
            Slot::Offset,
            Slot::GroupBy,
            Slot::Having,
        ]);
        state.push_select(format!("{foreign_column} AS {}", quote_identifier(foreign_key)));
        state.push_select(format!(
            "{} AS {}",
            Aggregate::count_all().to_sql(&relation.target),
            quote_identifier(COUNT_ALIAS)
        ));
        state.push_group_by(foreign_column);
        let rows = query.fetch_rows(conn).await?;
        let counts: HashMap<RowKey, i64> = rows
            .iter()
            .filter_map(|row| {
                let count = row.get(COUNT_ALIAS).and_then(Value::as_i64)?;
                Some((row_key(row, foreign_key)?, count))
            })
            .collect();
        debug!(relation = name, parents = parents.len(), groups = counts.len(), "counted relation");
        let cap = relation.declaration.kind.is_one();
        for parent in parents.iter_mut() {
            let count = row_key(parent, local_key)
                .and_then(|k| counts.get(&k).copied())
                .unwrap_or(0);
            let count = if cap { count.min(1) } else { count };
            parent.insert(relation.attach_key(), count);
        }
        return Ok(());
    }

    if !query.state().select().is_empty() {
        query.state_mut().push_select(foreign_column);
    }
    let children = query.get(conn).await?;
    debug!(relation = name, parents = parents.len(), children = children.len(), "loaded relation");

    let mut groups: HashMap<RowKey, Vec<Row>> = HashMap::new();
    for child in children {
        if let Some(key) = row_key(&child, foreign_key) {
            groups.entry(key).or_default().push(child);
        }
    }
    let one = relation.declaration.attaches_one();
    for parent in parents.iter_mut() {
        let group = row_key(parent, local_key).and_then(|k| groups.get(&k));
        let value = match (one, group) {
            (true, Some(group)) => group.first().cloned().map_or(Value::Null, Value::from),
            (true, None) => Value::Null,
            (false, Some(group)) => Value::Many(group.clone()),
            (false, None) => Value::Many(Vec::new()),
        };
        parent.insert(relation.attach_key(), value);
    }
    Ok(())
}

async fn load_through_pivot<C: Connection>(
    conn: &C,
    parents: &mut [Row],
    relation: &ResolvedRelation,
    pivot: &PivotKeys,
) -> Result<()> {
    let name = relation.declaration.name.as_str();
    let local_key = relation.keys.local_key.as_str();
    let target_key = relation.keys.foreign_key.as_str();
    let keys = collect_keys(parents, local_key, name)?;

    // pivot rows for every parent
    let pivot_local = pivot.model.physical(&pivot.local_column);
    let pivot_foreign = pivot.model.physical(&pivot.foreign_column);
    let mut pivot_query = relation.pivot_query(pivot);
    {
        let state = pivot_query.state_mut();
        state.push_select(format!(
            "{pivot_local} AS {}",
            quote_identifier(&pivot.local_column)
        ));
        state.push_select(format!(
            "{pivot_foreign} AS {}",
            quote_identifier(&pivot.foreign_column)
        ));
        state.push_where(Connector::And, in_keys(&pivot_local, &keys));
    }
    let links = pivot_query.fetch_rows(conn).await?;

    let mut linked: HashMap<RowKey, Vec<RowKey>> = HashMap::new();
    let mut target_keys = Vec::new();
    let mut seen = HashSet::new();
    for link in &links {
        let (Some(parent), Some(target)) = (
            row_key(link, &pivot.local_column),
            row_key(link, &pivot.foreign_column),
        ) else {
            continue;
        };
        if seen.insert(target.clone()) {
            target_keys.push(target.clone());
        }
        linked.entry(parent).or_default().push(target);
    }

    // targets of every link
    let target_column = relation.target.physical(target_key);
    let mut query = relation.query.clone();
    query.state_mut().flags_mut().scope_limit = false;
    query
        .state_mut()
        .push_where(Connector::And, in_keys(&target_column, &target_keys));

    if relation.mode == RelationMode::Count {
        let state = query.state_mut();
        state.unset(&[Slot::Select, Slot::OrderBy, Slot::Limit, Slot::Offset]);
        state.push_select(format!("{target_column} AS {}", quote_identifier(target_key)));
        let present: HashSet<RowKey> = query
            .fetch_rows(conn)
            .await?
            .iter()
            .filter_map(|row| row_key(row, target_key))
            .collect();
        debug!(relation = name, parents = parents.len(), links = links.len(), "counted relation");
        for parent in parents.iter_mut() {
            let count = row_key(parent, local_key)
                .and_then(|k| linked.get(&k))
                .map_or(0, |targets| targets.iter().filter(|t| present.contains(t)).count());
            parent.insert(relation.attach_key(), i64::try_from(count).unwrap_or(i64::MAX));
        }
        return Ok(());
    }

    if !query.state().select().is_empty() {
        query.state_mut().push_select(target_column);
    }
    let children = query.get(conn).await?;
    debug!(
        relation = name,
        parents = parents.len(),
        links = links.len(),
        children = children.len(),
        "loaded relation"
    );

    let mut by_key: HashMap<RowKey, (usize, Row)> = HashMap::new();
    for (position, child) in children.into_iter().enumerate() {
        if let Some(key) = row_key(&child, target_key) {
            by_key.entry(key).or_insert((position, child));
        }
    }
    let single = relation.declaration.single;
    for parent in parents.iter_mut() {
        let mut related: Vec<&(usize, Row)> = row_key(parent, local_key)
            .and_then(|k| linked.get(&k))
            .map(|targets| targets.iter().filter_map(|t| by_key.get(t)).collect())
            .unwrap_or_default();
        related.sort_by_key(|(position, _)| *position);
        related.dedup_by_key(|(position, _)| *position);
        let value = if single {
            related
                .first()
                .map_or(Value::Null, |(_, row)| Value::from(row.clone()))
        } else {
            Value::Many(related.into_iter().map(|(_, row)| row.clone()).collect())
        };
        parent.insert(relation.attach_key(), value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_keys_dedupes_and_skips_null() {
        let rows = vec![
            Row::new().with("id", 1),
            Row::new().with("id", "1"),
            Row::new().with("id", Value::Null),
            Row::new().with("id", 2),
        ];
        assert_eq!(
            collect_keys(&rows, "id", "posts").unwrap(),
            vec![RowKey::Int(1), RowKey::Int(2)]
        );
    }

    #[test]
    fn test_collect_keys_requires_the_column() {
        let rows = vec![Row::new().with("id", 1), Row::new().with("name", "x")];
        let err = collect_keys(&rows, "id", "posts").unwrap_err();
        assert!(matches!(
            err,
            QueryError::MissingRelationKey { relation, key } if relation == "posts" && key == "id"
        ));
    }

    #[test]
    fn test_in_keys() {
        assert_eq!(in_keys("\"posts\".\"user_id\"", &[]), "\"posts\".\"user_id\" IN (NULL)");
        assert_eq!(
            in_keys("\"t\".\"k\"", &[RowKey::Int(1), RowKey::Text("a".into())]),
            "\"t\".\"k\" IN (1, 'a')"
        );
    }
}
