//! Lowering of relations into correlated `EXISTS` predicates.
//!
//! The target's own conditions, including the existence predicates of its
//! nested relations, are compiled first and spliced into the sub-select, so
//! nesting resolves innermost-first and only ever touches WHERE. A pivot
//! table contributes its own conditions (soft delete, global scope) the same
//! way the eager path's pivot query does.

use oxide_query_core::quote_identifier;

use super::{RelationMode, ResolvedRelation};
use crate::compiler::SqlCompiler;

fn sub_select(table: &str, correlation: String, extra: impl IntoIterator<Item = String>) -> String {
    let mut conditions = vec![correlation];
    conditions.extend(extra);
    format!(
        "SELECT 1 FROM {} WHERE {}",
        quote_identifier(table),
        conditions.join(" AND ")
    )
}

/// Renders `[NOT] EXISTS (...)` for a relation requested in an existence
/// mode.
pub(crate) fn predicate(relation: &ResolvedRelation) -> String {
    let owner = &relation.owner;
    let target = &relation.target;
    let keys = &relation.keys;
    let target_conditions = SqlCompiler::new(target).where_sql(relation.query.state());

    let inner = match &keys.pivot {
        None => sub_select(
            target.table(),
            format!(
                "{} = {}",
                target.physical(&keys.foreign_key),
                owner.physical(&keys.local_key)
            ),
            target_conditions,
        ),
        Some(pivot) => {
            let pivot_model = &pivot.model;
            let pivot_conditions =
                SqlCompiler::new(pivot_model).where_sql(relation.pivot_query(pivot).state());
            let target_exists = format!(
                "EXISTS ({})",
                sub_select(
                    target.table(),
                    format!(
                        "{} = {}",
                        target.physical(&keys.foreign_key),
                        pivot_model.physical(&pivot.foreign_column)
                    ),
                    target_conditions,
                )
            );
            sub_select(
                pivot_model.table(),
                format!(
                    "{} = {}",
                    pivot_model.physical(&pivot.local_column),
                    owner.physical(&keys.local_key)
                ),
                pivot_conditions.into_iter().chain([target_exists]),
            )
        }
    };

    match relation.mode {
        RelationMode::NotExists => format!("NOT EXISTS ({inner})"),
        _ => format!("EXISTS ({inner})"),
    }
}
