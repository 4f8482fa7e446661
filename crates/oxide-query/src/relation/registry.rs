//! Per-model relation declarations and key inference.

use std::collections::HashMap;
use std::sync::Arc;

use oxide_query_core::naming;

use super::{PivotKeys, RelationDeclaration, RelationKeys, RelationKind};
use crate::error::{QueryError, Result};
use crate::model::Model;

/// Relation declarations keyed by owning model name.
#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
    declarations: HashMap<String, Vec<RelationDeclaration>>,
}

impl RelationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a declaration to a model's list.
    ///
    /// Relation names are unique per model.
    pub fn register(&mut self, model: &str, declaration: RelationDeclaration) -> Result<()> {
        let list = self.declarations.entry(model.to_string()).or_default();
        if list.iter().any(|d| d.name == declaration.name) {
            return Err(QueryError::Configuration(format!(
                "relation `{}` is already declared on model `{model}`",
                declaration.name
            )));
        }
        list.push(declaration);
        Ok(())
    }

    /// Declarations of a model, in registration order.
    #[must_use]
    pub fn declarations(&self, model: &str) -> &[RelationDeclaration] {
        self.declarations.get(model).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn declarations_mut(
        &mut self,
    ) -> impl Iterator<Item = (&String, &mut RelationDeclaration)> {
        self.declarations
            .iter_mut()
            .flat_map(|(model, list)| list.iter_mut().map(move |d| (model, d)))
    }

    /// Looks up a declaration by name.
    pub fn get(&self, model: &str, relation: &str) -> Result<&RelationDeclaration> {
        self.declarations(model)
            .iter()
            .find(|d| d.name == relation)
            .ok_or_else(|| QueryError::UnknownRelation {
                model: model.to_string(),
                relation: relation.to_string(),
            })
    }
}

/// Default pivot table name for a many-to-many declaration.
pub(crate) fn pivot_table_name(
    declaration: &RelationDeclaration,
    owner: &Model,
    target: &Model,
    pivot_model: Option<&Model>,
) -> String {
    declaration
        .pivot_table
        .clone()
        .or_else(|| pivot_model.map(|m| m.table().to_string()))
        .unwrap_or_else(|| naming::pivot_table_for(owner.table(), target.table()))
}

/// Infers the physical key columns of a declaration.
///
/// Explicit keys are resolved through the naming pattern of the model that
/// holds the column; inferred keys are `singular(table)_primaryKey` resolved
/// the same way.
pub(crate) fn infer_keys(
    declaration: &RelationDeclaration,
    owner: &Model,
    target: &Model,
    pivot_model: Option<Arc<Model>>,
) -> RelationKeys {
    let owner_pattern = owner.settings().naming;
    let target_pattern = target.settings().naming;
    match declaration.kind {
        RelationKind::HasOne | RelationKind::HasMany => RelationKeys {
            local_key: declaration
                .local_key
                .as_deref()
                .map_or_else(|| owner.primary_key_column(), |k| owner.column_name(k)),
            foreign_key: declaration.foreign_key.as_deref().map_or_else(
                || naming::foreign_key_for(owner.table(), &owner.primary_key_column(), target_pattern),
                |k| target.column_name(k),
            ),
            pivot: None,
        },
        RelationKind::BelongsTo => RelationKeys {
            local_key: declaration.local_key.as_deref().map_or_else(
                || naming::foreign_key_for(target.table(), &target.primary_key_column(), owner_pattern),
                |k| owner.column_name(k),
            ),
            foreign_key: declaration
                .foreign_key
                .as_deref()
                .map_or_else(|| target.primary_key_column(), |k| target.column_name(k)),
            pivot: None,
        },
        RelationKind::BelongsToMany => {
            let pivot = pivot_model.unwrap_or_else(|| {
                Arc::new(Model::for_table(&pivot_table_name(
                    declaration,
                    owner,
                    target,
                    None,
                )))
            });
            let pivot_pattern = if declaration.pivot_model.is_some() {
                pivot.settings().naming
            } else {
                owner_pattern
            };
            let local_column = declaration.local_key.as_deref().map_or_else(
                || naming::foreign_key_for(owner.table(), &owner.primary_key_column(), pivot_pattern),
                |k| pivot.column_name(k),
            );
            let foreign_column = declaration.pivot_foreign_key.as_deref().map_or_else(
                || naming::foreign_key_for(target.table(), &target.primary_key_column(), pivot_pattern),
                |k| pivot.column_name(k),
            );
            RelationKeys {
                local_key: owner.primary_key_column(),
                foreign_key: declaration
                    .foreign_key
                    .as_deref()
                    .map_or_else(|| target.primary_key_column(), |k| target.column_name(k)),
                pivot: Some(PivotKeys {
                    model: pivot,
                    local_column,
                    foreign_column,
                }),
            }
        }
    }
}
