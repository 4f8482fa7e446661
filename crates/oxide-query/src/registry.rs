//! The model registry.
//!
//! Models and their relations are registered once, then the registry is
//! frozen behind an [`Arc`] and every query holds a handle to it.

use std::collections::HashMap;
use std::sync::Arc;

use oxide_query_core::{naming, ColumnInfo};
use tokio::sync::RwLock;
use tracing::debug;

use crate::connection::{Connection, DdlProvider};
use crate::error::{QueryError, Result};
use crate::model::Model;
use crate::queryset::QuerySet;
use crate::relation::registry::{infer_keys, pivot_table_name};
use crate::relation::{RelationDeclaration, RelationKeys, RelationKind, RelationRegistry};

/// Registered models, their relations and the schema collaborator.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use oxide_query::{Model, Registry, RelationDeclaration};
///
/// let mut registry = Registry::new();
/// registry.register(Model::new("User", "users")).unwrap();
/// registry.register(Model::new("Post", "posts")).unwrap();
/// registry
///     .relate("User", RelationDeclaration::has_many("posts", "Post"))
///     .unwrap();
///
/// let registry = Arc::new(registry);
/// let sql = registry.query("User").unwrap().with("posts").unwrap().to_sql();
/// assert_eq!(sql, r#"SELECT "users".* FROM "users""#);
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    models: HashMap<String, Arc<Model>>,
    relations: RelationRegistry,
    ddl: Option<Arc<dyn DdlProvider>>,
    introspected: RwLock<HashMap<String, Vec<ColumnInfo>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model under its name.
    pub fn register(&mut self, model: Model) -> Result<()> {
        model.validate()?;
        if self.models.contains_key(model.name()) {
            return Err(QueryError::Configuration(format!(
                "model `{}` is already registered",
                model.name()
            )));
        }
        debug!(model = model.name(), table = model.table(), "registered model");
        self.models.insert(model.name().to_string(), Arc::new(model));
        Ok(())
    }

    /// Declares a relation on a registered model.
    ///
    /// The target is looked up when the relation is requested, so models may
    /// be registered in any order.
    pub fn relate(&mut self, model: &str, declaration: RelationDeclaration) -> Result<()> {
        if !self.models.contains_key(model) {
            return Err(QueryError::UnknownModel(model.to_string()));
        }
        self.relations.register(model, declaration)
    }

    /// Installs the schema collaborator used for missing-schema recovery.
    pub fn set_ddl_provider(&mut self, provider: Arc<dyn DdlProvider>) {
        self.ddl = Some(provider);
    }

    /// Returns the schema collaborator, if installed.
    #[must_use]
    pub fn ddl_provider(&self) -> Option<&dyn DdlProvider> {
        self.ddl.as_deref()
    }

    /// Looks up a model by name.
    pub fn model(&self, name: &str) -> Result<Arc<Model>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownModel(name.to_string()))
    }

    /// Looks up the model stored in `table`.
    #[must_use]
    pub fn model_for_table(&self, table: &str) -> Option<Arc<Model>> {
        self.models.values().find(|m| m.table() == table).cloned()
    }

    /// Relation declarations of a model.
    #[must_use]
    pub fn relations(&self, model: &str) -> &[RelationDeclaration] {
        self.relations.declarations(model)
    }

    /// Starts a query against a registered model.
    pub fn query(self: &Arc<Self>, model: &str) -> Result<QuerySet> {
        Ok(QuerySet::new(Arc::clone(self), self.model(model)?))
    }

    /// Resolves a relation of `owner` into its declaration, target and keys.
    pub(crate) fn resolve_relation(
        &self,
        owner: &Model,
        relation: &str,
    ) -> Result<(RelationDeclaration, Arc<Model>, RelationKeys)> {
        let declaration = self.relations.get(owner.name(), relation)?;
        let target = self.models.get(&declaration.target).cloned().ok_or_else(|| {
            QueryError::Configuration(format!(
                "relation `{}` on model `{}` targets unregistered model `{}`",
                declaration.name,
                owner.name(),
                declaration.target
            ))
        })?;
        let pivot = match &declaration.pivot_model {
            Some(name) => Some(self.models.get(name).cloned().ok_or_else(|| {
                QueryError::Configuration(format!(
                    "relation `{}` on model `{}` uses unregistered pivot model `{name}`",
                    declaration.name,
                    owner.name()
                ))
            })?),
            None => None,
        };
        let keys = infer_keys(declaration, owner, &target, pivot);
        Ok((declaration.clone(), target, keys))
    }

    /// Picks the pivot table of every many-to-many relation that names none.
    ///
    /// Both singular-name orders are looked up in the live table list; the
    /// sorted order wins when both exist, and stays the default when neither
    /// does.
    pub async fn discover_pivot_tables<C: Connection>(&mut self, conn: &C) -> Result<()> {
        let tables = conn.table_names().await?;
        let models = &self.models;
        for (owner, declaration) in self.relations.declarations_mut() {
            if declaration.kind != RelationKind::BelongsToMany
                || declaration.pivot_table.is_some()
                || declaration.pivot_model.is_some()
            {
                continue;
            }
            let (Some(owner), Some(target)) = (models.get(owner), models.get(&declaration.target))
            else {
                continue;
            };
            let sorted = pivot_table_name(declaration, owner, target, None);
            let reversed = naming::reversed_pivot_table_for(owner.table(), target.table());
            let chosen = if tables.contains(&sorted) || !tables.contains(&reversed) {
                sorted
            } else {
                reversed
            };
            debug!(
                model = owner.name(),
                relation = declaration.name.as_str(),
                pivot = chosen.as_str(),
                "resolved pivot table"
            );
            declaration.pivot_table = Some(chosen);
        }
        Ok(())
    }

    /// Columns of a table without a static schema, introspected once.
    pub(crate) async fn introspect<C: Connection>(
        &self,
        conn: &C,
        model: &Model,
    ) -> Result<Vec<ColumnInfo>> {
        if let Some(columns) = self.introspected.read().await.get(model.table()) {
            return Ok(columns.clone());
        }
        let columns = conn.describe(model.table()).await?;
        if !columns.is_empty() {
            self.introspected
                .write()
                .await
                .insert(model.table().to_string(), columns.clone());
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(Model::new("User", "users")).unwrap();
        registry.register(Model::new("Post", "posts")).unwrap();
        registry
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = registry();
        assert!(matches!(
            registry.register(Model::new("User", "people")),
            Err(QueryError::Configuration(_))
        ));
    }

    #[test]
    fn test_relate_requires_known_owner() {
        let mut registry = registry();
        assert!(matches!(
            registry.relate("Comment", RelationDeclaration::has_many("replies", "Comment")),
            Err(QueryError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_resolve_missing_target_is_configuration_error() {
        let mut registry = registry();
        registry
            .relate("User", RelationDeclaration::has_many("comments", "Comment"))
            .unwrap();
        let user = registry.model("User").unwrap();
        assert!(matches!(
            registry.resolve_relation(&user, "comments"),
            Err(QueryError::Configuration(_))
        ));
        assert!(matches!(
            registry.resolve_relation(&user, "likes"),
            Err(QueryError::UnknownRelation { .. })
        ));
    }

    #[test]
    fn test_model_for_table() {
        let registry = registry();
        assert_eq!(registry.model_for_table("posts").unwrap().name(), "Post");
        assert!(registry.model_for_table("tags").is_none());
    }
}
