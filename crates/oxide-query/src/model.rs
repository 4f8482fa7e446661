//! Model types.
//!
//! A [`Model`] describes one table: its name, primary key, optional static
//! schema, configuration and global scope. Models are registered once in a
//! [`Registry`](crate::Registry) and shared read-only by every query.
//!
//! # Example
//!
//! ```
//! use oxide_query::{Model, ModelConfig, NamingPattern};
//! use oxide_query_core::ColumnInfo;
//!
//! let user = Model::new("User", "users")
//!     .columns(vec![
//!         ColumnInfo::new("id", "INTEGER").primary_key(),
//!         ColumnInfo::new("display_name", "TEXT"),
//!     ])
//!     .config(ModelConfig::new().naming(NamingPattern::SnakeCase));
//!
//! assert_eq!(user.column_name("displayName"), "display_name");
//! assert_eq!(user.column("displayName"), r#""users"."display_name""#);
//! ```

use oxide_query_core::naming::{self, split_marker, Marker};
use oxide_query_core::{qualify, quote_identifier, ColumnInfo};

use crate::config::{GlobalScope, ModelConfig};
use crate::error::{QueryError, Result};

/// A registered model type.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    table: String,
    primary_key: String,
    columns: Option<Vec<ColumnInfo>>,
    config: ModelConfig,
    scope: Option<GlobalScope>,
}

impl Model {
    /// Creates a model named `name` stored in `table`, keyed by `id`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: String::from("id"),
            columns: None,
            config: ModelConfig::default(),
            scope: None,
        }
    }

    /// A bare model over a table that has no registration, such as an
    /// undeclared pivot table.
    #[must_use]
    pub fn for_table(table: &str) -> Self {
        Self::new(table, table)
    }

    /// Sets the primary key field.
    #[must_use]
    pub fn primary_key(mut self, field: &str) -> Self {
        self.primary_key = field.to_string();
        self
    }

    /// Declares the static schema.
    ///
    /// Without one, the default column list comes from live introspection.
    #[must_use]
    pub fn columns(mut self, columns: Vec<ColumnInfo>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the global scope.
    #[must_use]
    pub fn global_scope(mut self, scope: GlobalScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Returns the model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the static schema, if declared.
    #[must_use]
    pub fn schema(&self) -> Option<&[ColumnInfo]> {
        self.columns.as_deref()
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn settings(&self) -> &ModelConfig {
        &self.config
    }

    /// Returns the global scope, if one is registered and non-empty.
    #[must_use]
    pub fn scope(&self) -> Option<&GlobalScope> {
        self.scope.as_ref().filter(|s| !s.is_empty())
    }

    /// Physical column name for a logical field.
    #[must_use]
    pub fn column_name(&self, field: &str) -> String {
        let schema_override = self.columns.as_ref().and_then(|cols| {
            cols.iter()
                .find(|c| c.field.as_deref() == Some(field))
                .map(|c| c.name.as_str())
        });
        naming::resolve(field, self.config.naming, schema_override)
    }

    /// Physical primary key column.
    #[must_use]
    pub fn primary_key_column(&self) -> String {
        self.column_name(&self.primary_key)
    }

    /// Qualified, quoted column reference for a field.
    ///
    /// `table.field` references keep their table; `$raw:` fields are emitted
    /// verbatim.
    #[must_use]
    pub fn column(&self, field: &str) -> String {
        let (marker, bare) = split_marker(field);
        match marker {
            Marker::Raw => bare.to_string(),
            Marker::Freeze => qualify(&self.table, field),
            Marker::None => match bare.split_once('.') {
                Some((table, column)) if column == "*" => {
                    format!("{}.*", quote_identifier(table))
                }
                Some((table, column)) => qualify(table, &self.column_name(column)),
                None if bare == "*" => format!("{}.*", quote_identifier(&self.table)),
                None => qualify(&self.table, &self.column_name(bare)),
            },
        }
    }

    /// Qualified reference for an already-physical column name.
    #[must_use]
    pub fn physical(&self, column: &str) -> String {
        qualify(&self.table, &naming::freeze(column))
    }

    /// Physical soft-delete column, when soft delete is enabled.
    #[must_use]
    pub fn deleted_at_column(&self) -> Option<String> {
        self.config
            .soft_delete
            .then(|| self.column_name(&self.config.deleted_at_column))
    }

    /// Checks the declaration is usable.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.table.is_empty() {
            return Err(QueryError::Configuration(String::from(
                "model name and table must not be empty",
            )));
        }
        if self.primary_key.is_empty() {
            return Err(QueryError::Configuration(format!(
                "model `{}` has no primary key",
                self.name
            )));
        }
        if let Some(columns) = &self.columns {
            let pk = self.primary_key_column();
            if !columns.iter().any(|c| c.name == pk) {
                return Err(QueryError::Configuration(format!(
                    "model `{}` declares columns but not its primary key `{pk}`",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_query_core::NamingPattern;

    fn users() -> Model {
        Model::new("User", "users")
            .columns(vec![
                ColumnInfo::new("id", "INTEGER").primary_key(),
                ColumnInfo::new("usr_mail", "TEXT").field("email"),
            ])
            .config(ModelConfig::new().naming(NamingPattern::SnakeCase))
    }

    #[test]
    fn test_column_uses_pattern_and_override() {
        let model = users();
        assert_eq!(model.column("createdAt"), "\"users\".\"created_at\"");
        assert_eq!(model.column("email"), "\"users\".\"usr_mail\"");
        assert_eq!(model.column("$raw:COUNT(*)"), "COUNT(*)");
        assert_eq!(model.column("$freeze:createdAt"), "\"users\".\"createdAt\"");
        assert_eq!(model.column("posts.userId"), "\"posts\".\"user_id\"");
        assert_eq!(model.column("*"), "\"users\".*");
    }

    #[test]
    fn test_deleted_at_column() {
        assert_eq!(users().deleted_at_column(), None);
        let model = users().config(
            ModelConfig::new()
                .naming(NamingPattern::CamelCase)
                .soft_delete("deleted_at"),
        );
        assert_eq!(model.deleted_at_column().as_deref(), Some("deletedAt"));
    }

    #[test]
    fn test_validate() {
        assert!(users().validate().is_ok());
        assert!(matches!(
            users().primary_key("").validate(),
            Err(QueryError::Configuration(_))
        ));
        assert!(matches!(
            users().primary_key("uuid").validate(),
            Err(QueryError::Configuration(_))
        ));
    }
}
