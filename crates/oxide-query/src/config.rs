//! Per-model configuration.
//!
//! Library-wide toggles do not exist: every model carries its own
//! [`ModelConfig`], passed when the model is registered. The struct
//! deserializes from any serde format so it can live in a config file.

use oxide_query_core::NamingPattern;
use serde::Deserialize;

use crate::query::Q;

fn default_deleted_at() -> String {
    String::from("deleted_at")
}

const fn default_true() -> bool {
    true
}

/// Behavior toggles for one model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Naming pattern translating field names to column names.
    pub naming: NamingPattern,
    /// Whether queries exclude soft-deleted rows.
    pub soft_delete: bool,
    /// Logical name of the soft-delete timestamp column.
    #[serde(default = "default_deleted_at")]
    pub deleted_at_column: String,
    /// Whether the model's global scope applies by default.
    #[serde(default = "default_true")]
    pub global_scope: bool,
    /// Log every statement at `info` level instead of `debug`.
    pub debug: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            naming: NamingPattern::Verbatim,
            soft_delete: false,
            deleted_at_column: default_deleted_at(),
            global_scope: true,
            debug: false,
        }
    }
}

impl ModelConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the naming pattern.
    #[must_use]
    pub fn naming(mut self, naming: NamingPattern) -> Self {
        self.naming = naming;
        self
    }

    /// Enables soft-delete filtering on the given column.
    #[must_use]
    pub fn soft_delete(mut self, column: &str) -> Self {
        self.soft_delete = true;
        self.deleted_at_column = column.to_string();
        self
    }

    /// Enables or disables the global scope by default.
    #[must_use]
    pub fn global_scope(mut self, enabled: bool) -> Self {
        self.global_scope = enabled;
        self
    }

    /// Enables statement logging at `info` level.
    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

/// Clauses applied to every query against a model unless disabled.
///
/// WHERE, SELECT and ORDER BY fragments are merged additively; the limit
/// replaces the query's own.
#[derive(Debug, Clone, Default)]
pub struct GlobalScope {
    pub(crate) filters: Vec<Q>,
    pub(crate) select: Vec<String>,
    pub(crate) order_by: Vec<String>,
    pub(crate) limit: Option<u64>,
}

impl GlobalScope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    #[must_use]
    pub fn filter(mut self, q: Q) -> Self {
        self.filters.push(q);
        self
    }

    /// Adds a selected field.
    #[must_use]
    pub fn select(mut self, field: &str) -> Self {
        self.select.push(field.to_string());
        self
    }

    /// Adds an ordering (`-field` for descending).
    #[must_use]
    pub fn order_by(mut self, spec: &str) -> Self {
        self.order_by.push(spec.to_string());
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Whether the scope contributes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
            && self.select.is_empty()
            && self.order_by.is_empty()
            && self.limit.is_none()
    }
}
