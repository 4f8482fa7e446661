//! Error types for the query engine.

use std::fmt;

use thiserror::Error;

/// A schema object a statement referenced but the database does not have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaObject {
    /// A missing table.
    Table(String),
    /// A missing column, with its table when the driver reports it.
    Column {
        /// Table the column was expected on.
        table: Option<String>,
        /// Column name.
        column: String,
    },
}

impl fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(name) => write!(f, "table `{name}`"),
            Self::Column {
                table: Some(table),
                column,
            } => write!(f, "column `{table}.{column}`"),
            Self::Column { table: None, column } => write!(f, "column `{column}`"),
        }
    }
}

/// Query engine errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A statement referenced a table or column that does not exist.
    #[error("missing {object}: {message}")]
    MissingSchema {
        /// The missing object.
        object: SchemaObject,
        /// The driver's message.
        message: String,
    },

    /// Invalid model or relation declaration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A model name that was never registered.
    #[error("unknown model `{0}`")]
    UnknownModel(String),

    /// A relation name that is not declared on the model.
    #[error("unknown relation `{relation}` on model `{model}`")]
    UnknownRelation {
        /// Owning model.
        model: String,
        /// Requested relation.
        relation: String,
    },

    /// A parent row lacks the key a relation joins on.
    #[error("relation `{relation}` needs key `{key}` on every parent row")]
    MissingRelationKey {
        /// Relation being resolved.
        relation: String,
        /// The absent key.
        key: String,
    },

    /// UPDATE/DELETE that would touch every row.
    #[error("unsafe statement: {0}")]
    UnsafeStatement(String),

    /// No object found matching the query.
    #[error("object not found")]
    NotFound,

    /// Multiple objects found when exactly one was expected.
    #[error("multiple objects returned when one was expected")]
    MultipleObjectsReturned,

    /// Invalid field name or value.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// Transaction misuse, e.g. commit without begin.
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl QueryError {
    /// The missing schema object, if this error reports one.
    #[must_use]
    pub const fn missing_schema(&self) -> Option<&SchemaObject> {
        match self {
            Self::MissingSchema { object, .. } => Some(object),
            _ => None,
        }
    }
}

/// Result type alias for query engine operations.
pub type Result<T> = std::result::Result<T, QueryError>;
