//! # oxide-query
//!
//! A query-construction and relation-resolution engine.
//!
//! This crate provides:
//! - [`Registry`] and [`Model`] for declaring tables, their configuration
//!   and their relations
//! - [`QuerySet`] for chainable queries that compile to SQL only when a
//!   terminal method is awaited
//! - [`Q`] objects for composable filters
//! - eager loading of relations in one batched query per relation (two
//!   through a pivot table), and lowering of relations into correlated
//!   `EXISTS` filters
//! - soft delete, global scopes and naming patterns applied on every
//!   compilation
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use oxide_query::{Model, ModelConfig, Q, Registry, RelationDeclaration};
//!
//! let mut registry = Registry::new();
//! registry.register(Model::new("User", "users"))?;
//! registry.register(Model::new("Post", "posts").config(ModelConfig::new().soft_delete("deleted_at")))?;
//! registry.relate("User", RelationDeclaration::has_many("posts", "Post"))?;
//! let registry = Arc::new(registry);
//!
//! // users with their live posts, one query for the users and one for the posts
//! let users = registry
//!     .query("User")?
//!     .filter(Q::eq("is_active", true))
//!     .with("posts")?
//!     .get(&conn)
//!     .await?;
//!
//! // users without any post, in a single statement
//! let lurkers = registry.query("User")?.with_not_exists("posts")?.get(&conn).await?;
//! ```
//!
//! ## Relations
//!
//! ```ignore
//! // nested eager loading
//! registry.query("User")?.with("posts.comments")?;
//!
//! // refine the related query
//! registry.query("User")?.with_query("posts", |q| Ok(q.order_by("-id").limit(3)))?;
//!
//! // counts instead of rows
//! registry.query("Post")?.with_count("subscribers")?;
//! ```

mod cache;
mod compiler;
mod config;
mod connection;
mod error;
mod executor;
mod model;
pub mod query;
mod queryset;
mod registry;
pub mod relation;
mod state;

pub use cache::{Cache, MemoryCache};
pub use compiler::{order_fragment, select_fragment, SqlCompiler, AGGREGATE_ALIAS, COUNT_ALIAS};
pub use config::{GlobalScope, ModelConfig};
pub use connection::{transaction, Connection, DdlProvider, ExecResult};
pub use error::{QueryError, Result, SchemaObject};
pub use executor::MAX_ATTEMPTS;
pub use model::Model;
pub use query::{avg, count_all, sum, Aggregate, CompareOp, Q};
pub use queryset::QuerySet;
pub use registry::Registry;
pub use relation::{
    RelationDeclaration, RelationKind, RelationMode, RelationOptions, ResolvedRelation,
};
pub use state::{Connector, QueryFlags, QueryState, Slot, Trashed, WhereFragment};

// Re-export commonly used types from oxide-query-core
pub use oxide_query_core::{ColumnInfo, NamingPattern, Row, RowKey, SqlValue, ToSqlValue, Value};
