//! # oxide-query-sqlite
//!
//! SQLite driver for `oxide-query`, built on an sqlx pool.
//!
//! - [`SqliteBackend`] implements [`Connection`](oxide_query::Connection):
//!   rows are decoded by storage class, transactions pin every statement to
//!   one pooled connection, and missing tables or columns are reported as
//!   [`QueryError::MissingSchema`](oxide_query::QueryError::MissingSchema)
//! - introspection reads `PRAGMA table_info` and `sqlite_master`
//! - [`SqliteDdl`] repairs a missing table or column from a model's static
//!   schema. SQLite only supports `ADD COLUMN` among the [ALTER TABLE]
//!   forms needed here, so added columns carry their name and type only.
//!
//! [ALTER TABLE]: https://www.sqlite.org/lang_altertable.html
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use oxide_query::{Model, Registry};
//! use oxide_query_sqlite::{SqliteBackend, SqliteDdl};
//!
//! let conn = SqliteBackend::connect("sqlite::memory:").await?;
//!
//! let mut registry = Registry::new();
//! registry.register(Model::new("User", "users"))?;
//! registry.set_ddl_provider(Arc::new(SqliteDdl));
//! registry.discover_pivot_tables(&conn).await?;
//! let registry = Arc::new(registry);
//!
//! let users = registry.query("User")?.get(&conn).await?;
//! ```

mod connection;
mod error;
mod schema;

pub use connection::SqliteBackend;
pub use error::missing_object;
pub use schema::{add_column_sql, column_definition, create_table_sql, SqliteDdl};
