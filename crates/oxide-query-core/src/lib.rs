//! # oxide-query-core
//!
//! Building blocks shared by the `oxide-query` engine and its drivers:
//!
//! - [`SqlValue`] and [`ToSqlValue`]: typed values and their escaped literal
//!   form (booleans become `0`/`1`, timestamps become datetime literals, raw
//!   values pass through)
//! - [`naming`]: logical-to-physical name translation under a
//!   [`NamingPattern`], plus singularization for default key names
//! - [`Row`] and [`Value`]: owned result records that related data is
//!   attached to
//! - [`ColumnInfo`]: column metadata from a static schema or introspection
//!
//! ```
//! use oxide_query_core::{naming, NamingPattern, SqlValue};
//!
//! assert_eq!(naming::resolve("userId", NamingPattern::SnakeCase, None), "user_id");
//! assert_eq!(SqlValue::Bool(true).to_sql_inline(), "1");
//! ```

pub mod dialect;
pub mod naming;
pub mod row;
pub mod schema;
pub mod value;

pub use dialect::{qualify, quote_identifier};
pub use naming::NamingPattern;
pub use row::{Row, RowKey, Value};
pub use schema::{ColumnInfo, ForeignKeyRef};
pub use value::{SqlValue, ToSqlValue};
