//! Column metadata supplied by a static schema or by live introspection.

use serde::{Deserialize, Serialize};

/// A column referenced by a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
}

/// Metadata for one physical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Physical column name.
    pub name: String,
    /// Logical field name when it differs from the physical name.
    #[serde(default)]
    pub field: Option<String>,
    /// Declared SQL type, e.g. `INTEGER` or `TEXT`.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Whether NULL is allowed.
    #[serde(default)]
    pub nullable: bool,
    /// Whether this column is (part of) the primary key.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Whether a unique constraint covers this column alone.
    #[serde(default)]
    pub is_unique: bool,
    /// Referenced column, if this is a foreign key.
    #[serde(default)]
    pub foreign_key: Option<ForeignKeyRef>,
    /// Name of an index covering this column.
    #[serde(default)]
    pub index_name: Option<String>,
}

impl ColumnInfo {
    /// Creates a nullable, non-key column.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: None,
            sql_type: sql_type.into(),
            nullable: true,
            is_primary_key: false,
            is_unique: false,
            foreign_key: None,
            index_name: None,
        }
    }

    /// Marks the column as the primary key (implies NOT NULL and unique).
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_unique = true;
        self.nullable = false;
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Sets the logical field name mapped onto this column.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Declares a foreign key to `table.column`.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// Sets the covering index name.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Whether this column answers to the given logical or physical name.
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        self.field.as_deref() == Some(name) || self.name == name
    }
}

/// Returns the primary key column of a column list, if declared.
#[must_use]
pub fn primary_key_of(columns: &[ColumnInfo]) -> Option<&ColumnInfo> {
    columns.iter().find(|c| c.is_primary_key)
}
