//! Relation declarations and their resolution.
//!
//! A [`RelationDeclaration`] is registered once per model in the
//! [`Registry`](crate::Registry). Requesting it on a query produces a
//! [`ResolvedRelation`]: the declaration with its keys inferred, a live
//! sub-query against the target model and the mode it was requested in.
//!
//! Load and count modes are executed by the loader after the parent rows are
//! fetched, one batched query per relation (two through a pivot table).
//! Exists modes never fetch anything: they are lowered into a correlated
//! `EXISTS` predicate on the parent query.

pub(crate) mod exists;
pub(crate) mod loader;
pub(crate) mod registry;

use std::sync::Arc;

use crate::model::Model;
use crate::queryset::QuerySet;

pub use registry::RelationRegistry;

/// The four relation shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// One related row holding the owner's key.
    HasOne,
    /// Many related rows holding the owner's key.
    HasMany,
    /// The owner holds the related row's key.
    BelongsTo,
    /// Related rows linked through a pivot table.
    BelongsToMany,
}

impl RelationKind {
    /// Whether at most one related row is attached.
    #[must_use]
    pub const fn is_one(self) -> bool {
        matches!(self, Self::HasOne | Self::BelongsTo)
    }
}

/// A named relation on a model.
///
/// Keys left unset are inferred from table names and primary keys when the
/// relation is resolved.
///
/// # Example
///
/// ```
/// use oxide_query::relation::{RelationDeclaration, RelationKind};
///
/// let subscribers = RelationDeclaration::belongs_to_many("subscribers", "User")
///     .pivot_table("post_subscriber")
///     .pivot_foreign_key("user_id");
/// assert_eq!(subscribers.kind, RelationKind::BelongsToMany);
/// assert_eq!(subscribers.attach_key(), "subscribers");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDeclaration {
    /// Relation name, used to request it.
    pub name: String,
    /// Shape.
    pub kind: RelationKind,
    /// Registered name of the target model.
    pub target: String,
    /// Owner-side key (see the key inference rules per shape).
    pub local_key: Option<String>,
    /// Target-side key.
    pub foreign_key: Option<String>,
    /// Pivot table name.
    pub pivot_table: Option<String>,
    /// Registered name of a model describing the pivot table.
    pub pivot_model: Option<String>,
    /// Pivot column holding the target's key.
    pub pivot_foreign_key: Option<String>,
    /// Key the related data is attached under instead of `name`.
    pub alias: Option<String>,
    /// Attach one row (or null) instead of a list for a many-to-many relation.
    pub single: bool,
}

impl RelationDeclaration {
    fn new(name: &str, kind: RelationKind, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            target: target.to_string(),
            local_key: None,
            foreign_key: None,
            pivot_table: None,
            pivot_model: None,
            pivot_foreign_key: None,
            alias: None,
            single: false,
        }
    }

    /// One target row whose foreign key points at the owner.
    #[must_use]
    pub fn has_one(name: &str, target: &str) -> Self {
        Self::new(name, RelationKind::HasOne, target)
    }

    /// Target rows whose foreign key points at the owner.
    #[must_use]
    pub fn has_many(name: &str, target: &str) -> Self {
        Self::new(name, RelationKind::HasMany, target)
    }

    /// The target row the owner's foreign key points at.
    #[must_use]
    pub fn belongs_to(name: &str, target: &str) -> Self {
        Self::new(name, RelationKind::BelongsTo, target)
    }

    /// Target rows linked to the owner through a pivot table.
    #[must_use]
    pub fn belongs_to_many(name: &str, target: &str) -> Self {
        Self::new(name, RelationKind::BelongsToMany, target)
    }

    /// Sets the owner-side key.
    #[must_use]
    pub fn local_key(mut self, key: &str) -> Self {
        self.local_key = Some(key.to_string());
        self
    }

    /// Sets the target-side key.
    #[must_use]
    pub fn foreign_key(mut self, key: &str) -> Self {
        self.foreign_key = Some(key.to_string());
        self
    }

    /// Sets the pivot table.
    #[must_use]
    pub fn pivot_table(mut self, table: &str) -> Self {
        self.pivot_table = Some(table.to_string());
        self
    }

    /// Uses a registered model for the pivot table.
    #[must_use]
    pub fn pivot_model(mut self, model: &str) -> Self {
        self.pivot_model = Some(model.to_string());
        self
    }

    /// Sets the pivot column holding the target's key.
    #[must_use]
    pub fn pivot_foreign_key(mut self, key: &str) -> Self {
        self.pivot_foreign_key = Some(key.to_string());
        self
    }

    /// Attaches related data under `alias`.
    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Attaches one row or null instead of a list.
    #[must_use]
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// The row key related data is attached under.
    #[must_use]
    pub fn attach_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Whether one row (or null) is attached rather than a list.
    #[must_use]
    pub const fn attaches_one(&self) -> bool {
        self.kind.is_one() || (matches!(self.kind, RelationKind::BelongsToMany) && self.single)
    }
}

/// How a requested relation is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationMode {
    /// Fetch and attach related rows.
    #[default]
    Load,
    /// Attach the number of related rows.
    Count,
    /// Keep parents that have a related row.
    Exists,
    /// Keep parents that have no related row.
    NotExists,
}

impl RelationMode {
    /// Whether the relation is lowered into a WHERE predicate.
    #[must_use]
    pub const fn is_existence(self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }
}

/// Options for requesting a relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationOptions {
    /// Mode.
    pub mode: RelationMode,
    /// Include soft-deleted related rows.
    pub trashed: bool,
    /// Include soft-deleted related rows and skip the target's global scope.
    pub all: bool,
}

impl RelationOptions {
    /// Options for the given mode.
    #[must_use]
    pub const fn mode(mode: RelationMode) -> Self {
        Self {
            mode,
            trashed: false,
            all: false,
        }
    }

    /// Includes soft-deleted related rows.
    #[must_use]
    pub const fn trashed(mut self) -> Self {
        self.trashed = true;
        self
    }

    /// Includes every related row, bypassing soft delete and global scope.
    #[must_use]
    pub const fn all(mut self) -> Self {
        self.all = true;
        self
    }

    /// Options for the segments nested below a dotted path head.
    pub(crate) const fn nested(self) -> Self {
        let mode = match self.mode {
            RelationMode::NotExists => RelationMode::Exists,
            other => other,
        };
        Self { mode, ..self }
    }
}

/// Pivot side of a many-to-many relation.
#[derive(Debug, Clone)]
pub struct PivotKeys {
    /// Model over the pivot table.
    pub model: Arc<Model>,
    /// Pivot column holding the owner's key.
    pub local_column: String,
    /// Pivot column holding the target's key.
    pub foreign_column: String,
}

/// Physical key columns of a resolved relation.
///
/// Parents are matched on `local_key` (a column of the owner). Children are
/// matched on `foreign_key` (a column of the target). Through a pivot, the
/// pivot's `local_column` is matched against the owner and its
/// `foreign_column` against the target.
#[derive(Debug, Clone)]
pub struct RelationKeys {
    /// Owner column.
    pub local_key: String,
    /// Target column.
    pub foreign_key: String,
    /// Pivot table, for many-to-many relations.
    pub pivot: Option<PivotKeys>,
}

/// A relation requested on one query.
#[derive(Debug, Clone)]
pub struct ResolvedRelation {
    /// The declaration this was resolved from.
    pub declaration: RelationDeclaration,
    /// Owning model.
    pub owner: Arc<Model>,
    /// Target model.
    pub target: Arc<Model>,
    /// Inferred or declared keys.
    pub keys: RelationKeys,
    /// Sub-query over the target; nested relations live in its state.
    pub query: QuerySet,
    /// Requested mode.
    pub mode: RelationMode,
    /// Soft-deleted related rows are included.
    pub trashed: bool,
    /// Soft delete and global scope are bypassed.
    pub all: bool,
}

impl ResolvedRelation {
    /// The row key results are attached under.
    #[must_use]
    pub fn attach_key(&self) -> &str {
        self.declaration.attach_key()
    }

    /// A query over the pivot table honoring the relation's `trashed` and
    /// `all` options. Both the eager and the existence path start from it.
    pub(crate) fn pivot_query(&self, pivot: &PivotKeys) -> QuerySet {
        let mut query = QuerySet::new(self.query.registry.clone(), pivot.model.clone());
        if self.trashed || self.all {
            query = query.with_trashed();
        }
        if self.all {
            query = query.without_global_scope();
        }
        query.state_mut().flags_mut().scope_limit = false;
        query
    }
}
