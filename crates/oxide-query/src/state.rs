//! Per-query clause state.
//!
//! A [`QueryState`] accumulates rendered clause fragments in named slots.
//! Chained calls only ever append to a slot or overwrite a scalar; the only
//! way to shrink a slot is [`QueryState::unset`]. The compiler reads a state
//! but never writes it.
//!
//! Cloning is a deep copy: every fragment list is duplicated, so a clone can
//! be mutated freely without the source observing it. Sub-queries for
//! relation fetches are built this way.

use crate::relation::{RelationMode, ResolvedRelation};

/// A named clause slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// SELECT list, wildcard and DISTINCT.
    Select,
    /// JOIN clauses.
    Join,
    /// WHERE fragments.
    Where,
    /// GROUP BY list.
    GroupBy,
    /// HAVING fragments.
    Having,
    /// ORDER BY list.
    OrderBy,
    /// LIMIT.
    Limit,
    /// OFFSET.
    Offset,
    /// Requested relations.
    Relations,
    /// INSERT rows.
    Values,
    /// UPDATE assignments.
    Assignments,
}

impl Slot {
    /// Every slot.
    pub const ALL: [Self; 11] = [
        Self::Select,
        Self::Join,
        Self::Where,
        Self::GroupBy,
        Self::Having,
        Self::OrderBy,
        Self::Limit,
        Self::Offset,
        Self::Relations,
        Self::Values,
        Self::Assignments,
    ];
}

/// How a WHERE fragment joins the fragments before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl Connector {
    /// SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// A rendered WHERE condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereFragment {
    /// Connector to the previous fragment; ignored on the first one.
    pub connector: Connector,
    /// Rendered condition.
    pub sql: String,
}

/// Which soft-deleted rows a query sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Trashed {
    /// Soft-deleted rows are excluded.
    #[default]
    Exclude,
    /// Soft-deleted rows are included.
    Include,
    /// Only soft-deleted rows are returned.
    Only,
}

/// Execution flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryFlags {
    /// Soft-delete filtering is active for this model.
    pub soft_delete: bool,
    /// Visibility of soft-deleted rows.
    pub trashed: Trashed,
    /// The model's global scope is merged at compile time.
    pub global_scope: bool,
    /// The global scope's LIMIT replaces the query's. Off for batched
    /// relation fetches.
    pub scope_limit: bool,
    /// Statements are logged at `info` level.
    pub debug: bool,
    /// Statements are compiled and logged but never executed.
    pub void: bool,
}

impl Default for QueryFlags {
    fn default() -> Self {
        Self {
            soft_delete: false,
            trashed: Trashed::Exclude,
            global_scope: true,
            scope_limit: true,
            debug: false,
            void: false,
        }
    }
}

/// The mutable clause record behind one query.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    select: Vec<String>,
    wildcard: bool,
    distinct: bool,
    joins: Vec<String>,
    wheres: Vec<WhereFragment>,
    group_by: Vec<String>,
    having: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    relations: Vec<ResolvedRelation>,
    values: Vec<Vec<(String, String)>>,
    assignments: Vec<(String, String)>,
    flags: QueryFlags,
}

impl QueryState {
    /// Creates an empty state with the given flags.
    #[must_use]
    pub fn with_flags(flags: QueryFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Resets the named slots to their empty defaults.
    pub fn unset(&mut self, slots: &[Slot]) {
        for slot in slots {
            match slot {
                Slot::Select => {
                    self.select.clear();
                    self.wildcard = false;
                    self.distinct = false;
                }
                Slot::Join => self.joins.clear(),
                Slot::Where => self.wheres.clear(),
                Slot::GroupBy => self.group_by.clear(),
                Slot::Having => self.having.clear(),
                Slot::OrderBy => self.order_by.clear(),
                Slot::Limit => self.limit = None,
                Slot::Offset => self.offset = None,
                Slot::Relations => self.relations.clear(),
                Slot::Values => self.values.clear(),
                Slot::Assignments => self.assignments.clear(),
            }
        }
    }

    /// Whether a slot holds nothing.
    #[must_use]
    pub fn is_empty(&self, slot: Slot) -> bool {
        match slot {
            Slot::Select => self.select.is_empty() && !self.wildcard && !self.distinct,
            Slot::Join => self.joins.is_empty(),
            Slot::Where => self.wheres.is_empty(),
            Slot::GroupBy => self.group_by.is_empty(),
            Slot::Having => self.having.is_empty(),
            Slot::OrderBy => self.order_by.is_empty(),
            Slot::Limit => self.limit.is_none(),
            Slot::Offset => self.offset.is_none(),
            Slot::Relations => self.relations.is_empty(),
            Slot::Values => self.values.is_empty(),
            Slot::Assignments => self.assignments.is_empty(),
        }
    }

    /// SELECT fragments.
    #[must_use]
    pub fn select(&self) -> &[String] {
        &self.select
    }

    /// Appends a SELECT fragment, skipping exact duplicates.
    pub fn push_select(&mut self, fragment: String) {
        if !self.select.contains(&fragment) {
            self.select.push(fragment);
        }
    }

    /// Whether `table.*` was requested explicitly.
    #[must_use]
    pub const fn wildcard(&self) -> bool {
        self.wildcard
    }

    /// Requests `table.*`.
    pub fn set_wildcard(&mut self, wildcard: bool) {
        self.wildcard = wildcard;
    }

    /// Whether SELECT DISTINCT is used.
    #[must_use]
    pub const fn distinct(&self) -> bool {
        self.distinct
    }

    /// Sets SELECT DISTINCT.
    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    /// JOIN clauses.
    #[must_use]
    pub fn joins(&self) -> &[String] {
        &self.joins
    }

    /// Appends a JOIN clause.
    pub fn push_join(&mut self, clause: String) {
        self.joins.push(clause);
    }

    /// WHERE fragments.
    #[must_use]
    pub fn wheres(&self) -> &[WhereFragment] {
        &self.wheres
    }

    /// Appends a WHERE fragment.
    pub fn push_where(&mut self, connector: Connector, sql: String) {
        self.wheres.push(WhereFragment { connector, sql });
    }

    /// GROUP BY fragments.
    #[must_use]
    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    /// Appends a GROUP BY fragment.
    pub fn push_group_by(&mut self, fragment: String) {
        self.group_by.push(fragment);
    }

    /// HAVING fragments, joined with AND.
    #[must_use]
    pub fn having(&self) -> &[String] {
        &self.having
    }

    /// Appends a HAVING fragment.
    pub fn push_having(&mut self, fragment: String) {
        self.having.push(fragment);
    }

    /// ORDER BY fragments.
    #[must_use]
    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    /// Appends an ORDER BY fragment.
    pub fn push_order_by(&mut self, fragment: String) {
        self.order_by.push(fragment);
    }

    /// LIMIT.
    #[must_use]
    pub const fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Sets LIMIT.
    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }

    /// OFFSET.
    #[must_use]
    pub const fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Sets OFFSET.
    pub fn set_offset(&mut self, offset: Option<u64>) {
        self.offset = offset;
    }

    /// Requested relations.
    #[must_use]
    pub fn relations(&self) -> &[ResolvedRelation] {
        &self.relations
    }

    /// Appends a requested relation.
    pub fn push_relation(&mut self, relation: ResolvedRelation) {
        self.relations.push(relation);
    }

    /// Removes and returns the relation named `name` requested in `mode`.
    pub fn take_relation(&mut self, name: &str, mode: RelationMode) -> Option<ResolvedRelation> {
        let index = self
            .relations
            .iter()
            .position(|r| r.mode == mode && r.declaration.name == name)?;
        Some(self.relations.remove(index))
    }

    /// INSERT rows of `(quoted column, literal)` pairs.
    #[must_use]
    pub fn values(&self) -> &[Vec<(String, String)>] {
        &self.values
    }

    /// Appends an INSERT row.
    pub fn push_values(&mut self, row: Vec<(String, String)>) {
        self.values.push(row);
    }

    /// UPDATE assignments of `(quoted column, literal)` pairs.
    #[must_use]
    pub fn assignments(&self) -> &[(String, String)] {
        &self.assignments
    }

    /// Appends an UPDATE assignment, replacing an earlier one on the same column.
    pub fn push_assignment(&mut self, column: String, literal: String) {
        self.assignments.retain(|(c, _)| *c != column);
        self.assignments.push((column, literal));
    }

    /// Execution flags.
    #[must_use]
    pub const fn flags(&self) -> &QueryFlags {
        &self.flags
    }

    /// Mutable execution flags.
    pub fn flags_mut(&mut self) -> &mut QueryFlags {
        &mut self.flags
    }
}
