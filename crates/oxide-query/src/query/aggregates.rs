//! Aggregate functions.
//!
//! Relation count mode renders [`Aggregate::count_all`]; every aggregate
//! backs [`QuerySet::aggregate`](crate::QuerySet::aggregate).

use crate::model::Model;

/// An aggregate function over a model's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// COUNT aggregate
    Count {
        /// Field to count, or `None` for all rows
        field: Option<String>,
        /// Whether to count only distinct values
        distinct: bool,
    },
    /// SUM aggregate
    Sum(String),
    /// AVG aggregate
    Avg(String),
    /// MAX aggregate
    Max(String),
    /// MIN aggregate
    Min(String),
}

impl Aggregate {
    /// Creates a COUNT(*) aggregate.
    #[must_use]
    pub const fn count_all() -> Self {
        Self::Count {
            field: None,
            distinct: false,
        }
    }

    /// Creates a COUNT(field) aggregate.
    #[must_use]
    pub fn count(field: &str) -> Self {
        Self::Count {
            field: Some(field.to_string()),
            distinct: false,
        }
    }

    /// Creates a COUNT(DISTINCT field) aggregate.
    #[must_use]
    pub fn count_distinct(field: &str) -> Self {
        Self::Count {
            field: Some(field.to_string()),
            distinct: true,
        }
    }

    /// Creates a SUM(field) aggregate.
    #[must_use]
    pub fn sum(field: &str) -> Self {
        Self::Sum(field.to_string())
    }

    /// Creates an AVG(field) aggregate.
    #[must_use]
    pub fn avg(field: &str) -> Self {
        Self::Avg(field.to_string())
    }

    /// Creates a MAX(field) aggregate.
    #[must_use]
    pub fn max(field: &str) -> Self {
        Self::Max(field.to_string())
    }

    /// Creates a MIN(field) aggregate.
    #[must_use]
    pub fn min(field: &str) -> Self {
        Self::Min(field.to_string())
    }

    /// Renders the aggregate against a model's columns.
    #[must_use]
    pub fn to_sql(&self, model: &Model) -> String {
        match self {
            Self::Count { field: None, .. } => String::from("COUNT(*)"),
            Self::Count {
                field: Some(field),
                distinct: true,
            } => format!("COUNT(DISTINCT {})", model.column(field)),
            Self::Count {
                field: Some(field),
                distinct: false,
            } => format!("COUNT({})", model.column(field)),
            Self::Sum(field) => format!("SUM({})", model.column(field)),
            Self::Avg(field) => format!("AVG({})", model.column(field)),
            Self::Max(field) => format!("MAX({})", model.column(field)),
            Self::Min(field) => format!("MIN({})", model.column(field)),
        }
    }
}

/// Convenience function to create a COUNT(*) aggregate.
#[must_use]
pub const fn count_all() -> Aggregate {
    Aggregate::count_all()
}

/// Convenience function to create a SUM(field) aggregate.
#[must_use]
pub fn sum(field: &str) -> Aggregate {
    Aggregate::sum(field)
}

/// Convenience function to create an AVG(field) aggregate.
#[must_use]
pub fn avg(field: &str) -> Aggregate {
    Aggregate::avg(field)
}
