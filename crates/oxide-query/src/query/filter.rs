//! Composable filters.
//!
//! A [`Q`] is a small expression tree over logical field names. It becomes
//! SQL only when rendered against a [`Model`]: fields go through the model's
//! naming pattern and are qualified with its table, values become escaped
//! literals.

use oxide_query_core::{SqlValue, ToSqlValue};

use crate::model::Model;

/// A filter that combines with AND, OR and NOT.
///
/// # Example
///
/// ```
/// use oxide_query::{Model, Q};
///
/// let users = Model::new("User", "users");
/// let q = Q::eq("status", "active").and(Q::gt("age", 18).or(Q::eq("verified", true)));
/// assert_eq!(
///     q.render(&users),
///     r#""users"."status" = 'active' AND ("users"."age" > 18 OR "users"."verified" = 1)"#
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Q {
    node: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Compare {
        field: String,
        op: CompareOp,
        value: SqlValue,
    },
    Columns {
        left: String,
        op: CompareOp,
        right: String,
    },
    Null {
        field: String,
        negated: bool,
    },
    Set {
        field: String,
        values: Vec<SqlValue>,
        negated: bool,
    },
    Like {
        field: String,
        pattern: String,
    },
    Between {
        field: String,
        low: SqlValue,
        high: SqlValue,
    },
    All(Vec<Node>),
    Any(Vec<Node>),
    Not(Box<Node>),
    Raw {
        sql: String,
        params: Vec<SqlValue>,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl CompareOp {
    /// The SQL operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

impl Q {
    const fn from_node(node: Node) -> Self {
        Self { node }
    }

    fn compare<V: ToSqlValue>(field: &str, op: CompareOp, value: V) -> Self {
        Self::from_node(Node::Compare {
            field: field.to_string(),
            op,
            value: value.to_sql_value(),
        })
    }

    /// `field = value`; a NULL value renders as `IS NULL`.
    pub fn eq<V: ToSqlValue>(field: &str, value: V) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// `field != value`; a NULL value renders as `IS NOT NULL`.
    pub fn ne<V: ToSqlValue>(field: &str, value: V) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// `field > value`
    pub fn gt<V: ToSqlValue>(field: &str, value: V) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// `field >= value`
    pub fn gte<V: ToSqlValue>(field: &str, value: V) -> Self {
        Self::compare(field, CompareOp::Gte, value)
    }

    /// `field < value`
    pub fn lt<V: ToSqlValue>(field: &str, value: V) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// `field <= value`
    pub fn lte<V: ToSqlValue>(field: &str, value: V) -> Self {
        Self::compare(field, CompareOp::Lte, value)
    }

    /// Compares two columns. Either side may be a `table.field` reference.
    pub fn columns(left: &str, op: CompareOp, right: &str) -> Self {
        Self::from_node(Node::Columns {
            left: left.to_string(),
            op,
            right: right.to_string(),
        })
    }

    /// `field IS NULL`
    pub fn is_null(field: &str) -> Self {
        Self::from_node(Node::Null {
            field: field.to_string(),
            negated: false,
        })
    }

    /// `field IS NOT NULL`
    pub fn is_not_null(field: &str) -> Self {
        Self::from_node(Node::Null {
            field: field.to_string(),
            negated: true,
        })
    }

    /// `field IN (...)`; an empty list matches nothing.
    pub fn in_list<V: ToSqlValue>(field: &str, values: Vec<V>) -> Self {
        Self::from_node(Node::Set {
            field: field.to_string(),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
            negated: false,
        })
    }

    /// `field NOT IN (...)`; an empty list matches everything.
    pub fn not_in_list<V: ToSqlValue>(field: &str, values: Vec<V>) -> Self {
        Self::from_node(Node::Set {
            field: field.to_string(),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
            negated: true,
        })
    }

    /// `field LIKE pattern`, with `%` and `_` wildcards.
    pub fn like(field: &str, pattern: &str) -> Self {
        Self::from_node(Node::Like {
            field: field.to_string(),
            pattern: pattern.to_string(),
        })
    }

    /// `field LIKE '%value%'`
    pub fn contains(field: &str, value: &str) -> Self {
        Self::like(field, &format!("%{value}%"))
    }

    /// `field LIKE 'value%'`
    pub fn startswith(field: &str, value: &str) -> Self {
        Self::like(field, &format!("{value}%"))
    }

    /// `field LIKE '%value'`
    pub fn endswith(field: &str, value: &str) -> Self {
        Self::like(field, &format!("%{value}"))
    }

    /// `field BETWEEN low AND high`, bounds included.
    pub fn between<V: ToSqlValue>(field: &str, low: V, high: V) -> Self {
        Self::from_node(Node::Between {
            field: field.to_string(),
            low: low.to_sql_value(),
            high: high.to_sql_value(),
        })
    }

    /// A raw condition. Each `?` takes the escaped literal of the next
    /// parameter; surplus placeholders stay as they are.
    pub fn raw(sql: &str, params: Vec<SqlValue>) -> Self {
        Self::from_node(Node::Raw {
            sql: sql.to_string(),
            params,
        })
    }

    /// Every filter must hold; true when empty.
    pub fn all(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::from_node(Node::All(filters.into_iter().map(|q| q.node).collect()))
    }

    /// At least one filter must hold; false when empty.
    pub fn any(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::from_node(Node::Any(filters.into_iter().map(|q| q.node).collect()))
    }

    /// Combines with `AND`. Nested `AND` groups are flattened.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let mut parts = match self.node {
            Node::All(parts) => parts,
            node => vec![node],
        };
        match other.node {
            Node::All(more) => parts.extend(more),
            node => parts.push(node),
        }
        Self::from_node(Node::All(parts))
    }

    /// Combines with `OR`. Nested `OR` groups are flattened.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        let mut parts = match self.node {
            Node::Any(parts) => parts,
            node => vec![node],
        };
        match other.node {
            Node::Any(more) => parts.extend(more),
            node => parts.push(node),
        }
        Self::from_node(Node::Any(parts))
    }

    /// Negates the filter.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::from_node(Node::Not(Box::new(self.node)))
    }

    /// Renders the filter against a model's columns.
    #[must_use]
    pub fn render(&self, model: &Model) -> String {
        self.node.render(model)
    }
}

impl Node {
    fn needs_parens(&self) -> bool {
        match self {
            Self::All(parts) | Self::Any(parts) => parts.len() > 1,
            Self::Raw { .. } => true,
            _ => false,
        }
    }

    fn render(&self, model: &Model) -> String {
        match self {
            Self::Compare { field, op, value } => {
                let column = model.column(field);
                match (op, value.is_null()) {
                    (CompareOp::Eq, true) => format!("{column} IS NULL"),
                    (CompareOp::Ne, true) => format!("{column} IS NOT NULL"),
                    _ => format!("{column} {} {}", op.as_sql(), value.to_sql_inline()),
                }
            }
            Self::Columns { left, op, right } => format!(
                "{} {} {}",
                model.column(left),
                op.as_sql(),
                model.column(right)
            ),
            Self::Null { field, negated } => {
                let not = if *negated { "NOT " } else { "" };
                format!("{} IS {not}NULL", model.column(field))
            }
            Self::Set {
                field,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return String::from(if *negated { "1 = 1" } else { "0 = 1" });
                }
                let literals: Vec<String> = values.iter().map(SqlValue::to_sql_inline).collect();
                let not = if *negated { "NOT " } else { "" };
                format!("{} {not}IN ({})", model.column(field), literals.join(", "))
            }
            Self::Like { field, pattern } => format!(
                "{} LIKE {}",
                model.column(field),
                SqlValue::Text(pattern.clone()).to_sql_inline()
            ),
            Self::Between { field, low, high } => format!(
                "{} BETWEEN {} AND {}",
                model.column(field),
                low.to_sql_inline(),
                high.to_sql_inline()
            ),
            Self::All(parts) => join(parts, " AND ", "1 = 1", model),
            Self::Any(parts) => join(parts, " OR ", "0 = 1", model),
            Self::Not(inner) => format!("NOT ({})", inner.render(model)),
            Self::Raw { sql, params } => fill_placeholders(sql, params),
        }
    }
}

fn join(parts: &[Node], separator: &str, empty: &str, model: &Model) -> String {
    if let [only] = parts {
        return only.render(model);
    }
    if parts.is_empty() {
        return empty.to_string();
    }
    parts
        .iter()
        .map(|part| {
            let sql = part.render(model);
            if part.needs_parens() {
                format!("({sql})")
            } else {
                sql
            }
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn fill_placeholders(sql: &str, params: &[SqlValue]) -> String {
    let mut params = params.iter();
    let mut out = String::with_capacity(sql.len());
    for ch in sql.chars() {
        let param = if ch == '?' { params.next() } else { None };
        match param {
            Some(value) => out.push_str(&value.to_sql_inline()),
            None => out.push(ch),
        }
    }
    out
}
