//! Result rows.
//!
//! A [`Row`] is an owned keyed record. The relation resolver attaches related
//! data to rows in place, so a cell is either a scalar, one nested row, or a
//! list of rows.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::Serialize;

use crate::value::SqlValue;

/// One cell of a [`Row`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL, or an absent single relation.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    Text(String),
    /// Binary data.
    Blob(Vec<u8>),
    /// An attached single related row.
    One(Box<Row>),
    /// Attached related rows.
    Many(Vec<Row>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload, accepting integer-looking text.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns the text payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the attached single row.
    #[must_use]
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Self::One(row) => Some(row),
            _ => None,
        }
    }

    /// Returns the attached rows.
    #[must_use]
    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            Self::Many(rows) => Some(rows),
            _ => None,
        }
    }

    /// Whether an attached relation value holds anything.
    ///
    /// Null, an empty list and a zero count are empty; every other value is not.
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Many(rows) => !rows.is_empty(),
            Self::Int(n) => *n != 0,
            _ => true,
        }
    }

    /// Converts a scalar cell into a SQL value. Attached relations have none.
    #[must_use]
    pub fn to_sql_value(&self) -> Option<SqlValue> {
        match self {
            Self::Null => Some(SqlValue::Null),
            Self::Bool(b) => Some(SqlValue::Bool(*b)),
            Self::Int(n) => Some(SqlValue::Int(*n)),
            Self::Float(f) => Some(SqlValue::Float(*f)),
            Self::Text(s) => Some(SqlValue::Text(s.clone())),
            Self::Blob(b) => Some(SqlValue::Blob(b.clone())),
            Self::One(_) | Self::Many(_) => None,
        }
    }

    /// The normalized join key of a scalar cell. NULL and relations have none.
    #[must_use]
    pub fn key(&self) -> Option<RowKey> {
        match self {
            Self::Null | Self::One(_) | Self::Many(_) => None,
            Self::Bool(b) => Some(RowKey::Int(i64::from(*b))),
            Self::Int(n) => Some(RowKey::Int(*n)),
            #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
            Self::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.0e15 {
                    Some(RowKey::Int(*f as i64))
                } else {
                    Some(RowKey::Text(f.to_string()))
                }
            }
            Self::Text(s) => match s.parse::<i64>() {
                Ok(n) if n.to_string() == *s => Some(RowKey::Int(n)),
                _ => Some(RowKey::Text(s.clone())),
            },
            Self::Blob(b) => Some(RowKey::Bytes(b.clone())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Self::One(_) => write!(f, "<row>"),
            Self::Many(rows) => write!(f, "<{} rows>", rows.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl From<Row> for Value {
    fn from(row: Row) -> Self {
        Self::One(Box::new(row))
    }
}

impl From<Vec<Row>> for Value {
    fn from(rows: Vec<Row>) -> Self {
        Self::Many(rows)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A hashable, normalized key used to match parent and child rows.
///
/// Integers and canonical integer text compare equal, so a `TEXT` foreign key
/// holding `"7"` matches an `INTEGER` primary key `7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    /// Integer key.
    Int(i64),
    /// Text key.
    Text(String),
    /// Binary key.
    Bytes(Vec<u8>),
}

impl RowKey {
    /// Renders the key as a SQL literal.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Int(n) => SqlValue::Int(*n).to_sql_inline(),
            Self::Text(s) => SqlValue::Text(s.clone()).to_sql_inline(),
            Self::Bytes(b) => SqlValue::Blob(b.clone()).to_sql_inline(),
        }
    }
}

/// An owned keyed record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Whether `key` is present (even if NULL).
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Stores a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Builder-style [`Row::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates cells in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Iterates keys in order.
    pub fn keys(&self) -> btree_map::Keys<'_, String, Value> {
        self.fields.keys()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalizes_integer_text() {
        assert_eq!(Value::from("7").key(), Value::from(7_i64).key());
        assert_eq!(Value::from("07").key(), Some(RowKey::Text("07".into())));
        assert_eq!(Value::Float(3.0).key(), Some(RowKey::Int(3)));
        assert_eq!(Value::Null.key(), None);
    }

    #[test]
    fn test_is_present() {
        assert!(!Value::Null.is_present());
        assert!(!Value::Many(vec![]).is_present());
        assert!(!Value::Int(0).is_present());
        assert!(Value::Int(2).is_present());
        assert!(Value::from(Row::new()).is_present());
    }

    #[test]
    fn test_row_from_iter_and_insert() {
        let mut row: Row = [("id", Value::from(1_i64)), ("name", "ada".into())]
            .into_iter()
            .collect();
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        row.insert("posts", Vec::<Row>::new());
        assert_eq!(row.get("posts").and_then(Value::as_rows).map(<[Row]>::len), Some(0));
        assert!(row.contains_key("name"));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_serialize_nested_row() {
        let row = Row::new()
            .with("id", 1_i64)
            .with("author", Row::new().with("id", 5_i64))
            .with("tags", Vec::<Row>::new())
            .with("deleted_at", Value::Null);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"author":{"id":5},"deleted_at":null,"id":1,"tags":[]}"#
        );
    }

    #[test]
    fn test_row_key_literal() {
        assert_eq!(RowKey::Int(4).to_sql_inline(), "4");
        assert_eq!(RowKey::Text("a'b".into()).to_sql_inline(), "'a''b'");
    }
}
