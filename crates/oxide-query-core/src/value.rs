//! SQL literal values and their escaping.
//!
//! Query text is rendered with inline literals, so every value a caller hands
//! to the engine goes through [`SqlValue::to_sql_inline`] before it reaches
//! SQL text. Values wrapped with [`SqlValue::raw`] are the one exception: they
//! pass through unescaped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};

/// Datetime literal format of the targeted dialect.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A SQL value that can be rendered as a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value, rendered as `0`/`1`.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Timestamp without zone, rendered in [`DATETIME_FORMAT`].
    DateTime(NaiveDateTime),
    /// Pre-rendered SQL that is emitted verbatim.
    Raw(String),
}

impl SqlValue {
    /// Wraps SQL text that must reach the statement unescaped,
    /// e.g. `CURRENT_TIMESTAMP` or `"posts"."views" + 1`.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Returns `true` for [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the escaped SQL literal for this value.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => {
                if f.is_finite() {
                    format!("{f}")
                } else {
                    String::from("NULL")
                }
            }
            Self::Text(s) => quote_text(s),
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
            Self::DateTime(dt) => quote_text(&dt.format(DATETIME_FORMAT).to_string()),
            Self::Raw(sql) => sql.clone(),
        }
    }
}

fn quote_text(s: &str) -> String {
    let escaped = s.replace('\'', "''");
    format!("'{escaped}'")
}

/// Conversion of Rust values into [`SqlValue`]s, used wherever a caller
/// passes a value into a filter, an assignment or an inserted row.
pub trait ToSqlValue {
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for &SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self.clone()
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! impl_to_sql_int {
    ($($ty:ty),+) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )+
    };
}

impl_to_sql_int!(i64, i32, i16, i8, u32, u16, u8);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for &String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::DateTime(self)
    }
}

impl ToSqlValue for NaiveDate {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.format("%Y-%m-%d").to_string())
    }
}

impl<Tz: TimeZone> ToSqlValue for DateTime<Tz> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::DateTime(self.naive_utc())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        self.map_or(SqlValue::Null, ToSqlValue::to_sql_value)
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_is_numeric() {
        assert_eq!(SqlValue::Bool(true).to_sql_inline(), "1");
        assert_eq!(false.to_sql_value().to_sql_inline(), "0");
    }

    #[test]
    fn test_quotes_are_doubled() {
        assert_eq!("it's".to_sql_value().to_sql_inline(), "'it''s'");
        assert_eq!(
            "x'); DELETE FROM posts; --".to_sql_value().to_sql_inline(),
            "'x''); DELETE FROM posts; --'"
        );
    }

    #[test]
    fn test_datetime_literal() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(7, 5, 0))
            .unwrap();
        assert_eq!(dt.to_sql_value().to_sql_inline(), "'2024-03-09 07:05:00'");
    }

    #[test]
    fn test_raw_passes_through() {
        assert_eq!(
            SqlValue::raw("CURRENT_TIMESTAMP").to_sql_inline(),
            "CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_blob_is_hex() {
        assert_eq!(vec![0x0A_u8, 0xFF].to_sql_value().to_sql_inline(), "X'0AFF'");
    }

    #[test]
    fn test_non_finite_float_renders_null() {
        assert_eq!(SqlValue::Float(f64::NAN).to_sql_inline(), "NULL");
        assert_eq!(SqlValue::Float(1.5).to_sql_inline(), "1.5");
    }

    #[test]
    fn test_options_and_integers() {
        assert_eq!(7_u16.to_sql_value(), SqlValue::Int(7));
        assert_eq!(None::<&str>.to_sql_value(), SqlValue::Null);
        assert_eq!(Some(3_i64).to_sql_value().to_sql_inline(), "3");
    }
}
