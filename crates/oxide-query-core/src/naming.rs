//! Logical-to-physical name translation.
//!
//! Every component that turns a field name into SQL text goes through
//! [`resolve`], so column rendering and relation key derivation always agree
//! on the physical spelling.
//!
//! Two prefixes bypass conversion:
//!
//! - `$raw:` marks a SQL expression. It is emitted verbatim, never quoted.
//! - `$freeze:` marks an identifier that must keep its exact spelling. It is
//!   still quoted like any other identifier.
//!
//! ```
//! use oxide_query_core::naming::{resolve, NamingPattern};
//!
//! assert_eq!(resolve("createdAt", NamingPattern::SnakeCase, None), "created_at");
//! assert_eq!(resolve("created_at", NamingPattern::CamelCase, None), "createdAt");
//! assert_eq!(resolve("$freeze:createdAt", NamingPattern::SnakeCase, None), "createdAt");
//! ```

use serde::{Deserialize, Serialize};

/// Prefix for names that are SQL expressions.
pub const RAW_MARKER: &str = "$raw:";

/// Prefix for identifiers that must not be converted.
pub const FREEZE_MARKER: &str = "$freeze:";

/// Casing convention mapping logical names to physical column names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamingPattern {
    /// Names are used unchanged.
    #[default]
    #[serde(rename = "verbatim")]
    Verbatim,
    /// `createdAt` becomes `created_at`.
    #[serde(rename = "snake_case")]
    SnakeCase,
    /// `created_at` becomes `createdAt`.
    #[serde(rename = "camelCase")]
    CamelCase,
}

/// How a name must be treated once its marker is stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// No marker: subject to pattern conversion.
    None,
    /// `$raw:` expression.
    Raw,
    /// `$freeze:` identifier.
    Freeze,
}

/// Splits the escape marker off a name.
#[must_use]
pub fn split_marker(name: &str) -> (Marker, &str) {
    if let Some(rest) = name.strip_prefix(RAW_MARKER) {
        (Marker::Raw, rest)
    } else if let Some(rest) = name.strip_prefix(FREEZE_MARKER) {
        (Marker::Freeze, rest)
    } else {
        (Marker::None, name)
    }
}

/// Wraps an identifier so that no pattern conversion is applied to it.
#[must_use]
pub fn freeze(name: &str) -> String {
    format!("{FREEZE_MARKER}{name}")
}

/// Wraps a SQL expression so that it is emitted verbatim.
#[must_use]
pub fn raw(sql: &str) -> String {
    format!("{RAW_MARKER}{sql}")
}

/// Resolves a logical name to its physical form.
///
/// An explicit physical name from the schema wins over pattern conversion.
/// Marked names lose their marker and are never converted.
#[must_use]
pub fn resolve(name: &str, pattern: NamingPattern, schema_override: Option<&str>) -> String {
    let (marker, bare) = split_marker(name);
    if marker != Marker::None {
        return bare.to_string();
    }
    if let Some(physical) = schema_override {
        return physical.to_string();
    }
    match pattern {
        NamingPattern::Verbatim => bare.to_string(),
        NamingPattern::SnakeCase => to_snake_case(bare),
        NamingPattern::CamelCase => to_camel_case(bare),
    }
}

/// Converts every uppercase boundary into `_` followed by the lowercase letter.
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Collapses `_`, `-` and space separated segments, upper-casing the letter
/// after each separator.
#[must_use]
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if matches!(ch, '_' | '-' | ' ') {
            // a leading separator is kept so `_private` stays distinguishable
            if out.is_empty() {
                out.push(ch);
            } else {
                upper_next = true;
            }
            continue;
        }
        if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Singular form of a table name, used for default key and pivot names.
///
/// Only the last `_`-separated word is inflected: `blog_posts` becomes
/// `blog_post`.
#[must_use]
pub fn singular(table: &str) -> String {
    match table.rsplit_once('_') {
        Some((head, last)) if !last.is_empty() => {
            format!("{head}_{}", pluralizer::pluralize(last, 1, false))
        }
        _ => pluralizer::pluralize(table, 1, false),
    }
}

/// Default foreign-key column for a table: `singular(table)_primaryKey`.
#[must_use]
pub fn foreign_key_for(table: &str, primary_key: &str, pattern: NamingPattern) -> String {
    let logical = format!("{}_{primary_key}", singular(table));
    resolve(&logical, pattern, None)
}

/// Default pivot table name: both tables singularized, sorted, joined by `_`.
#[must_use]
pub fn pivot_table_for(left: &str, right: &str) -> String {
    let mut names = [singular(left), singular(right)];
    names.sort();
    names.join("_")
}

/// The pivot name with the two singular names in reverse sorted order.
#[must_use]
pub fn reversed_pivot_table_for(left: &str, right: &str) -> String {
    let mut names = [singular(left), singular(right)];
    names.sort();
    names.reverse();
    names.join("_")
}
