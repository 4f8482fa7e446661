//! Identifier rendering for the targeted dialect (SQLite).
//!
//! Only one dialect is supported, so these are plain functions rather than a
//! trait.

use crate::naming::{split_marker, Marker};

/// The identifier quote character.
pub const IDENTIFIER_QUOTE: char = '"';

/// Quotes an identifier, doubling embedded quote characters.
///
/// `$raw:` names are returned verbatim without their marker.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let (marker, bare) = split_marker(name);
    if marker == Marker::Raw {
        return bare.to_string();
    }
    if bare == "*" {
        return String::from("*");
    }
    let escaped = bare.replace(IDENTIFIER_QUOTE, "\"\"");
    format!("{IDENTIFIER_QUOTE}{escaped}{IDENTIFIER_QUOTE}")
}

/// Renders `"table"."column"`.
#[must_use]
pub fn qualify(table: &str, column: &str) -> String {
    format!("{}.{}", quote_identifier(table), quote_identifier(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_identifier("*"), "*");
    }

    #[test]
    fn test_raw_identifier_is_not_quoted() {
        assert_eq!(quote_identifier("$raw:COUNT(*)"), "COUNT(*)");
    }

    #[test]
    fn test_freeze_identifier_is_quoted() {
        assert_eq!(quote_identifier("$freeze:userId"), "\"userId\"");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("users", "id"), "\"users\".\"id\"");
        assert_eq!(qualify("users", "*"), "\"users\".*");
    }
}
