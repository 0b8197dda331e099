//! Tolerant parsers for service manager output.
//!
//! Output layouts drift between OS releases, so every parser here skips
//! what it does not recognise instead of failing.

pub mod disabled;
pub mod extensions;
pub mod list;
pub mod print;

pub use disabled::parse_disabled;
pub use extensions::{merge_most_active, parse_extensions};
pub use list::parse_list;
pub use print::{first_occurrence_wins, normalize_key, parse_print};

use regex::Regex;
use std::sync::LazyLock;

static SAFE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid label regex"));

/// Check that a label only uses alphanumerics, dot, hyphen and underscore.
pub fn is_safe_label(label: &str) -> bool {
    SAFE_LABEL.is_match(label)
}

/// Parse a numeric column. `-` or empty is absent, `0x` is hex.
///
/// Returns `Err(())` when the field is present but not a number.
pub(crate) fn parse_number(field: &str) -> Result<Option<i64>, ()> {
    let field = field.trim();
    if field.is_empty() || field == "-" {
        return Ok(None);
    }
    let (negative, digits) = match field.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, field),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).map_err(|_| ())?,
        None => digits.parse::<i64>().map_err(|_| ())?,
    };
    Ok(Some(if negative { -value } else { value }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_label() {
        assert!(is_safe_label("com.apple.syslogd"));
        assert!(is_safe_label("homebrew.mxcl.postgresql_14"));
        assert!(is_safe_label("application.com.example.App.1234.5678"));
        assert!(!is_safe_label(""));
        assert!(!is_safe_label("com.example;rm -rf"));
        assert!(!is_safe_label("has space"));
        assert!(!is_safe_label("quote\"d"));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("-"), Ok(None));
        assert_eq!(parse_number(""), Ok(None));
        assert_eq!(parse_number("1234"), Ok(Some(1234)));
        assert_eq!(parse_number("-9"), Ok(Some(-9)));
        assert_eq!(parse_number("0x4e"), Ok(Some(78)));
        assert_eq!(parse_number("0XFF"), Ok(Some(255)));
        assert_eq!(parse_number("abc"), Err(()));
        assert_eq!(parse_number("0xzz"), Err(()));
    }
}
