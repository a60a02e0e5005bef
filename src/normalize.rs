//! Join-key normalization and name cleanup.
//!
//! Keys produced here are only ever used for matching; displayed and stored values
//! keep their original spelling.

use std::sync::OnceLock;

use regex::Regex;

use crate::data::Value;

static NUMERIC_PREFIX: OnceLock<Regex> = OnceLock::new();

fn numeric_prefix() -> &'static Regex {
    NUMERIC_PREFIX.get_or_init(|| {
        Regex::new(r"^(?:\d+\s*-?\s*)+").unwrap_or_else(|err| panic!("numeric prefix regex: {err}"))
    })
}

/// Code keys: text form, trimmed, case preserved.
pub fn normalize_code(value: &Value) -> String {
    match value {
        Value::Empty => String::new(),
        Value::Text(s) => s.trim().to_string(),
        other => other.as_display().trim().to_string(),
    }
}

/// Name keys: text form, trimmed and lower-cased.
pub fn normalize_name(value: &Value) -> String {
    normalize_code(value).to_lowercase()
}

/// Removes a leading identifier such as `"123 - "` from a professional name.
///
/// Stacked prefixes (`"12 - 34 Ana"`) are removed together, so the result never starts
/// with another strippable prefix.
pub fn strip_leading_numeric_prefix(value: &str) -> String {
    numeric_prefix()
        .replace(value.trim_start(), "")
        .trim()
        .to_string()
}
