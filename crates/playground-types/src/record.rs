//! Mapping between models and flat store hashes.
//!
//! The shared store keeps every record as a hash of string fields. Each model
//! lists its own fields explicitly in [`HashRecord`]; [`Fields`] parses them
//! back, falling back to the type's default for missing or malformed values
//! so that records written by older deployments still load.

use std::collections::HashMap;
use std::str::FromStr;

/// A model stored as one hash in the shared store.
pub trait HashRecord: Sized {
    /// Flatten the model into `(field, value)` pairs.
    ///
    /// The record's id is never a field: it is part of the key.
    fn to_fields(&self) -> Vec<(String, String)>;

    /// Rebuild the model from the hash stored under the key for `id`.
    fn from_fields(id: &str, fields: &HashMap<String, String>) -> Self;
}

/// Read-only view over a stored hash with lenient typed accessors.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a>(pub &'a HashMap<String, String>);

impl Fields<'_> {
    /// String field, empty when absent.
    pub fn string(&self, name: &str) -> String {
        self.0.get(name).cloned().unwrap_or_default()
    }

    /// String field with an explicit fallback.
    pub fn string_or(&self, name: &str, fallback: &str) -> String {
        self.0
            .get(name)
            .filter(|v| !v.is_empty())
            .map_or_else(|| fallback.to_owned(), Clone::clone)
    }

    /// Parsed numeric field, or `T::default()`.
    pub fn number<T: FromStr + Default>(&self, name: &str) -> T {
        self.0
            .get(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }

    /// Parsed float field with an explicit fallback.
    pub fn float_or(&self, name: &str, fallback: f64) -> f64 {
        self.0
            .get(name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(fallback)
    }

    /// Boolean field. Accepts `1`/`0` and `true`/`false`.
    pub fn flag(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|v| parse_flag(v))
    }
}

/// Parse a stored boolean.
pub fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "true" | "TRUE" | "True")
}

/// Encode a boolean the way the store expects it.
pub fn flag(value: bool) -> String {
    if value { "1".to_owned() } else { "0".to_owned() }
}

/// Build a `(field, value)` pair.
pub fn field(name: &str, value: impl ToString) -> (String, String) {
    (name.to_owned(), value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn lenient_accessors_fall_back_to_defaults() {
        let stored = hash(&[("x", "0.25"), ("gradYear", "oops"), ("flag", "1")]);
        let fields = Fields(&stored);
        assert!((fields.float_or("x", 0.5) - 0.25).abs() < f64::EPSILON);
        assert!((fields.float_or("y", 0.5) - 0.5).abs() < f64::EPSILON);
        assert_eq!(fields.number::<i32>("gradYear"), 0);
        assert!(fields.flag("flag"));
        assert!(!fields.flag("missing"));
        assert_eq!(fields.string_or("room", "home"), "home");
    }

    #[test]
    fn flags_accept_both_encodings() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("false"));
        assert_eq!(flag(true), "1");
    }
}
