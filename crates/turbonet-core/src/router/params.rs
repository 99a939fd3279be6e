//! Captured route parameters.

use crate::error::{NetError, NetResult};
use std::str::FromStr;

/// Parameters captured while resolving a dispatch key.
///
/// Built once per dispatch and handed to the handler read-only. Values are
/// stored as the literal segment text; typed accessors parse on access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    /// Create an empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw captured value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a parameter was captured under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Captured value parsed as `T`; `None` when missing or unparsable
    #[must_use]
    pub fn get_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    /// Captured value parsed as `T`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidRequest`](crate::ErrorKind::InvalidRequest)
    /// if the parameter is missing or does not parse.
    pub fn parse<T>(&self, name: &str) -> NetResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self
            .get(name)
            .ok_or_else(|| NetError::invalid_request(format!("Missing parameter '{}'", name)))?;
        raw.parse().map_err(|e| {
            NetError::invalid_request(format!("Invalid parameter '{}' = '{}': {}", name, raw, e))
        })
    }

    /// Integer accessor
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get_as(name)
    }

    /// Floating point accessor
    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get_as(name)
    }

    /// Boolean accessor; accepts `true/false`, `1/0`, `yes/no`, `on/off` in any case
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        let v = self.get(name)?;
        match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    /// Number of captured parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs in capture order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn sample() -> Params {
        [
            ("id", "42"),
            ("ratio", "0.5"),
            ("flag", "Yes"),
            ("name", "widget"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_typed_accessors() {
        let p = sample();
        assert_eq!(p.get("name"), Some("widget"));
        assert_eq!(p.get_i64("id"), Some(42));
        assert_eq!(p.get_f64("ratio"), Some(0.5));
        assert_eq!(p.get_bool("flag"), Some(true));
        assert_eq!(p.get_as::<u8>("id"), Some(42));
        assert_eq!(p.len(), 4);
    }

    #[test]
    fn test_accessors_on_bad_values() {
        let p = sample();
        assert_eq!(p.get_i64("name"), None);
        assert_eq!(p.get_bool("name"), None);
        assert_eq!(p.get("missing"), None);
        assert!(!p.contains("missing"));
    }

    #[test]
    fn test_parse_reports_invalid_request() {
        let p = sample();
        assert_eq!(p.parse::<u32>("id").unwrap(), 42);

        let err = p.parse::<u32>("name").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);

        let err = p.parse::<u32>("missing").unwrap_err();
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn test_iter_preserves_capture_order() {
        let params = sample();
        let names: Vec<_> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "ratio", "flag", "name"]);
    }
}
