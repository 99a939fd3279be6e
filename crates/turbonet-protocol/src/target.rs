//! Request target parsing: `path?query#fragment`.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::collections::BTreeMap;
use std::fmt;

/// Characters left unescaped in query components
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A parsed request target.
///
/// The path is kept exactly as received so route segments line up with the
/// wire form. Query keys and values are form-decoded (`+` is a space).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    path: String,
    query: BTreeMap<String, String>,
    fragment: Option<String>,
}

impl Target {
    /// Parse a raw request target
    ///
    /// ```rust
    /// use turbonet_protocol::Target;
    ///
    /// let target = Target::parse("/search?q=hello+world&page=2#top");
    /// assert_eq!(target.path(), "/search");
    /// assert_eq!(target.query("q"), Some("hello world"));
    /// assert_eq!(target.query("page"), Some("2"));
    /// assert_eq!(target.fragment(), Some("top"));
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (rest, fragment) = match raw.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (raw, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (rest, BTreeMap::new()),
        };
        Self {
            path: path.to_string(),
            query,
            fragment,
        }
    }

    /// Request path
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded query value
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// All decoded query pairs
    #[must_use]
    pub fn queries(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Fragment after `#`
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Add or replace a query pair
    pub fn push_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.insert(key.into(), value.into());
    }
}

impl From<&str> for Target {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (idx, (key, value)) in self.query.iter().enumerate() {
            let sep = if idx == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, encode(key), encode(value))?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

/// Parse `a=1&b&c=x+y` into a map; a bare key maps to the empty string.
fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|slice| !slice.is_empty())
        .map(|slice| match slice.split_once('=') {
            Some((key, value)) => (decode(key), decode(value)),
            None => (decode(slice), String::new()),
        })
        .collect()
}

/// Form-decode a query component
#[must_use]
pub fn decode(input: &str) -> String {
    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Form-encode a query component
#[must_use]
pub fn encode(input: &str) -> String {
    input
        .split(' ')
        .map(|part| utf8_percent_encode(part, QUERY_COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_path_only() {
        let target = Target::parse("/hello-world");
        assert_eq!(target.path(), "/hello-world");
        assert!(target.queries().is_empty());
        assert_eq!(target.fragment(), None);
    }

    #[test]
    fn test_query_edge_cases() {
        let target = Target::parse("/q?flag&&name=a%20b&empty=&x=1=2");
        assert_eq!(target.query("flag"), Some(""));
        assert_eq!(target.query("name"), Some("a b"));
        assert_eq!(target.query("empty"), Some(""));
        assert_eq!(target.query("x"), Some("1=2"));
        assert_eq!(target.queries().len(), 4);
    }

    #[test]
    fn test_fragment_without_query() {
        let target = Target::parse("/doc#section");
        assert_eq!(target.path(), "/doc");
        assert_eq!(target.fragment(), Some("section"));
    }

    #[test]
    fn test_display_reencodes() {
        let mut target = Target::parse("/search");
        target.push_query("q", "rust lang");
        target.push_query("tag", "a&b");
        assert_eq!(target.to_string(), "/search?q=rust+lang&tag=a%26b");
        assert_eq!(Target::parse(&target.to_string()), target);
    }

    #[test]
    fn test_encode_decode() {
        assert_eq!(encode("a b~c"), "a+b~c");
        assert_eq!(decode("a+b%7Ec"), "a b~c");
        assert_eq!(decode("%E2%9C%93"), "\u{2713}");
    }

    proptest::proptest! {
        #[test]
        fn prop_query_component_survives_encoding(value in "\\PC*") {
            proptest::prop_assert_eq!(decode(&encode(&value)), value);
        }

        #[test]
        fn prop_path_stops_at_query(path in "(/[a-z0-9{}-]{1,8}){1,4}", key in "[a-z]{1,6}") {
            let target = Target::parse(&format!("{}?{}=1", path, key));
            proptest::prop_assert_eq!(target.path(), path.as_str());
            proptest::prop_assert_eq!(target.query(&key), Some("1"));
        }
    }
}
