//! Dispatch key construction and segment classification.

use crate::error::{NetError, NetResult};

/// Build the canonical dispatch key for a method and a path (or WebSocket id).
///
/// The path gets a trailing `/` if it lacks one and the method token is
/// appended as the final segment:
///
/// ```rust
/// use turbonet_core::concat;
///
/// assert_eq!(concat("GET", "/hello-world"), "/hello-world/GET");
/// assert_eq!(concat("GET", "/hello-world/"), "/hello-world/GET");
/// assert_eq!(concat("POST", "hello-world"), "hello-world/POST");
/// assert_eq!(concat("GET", ""), "/GET");
/// ```
#[must_use]
pub fn concat(method: &str, path: &str) -> String {
    let mut key = String::with_capacity(path.len() + method.len() + 1);
    key.push_str(path);
    if !key.ends_with('/') {
        key.push('/');
    }
    key.push_str(method);
    key
}

/// Split a pattern or key into its non-empty `/`-delimited segments.
pub(crate) fn split(key: &str) -> Vec<&str> {
    key.split('/').filter(|s| !s.is_empty()).collect()
}

/// A classified pattern segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    /// Matches exactly this text
    Literal(&'a str),
    /// Matches any text, captured under this name
    Param(&'a str),
}

impl<'a> Segment<'a> {
    /// Classify a pattern segment; `{name}` is a parameter placeholder.
    pub(crate) fn parse(raw: &'a str) -> NetResult<Self> {
        match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some("") => Err(NetError::configuration(format!(
                "Empty parameter name in segment '{}'",
                raw
            ))),
            Some(name) if name.contains(['{', '}']) => Err(NetError::configuration(format!(
                "Invalid parameter name in segment '{}'",
                raw
            ))),
            Some(name) => Ok(Segment::Param(name)),
            None => Ok(Segment::Literal(raw)),
        }
    }
}
