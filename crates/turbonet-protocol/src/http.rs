//! HTTP request and response shapes.
//!
//! These are the parsed forms the event loop hands over; wire-level parsing
//! and serialization stay inside the transport.

use crate::method::Method;
use crate::target::Target;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use turbonet_core::{NetError, NetResult, concat};

/// `Content-Type` used by the JSON helpers
pub const APPLICATION_JSON: &str = "application/json";

/// Header map with case-insensitive lookup.
///
/// Names keep the case they were first inserted with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, String>,
}

impl Headers {
    /// Empty header map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(&self, name: &str) -> Option<&String> {
        self.entries.keys().find(|k| k.eq_ignore_ascii_case(name))
    }

    /// Header value by case-insensitive name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.key_for(name)
            .and_then(|k| self.entries.get(k))
            .map(String::as_str)
    }

    /// Whether a header is present
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.key_for(name).is_some()
    }

    /// Insert or replace a header
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = self.key_for(&name).cloned().unwrap_or(name);
        self.entries.insert(key, value.into());
    }

    /// Remove a header, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let key = self.key_for(name)?.clone();
        self.entries.remove(&key)
    }

    /// Number of headers
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Parsed HTTP request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method
    pub method: Method,
    /// Parsed request target
    pub target: Target,
    /// Request headers
    pub headers: Headers,
    /// Request body
    pub body: Bytes,
}

impl HttpRequest {
    /// Create a request for `target` (which may include a query string)
    #[must_use]
    pub fn new(method: impl Into<Method>, target: &str) -> Self {
        Self {
            method: method.into(),
            target: Target::parse(target),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// GET request
    #[must_use]
    pub fn get(target: &str) -> Self {
        Self::new(Method::Get, target)
    }

    /// POST request
    #[must_use]
    pub fn post(target: &str) -> Self {
        Self::new(Method::Post, target)
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be encoded.
    pub fn with_json<T: Serialize>(mut self, value: &T) -> NetResult<Self> {
        self.body = serde_json::to_vec(value)
            .map_err(|e| NetError::serialization(e.to_string()))?
            .into();
        self.headers.insert("Content-Type", APPLICATION_JSON);
        Ok(self)
    }

    /// Request path
    #[must_use]
    pub fn path(&self) -> &str {
        self.target.path()
    }

    /// Header by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Router key for this request: `<path>/<METHOD>`
    #[must_use]
    pub fn dispatch_key(&self) -> String {
        concat(self.method.as_str(), self.target.path())
    }

    /// Body as UTF-8 text, if valid
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Deserialize the JSON body
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidRequest`](turbonet_core::ErrorKind::InvalidRequest)
    /// if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> NetResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| NetError::invalid_request(format!("Invalid JSON body: {}", e)))
    }
}

/// Parsed HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    /// Response with `status` and an empty body
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// 200 with a text body
    #[must_use]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200).with_body(body)
    }

    /// 404 "not found"
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(404).with_body("not found")
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be encoded.
    pub fn with_json<T: Serialize>(mut self, value: &T) -> NetResult<Self> {
        self.body = serde_json::to_vec(value)
            .map_err(|e| NetError::serialization(e.to_string()))?
            .into();
        self.headers.insert("Content-Type", APPLICATION_JSON);
        Ok(self)
    }

    /// Header by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// 2xx status
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8 text, if valid
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Deserialize the JSON body
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> NetResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| NetError::serialization(format!("Invalid JSON body: {}", e)))
    }

    /// Canonical reason phrase for common status codes
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self.status {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            409 => "Conflict",
            413 => "Payload Too Large",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "",
        }
    }
}

impl From<&NetError> for HttpResponse {
    fn from(err: &NetError) -> Self {
        Self::new(err.http_status()).with_body(err.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));

        headers.insert("CONTENT-TYPE", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
        // Original casing is kept
        assert_eq!(headers.iter().next().unwrap().0, "Content-Type");

        assert_eq!(headers.remove("content-TYPE").as_deref(), Some("application/json"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_request_dispatch_key_ignores_query() {
        let req = HttpRequest::get("/hello-world?x=1");
        assert_eq!(req.path(), "/hello-world");
        assert_eq!(req.dispatch_key(), "/hello-world/GET");
        assert_eq!(req.target.query("x"), Some("1"));
    }

    #[test]
    fn test_json_bodies() {
        let req = HttpRequest::post("/items")
            .with_json(&json!({"name": "widget"}))
            .unwrap();
        assert_eq!(req.header("content-type"), Some(APPLICATION_JSON));
        let body: serde_json::Value = req.json().unwrap();
        assert_eq!(body["name"], "widget");

        let bad = HttpRequest::post("/items").with_body("{oops");
        assert!(bad.json::<serde_json::Value>().is_err());
    }

    #[test]
    fn test_response_helpers() {
        let res = HttpResponse::ok("hello world");
        assert!(res.is_success());
        assert_eq!(res.body_text(), Some("hello world"));
        assert_eq!(res.reason(), "OK");

        let res = HttpResponse::not_found();
        assert_eq!(res.status, 404);
        assert_eq!(res.body_text(), Some("not found"));
        assert!(!res.is_success());
    }

    #[test]
    fn test_response_from_error() {
        let err = NetError::route_not_found("/x/GET");
        let res = HttpResponse::from(&err);
        assert_eq!(res.status, 404);
        assert!(res.body_text().unwrap().contains("/x/GET"));
    }
}
