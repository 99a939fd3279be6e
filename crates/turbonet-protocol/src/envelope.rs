//! WebSocket JSON envelope.
//!
//! Every WebSocket text frame carries one JSON object:
//!
//! ```json
//! {"id": "hello-world", "method": "POST", "any": "other", "fields": 1}
//! ```
//!
//! `id` is required; `method` is optional on the wire but the server only
//! dispatches envelopes that carry one. Every other field is opaque payload
//! and is passed through untouched.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use turbonet_core::{NetError, NetResult, concat};

/// A WebSocket message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Routing id
    pub id: String,
    /// Routing method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Remaining fields
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Envelope with only an id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: None,
            payload: Map::new(),
        }
    }

    /// Set the routing method
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Add a payload field
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedEnvelope`](turbonet_core::ErrorKind::MalformedEnvelope)
    /// if the frame is not a JSON object with a string `id` (and, when
    /// present, a string `method`).
    pub fn parse(frame: &[u8]) -> NetResult<Self> {
        serde_json::from_slice(frame)
            .map_err(|e| NetError::malformed_envelope(format!("Malformed envelope: {}", e)))
    }

    /// Build from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Same as [`Envelope::parse`].
    pub fn from_value(value: Value) -> NetResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| NetError::malformed_envelope(format!("Malformed envelope: {}", e)))
    }

    /// The method, required for server-side dispatch.
    ///
    /// # Errors
    ///
    /// Returns a malformed envelope error when `method` is absent.
    pub fn require_method(&self) -> NetResult<&str> {
        self.method.as_deref().ok_or_else(|| {
            NetError::malformed_envelope(format!("Envelope '{}' has no method", self.id))
        })
    }

    /// Router key: `<id>/<method>` when a method is present, else the id
    #[must_use]
    pub fn dispatch_key(&self) -> String {
        match &self.method {
            Some(method) => concat(method, &self.id),
            None => self.id.clone(),
        }
    }

    /// Payload field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Full JSON object
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.payload.len() + 2);
        object.insert("id".to_string(), Value::String(self.id.clone()));
        if let Some(method) = &self.method {
            object.insert("method".to_string(), Value::String(method.clone()));
        }
        object.extend(self.payload.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Object(object)
    }

    /// Encode as a text frame
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload cannot be encoded.
    pub fn to_bytes(&self) -> NetResult<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| NetError::serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use turbonet_core::ErrorKind;

    #[test]
    fn test_parse_full_envelope() {
        let env = Envelope::parse(br#"{"id":"hello-world","method":"POST","n":1}"#).unwrap();
        assert_eq!(env.id, "hello-world");
        assert_eq!(env.method.as_deref(), Some("POST"));
        assert_eq!(env.get("n"), Some(&json!(1)));
        assert_eq!(env.dispatch_key(), "hello-world/POST");
    }

    #[test]
    fn test_missing_method_keys_on_id() {
        let env = Envelope::parse(br#"{"id":"42"}"#).unwrap();
        assert_eq!(env.dispatch_key(), "42");
        assert_eq!(env.require_method().unwrap_err().kind, ErrorKind::MalformedEnvelope);
    }

    #[test]
    fn test_malformed_envelopes() {
        for frame in [
            &br#"{"method":"POST"}"#[..],
            br#"{"id":7,"method":"POST"}"#,
            br#"{"id":"x","method":5}"#,
            br#"["id","x"]"#,
            b"not json",
        ] {
            let err = Envelope::parse(frame).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedEnvelope);
        }
    }

    #[test]
    fn test_payload_passthrough() {
        let raw = json!({"id": "a", "method": "GET", "nested": {"k": [1, 2]}, "s": "v"});
        let env = Envelope::from_value(raw.clone()).unwrap();
        assert_eq!(env.to_value(), raw);

        let bytes = env.to_bytes().unwrap();
        assert_eq!(Envelope::parse(&bytes).unwrap(), env);
    }

    #[test]
    fn test_builder() {
        let env = Envelope::new("hello-world")
            .with_method("POST")
            .with_field("text", "hi");
        assert_eq!(
            env.to_value(),
            json!({"id": "hello-world", "method": "POST", "text": "hi"})
        );
    }
}
