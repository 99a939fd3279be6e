//! Per-dispatch handler contexts
//!
//! Handlers never touch the transport directly. They write responses and
//! messages into their context; the dispatcher hands the collected
//! [`Outbound`] actions to the server loop, which flushes them once the
//! handler has returned.

use bytes::Bytes;
use serde::Serialize;
use tracing::warn;
use turbonet_core::{NetError, NetResult};
use turbonet_protocol::{APPLICATION_JSON, Envelope, HttpRequest, HttpResponse};
use turbonet_transport_traits::{ConnectionHandle, Frame};

/// An action a handler asked the server loop to perform
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Write a frame to a connection
    Send {
        /// Target connection
        connection: ConnectionHandle,
        /// Frame to write
        frame: Frame,
    },
    /// Close a connection
    Close {
        /// Connection to close
        connection: ConnectionHandle,
    },
}

impl Outbound {
    /// The connection this action targets
    #[must_use]
    pub fn connection(&self) -> ConnectionHandle {
        match self {
            Self::Send { connection, .. } | Self::Close { connection } => *connection,
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> NetResult<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| NetError::serialization(e.to_string()).with_operation("encode_message"))
}

/// Context handed to HTTP handlers (including WebSocket handshakes)
#[derive(Debug)]
pub struct HttpContext {
    connection: ConnectionHandle,
    request: HttpRequest,
    websocket: bool,
    replied: bool,
    outbound: Vec<Outbound>,
}

impl HttpContext {
    pub(crate) fn new(connection: ConnectionHandle, request: HttpRequest, websocket: bool) -> Self {
        Self {
            connection,
            request,
            websocket,
            replied: false,
            outbound: Vec::new(),
        }
    }

    /// The request being handled
    #[must_use]
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// The connection the request arrived on
    #[must_use]
    pub fn connection(&self) -> ConnectionHandle {
        self.connection
    }

    /// Whether this is a WebSocket upgrade handshake
    #[must_use]
    pub fn is_websocket(&self) -> bool {
        self.websocket
    }

    /// Whether a response has been written
    #[must_use]
    pub fn replied(&self) -> bool {
        self.replied
    }

    /// Write the response.
    ///
    /// Only the first response counts; later ones, and any response to a
    /// WebSocket handshake, are dropped with a warning.
    pub fn send(&mut self, response: HttpResponse) {
        if self.websocket {
            warn!(connection = %self.connection, "ignoring HTTP response on websocket handshake");
            return;
        }
        if self.replied {
            warn!(connection = %self.connection, status = response.status, "response already sent");
            return;
        }
        self.replied = true;
        self.outbound.push(Outbound::Send {
            connection: self.connection,
            frame: Frame::Response(response),
        });
    }

    /// Write a response with `status` and a text body
    pub fn send_status(&mut self, status: u16, body: impl Into<Bytes>) {
        self.send(HttpResponse::new(status).with_body(body));
    }

    /// Write a JSON response
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be encoded; nothing is
    /// written in that case.
    pub fn send_json<T: Serialize + ?Sized>(&mut self, status: u16, value: &T) -> NetResult<()> {
        let body = encode(value)?;
        self.send(
            HttpResponse::new(status)
                .with_header("Content-Type", APPLICATION_JSON)
                .with_body(body),
        );
        Ok(())
    }

    /// Queue a text frame on the upgraded connection.
    ///
    /// # Errors
    ///
    /// Returns an invalid request error outside a WebSocket handshake, or a
    /// serialization error if `value` cannot be encoded.
    pub fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> NetResult<()> {
        if !self.websocket {
            return Err(NetError::invalid_request(
                "push is only available on websocket connections",
            ));
        }
        let payload = encode(value)?;
        self.outbound.push(Outbound::Send {
            connection: self.connection,
            frame: Frame::Message(payload),
        });
        Ok(())
    }

    /// Close the connection after the handler returns
    pub fn close(&mut self) {
        self.outbound.push(Outbound::Close {
            connection: self.connection,
        });
    }

    pub(crate) fn into_outbound(self) -> Vec<Outbound> {
        self.outbound
    }
}

/// Context handed to WebSocket envelope handlers
#[derive(Debug)]
pub struct WsContext {
    connection: ConnectionHandle,
    outbound: Vec<Outbound>,
}

impl WsContext {
    pub(crate) fn new(connection: ConnectionHandle) -> Self {
        Self {
            connection,
            outbound: Vec::new(),
        }
    }

    /// The connection the envelope arrived on
    #[must_use]
    pub fn connection(&self) -> ConnectionHandle {
        self.connection
    }

    /// Queue a text frame back to the sender
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be encoded.
    pub fn send<T: Serialize + ?Sized>(&mut self, value: &T) -> NetResult<()> {
        self.send_to(self.connection, value)
    }

    /// Queue an envelope back to the sender
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload cannot be encoded.
    pub fn send_envelope(&mut self, envelope: &Envelope) -> NetResult<()> {
        let payload = envelope.to_bytes()?;
        self.outbound.push(Outbound::Send {
            connection: self.connection,
            frame: Frame::Message(payload),
        });
        Ok(())
    }

    /// Queue a text frame to another WebSocket connection
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be encoded.
    pub fn send_to<T: Serialize + ?Sized>(
        &mut self,
        connection: ConnectionHandle,
        value: &T,
    ) -> NetResult<()> {
        let payload = encode(value)?;
        self.outbound.push(Outbound::Send {
            connection,
            frame: Frame::Message(payload),
        });
        Ok(())
    }

    /// Close the connection after the handler returns
    pub fn close(&mut self) {
        self.outbound.push(Outbound::Close {
            connection: self.connection,
        });
    }

    pub(crate) fn into_outbound(self) -> Vec<Outbound> {
        self.outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const CONN: ConnectionHandle = ConnectionHandle(7);

    #[test]
    fn test_http_context_single_reply() {
        let mut ctx = HttpContext::new(CONN, HttpRequest::get("/a"), false);
        assert!(!ctx.replied());

        ctx.send_status(200, "first");
        ctx.send_status(500, "second");
        assert!(ctx.replied());

        let outbound = ctx.into_outbound();
        assert_eq!(
            outbound,
            vec![Outbound::Send {
                connection: CONN,
                frame: Frame::Response(HttpResponse::new(200).with_body("first")),
            }]
        );
    }

    #[test]
    fn test_http_context_json() {
        let mut ctx = HttpContext::new(CONN, HttpRequest::get("/a"), false);
        ctx.send_json(201, &json!({"ok": true})).unwrap();

        let Some(Outbound::Send {
            frame: Frame::Response(response),
            ..
        }) = ctx.into_outbound().pop()
        else {
            panic!("expected a response");
        };
        assert_eq!(response.status, 201);
        assert_eq!(response.header("content-type"), Some(APPLICATION_JSON));
        assert_eq!(response.json::<serde_json::Value>().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_handshake_context_pushes_messages() {
        let mut ctx = HttpContext::new(CONN, HttpRequest::get("/chat"), true);
        ctx.send_status(200, "ignored");
        ctx.push(&json!({"id": "welcome"})).unwrap();
        assert!(!ctx.replied());

        let outbound = ctx.into_outbound();
        assert_eq!(outbound.len(), 1);
        assert!(matches!(
            &outbound[0],
            Outbound::Send { frame: Frame::Message(_), .. }
        ));
    }

    #[test]
    fn test_push_requires_websocket() {
        let mut ctx = HttpContext::new(CONN, HttpRequest::get("/a"), false);
        assert!(ctx.push(&json!({})).is_err());
    }

    #[test]
    fn test_ws_context_send_and_close() {
        let mut ctx = WsContext::new(CONN);
        ctx.send(&json!({"id": "a"})).unwrap();
        ctx.send_to(ConnectionHandle(9), &json!({"id": "b"})).unwrap();
        ctx.close();

        let targets: Vec<_> = ctx.into_outbound().iter().map(Outbound::connection).collect();
        assert_eq!(targets, vec![CONN, ConnectionHandle(9), CONN]);
    }
}
