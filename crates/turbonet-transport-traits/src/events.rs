//! Transport event and frame types.

use bytes::Bytes;
use turbonet_protocol::{HttpRequest, HttpResponse};

use crate::types::ConnectionHandle;

/// Represents events delivered by a transport's poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// An outbound connection attempt finished.
    Connected {
        /// The connection that was attempted.
        connection: ConnectionHandle,
        /// `Err` carries the failure reason.
        result: Result<(), String>,
    },

    /// A complete HTTP request arrived on an accepted connection.
    RequestReceived {
        /// The accepted connection.
        connection: ConnectionHandle,
        /// The parsed request.
        request: HttpRequest,
    },

    /// A complete HTTP response arrived on an outbound connection.
    ResponseReceived {
        /// The outbound connection.
        connection: ConnectionHandle,
        /// The parsed response.
        response: HttpResponse,
    },

    /// A peer completed the WebSocket upgrade handshake.
    WebSocketOpened {
        /// The accepted connection.
        connection: ConnectionHandle,
        /// The upgrade request.
        request: HttpRequest,
    },

    /// A WebSocket text frame arrived.
    MessageReceived {
        /// The connection the frame arrived on.
        connection: ConnectionHandle,
        /// Frame payload.
        payload: Bytes,
    },

    /// A connection closed, either side.
    Closed {
        /// The connection that closed.
        connection: ConnectionHandle,
        /// Why it closed.
        reason: String,
    },
}

impl TransportEvent {
    /// The connection this event concerns
    #[must_use]
    pub fn connection(&self) -> ConnectionHandle {
        match self {
            Self::Connected { connection, .. }
            | Self::RequestReceived { connection, .. }
            | Self::ResponseReceived { connection, .. }
            | Self::WebSocketOpened { connection, .. }
            | Self::MessageReceived { connection, .. }
            | Self::Closed { connection, .. } => *connection,
        }
    }

    /// Short name for logging
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::RequestReceived { .. } => "request_received",
            Self::ResponseReceived { .. } => "response_received",
            Self::WebSocketOpened { .. } => "websocket_opened",
            Self::MessageReceived { .. } => "message_received",
            Self::Closed { .. } => "closed",
        }
    }
}

/// An outbound unit handed to [`Transport::send`](crate::Transport::send).
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// HTTP request written by a client.
    Request(HttpRequest),
    /// HTTP response written by a server.
    Response(HttpResponse),
    /// WebSocket text frame.
    Message(Bytes),
}

impl Frame {
    /// Body size in bytes
    #[must_use]
    pub fn body_len(&self) -> usize {
        match self {
            Self::Request(request) => request.body.len(),
            Self::Response(response) => response.body.len(),
            Self::Message(payload) => payload.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_connection_accessor() {
        let event = TransportEvent::MessageReceived {
            connection: ConnectionHandle(3),
            payload: Bytes::from_static(b"{}"),
        };
        assert_eq!(event.connection(), ConnectionHandle(3));
        assert_eq!(event.name(), "message_received");
    }

    #[test]
    fn test_frame_body_len() {
        assert_eq!(Frame::Message(Bytes::from_static(b"abc")).body_len(), 3);
        assert_eq!(Frame::Response(HttpResponse::ok("hello")).body_len(), 5);
        assert_eq!(Frame::Request(HttpRequest::get("/")).body_len(), 0);
    }
}
