//! Core transport trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::events::{Frame, TransportEvent};
use crate::types::{ConnectionHandle, Endpoint, TransportType};

/// The event loop contract.
///
/// A transport owns every socket. Callers hold only [`ConnectionHandle`]s,
/// push [`Frame`]s through [`send`](Transport::send) and learn about
/// everything else by polling for [`TransportEvent`]s.
///
/// Connection establishment is asynchronous on both ends: `connect` returns a
/// handle immediately and the outcome arrives later as
/// [`TransportEvent::Connected`] on that handle.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Returns the type of this transport.
    fn transport_type(&self) -> TransportType;

    /// Start connecting to `endpoint`.
    async fn connect(&self, endpoint: &Endpoint) -> TransportResult<ConnectionHandle>;

    /// Start listening on `endpoint`. Events for accepted connections are
    /// polled through the returned listener handle.
    async fn bind(&self, endpoint: &Endpoint) -> TransportResult<ConnectionHandle>;

    /// Queue a frame on a connection.
    async fn send(&self, connection: ConnectionHandle, frame: Frame) -> TransportResult<()>;

    /// Wait up to `wait` for the next event on a connection or listener.
    ///
    /// `Ok(None)` means the interval elapsed without activity.
    async fn poll(
        &self,
        handle: ConnectionHandle,
        wait: Duration,
    ) -> TransportResult<Option<TransportEvent>>;

    /// Close a connection or listener.
    async fn close(&self, handle: ConnectionHandle) -> TransportResult<()>;
}
