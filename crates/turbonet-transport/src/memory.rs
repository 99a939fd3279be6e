//! In-process memory transport.
//!
//! Every clone of a [`MemoryTransport`] shares one hub. Listeners are keyed by
//! endpoint authority (`host:port`); a connect to an authority with no
//! listener is refused. Each client connection and each listener owns an
//! unbounded event queue. Events about accepted connections are delivered to
//! the queue of the listener that accepted them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};
use turbonet_protocol::HttpRequest;
use turbonet_transport_traits::{
    ConnectionHandle, Endpoint, Frame, LimitsConfig, Transport, TransportError, TransportEvent,
    TransportResult, TransportType, validate_frame_size,
};

/// Reason reported to the peer of a connection closed with [`Transport::close`]
pub const CLOSED_BY_PEER: &str = "closed by peer";

/// Reason reported for connects to an unbound authority
pub const CONNECTION_REFUSED: &str = "connection refused";

#[derive(Debug)]
struct EventQueue {
    tx: mpsc::UnboundedSender<TransportEvent>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl EventQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// Outbound connection; events go to its own queue
    Client,
    /// Accepted connection; events go to the listener's queue
    Server { listener: ConnectionHandle },
}

#[derive(Debug, Clone, Copy)]
struct Link {
    peer: ConnectionHandle,
    side: Side,
    websocket: bool,
}

#[derive(Debug)]
struct Hub {
    next_handle: AtomicU64,
    listeners: DashMap<String, ConnectionHandle>,
    queues: DashMap<ConnectionHandle, EventQueue>,
    links: DashMap<ConnectionHandle, Link>,
    limits: LimitsConfig,
}

impl Hub {
    fn allocate(&self) -> ConnectionHandle {
        ConnectionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn push(&self, queue: ConnectionHandle, event: TransportEvent) {
        match self.queues.get(&queue) {
            Some(q) => {
                // Receiver lives in the same entry, so the send cannot fail
                let _ = q.tx.send(event);
            }
            None => trace!(%queue, event = event.name(), "dropping event for closed queue"),
        }
    }

    /// Queue that receives events about `connection`
    fn destination(connection: ConnectionHandle, side: Side) -> ConnectionHandle {
        match side {
            Side::Client => connection,
            Side::Server { listener } => listener,
        }
    }

    /// Tear down both ends of a link; the peer always observes `Closed`.
    fn unlink(&self, connection: ConnectionHandle, reason: &str, notify_self: bool) {
        let Some((_, link)) = self.links.remove(&connection) else {
            return;
        };
        let peer = self.links.remove(&link.peer).map(|(_, l)| l);

        if notify_self {
            self.push(
                Self::destination(connection, link.side),
                TransportEvent::Closed {
                    connection,
                    reason: reason.to_string(),
                },
            );
        }
        if let Some(peer_link) = peer {
            self.push(
                Self::destination(link.peer, peer_link.side),
                TransportEvent::Closed {
                    connection: link.peer,
                    reason: reason.to_string(),
                },
            );
        }
    }
}

/// In-process transport; cloning shares the underlying network.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    hub: Arc<Hub>,
}

impl MemoryTransport {
    /// Create an empty network with default limits
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(LimitsConfig::default())
    }

    /// Create an empty network with the given frame limits
    #[must_use]
    pub fn with_limits(limits: LimitsConfig) -> Self {
        Self {
            hub: Arc::new(Hub {
                next_handle: AtomicU64::new(1),
                listeners: DashMap::new(),
                queues: DashMap::new(),
                links: DashMap::new(),
                limits,
            }),
        }
    }

    /// Drop a connection as if the network failed.
    ///
    /// Both ends observe [`TransportEvent::Closed`] with `reason`.
    pub fn drop_connection(&self, connection: ConnectionHandle, reason: &str) {
        debug!(%connection, reason, "dropping memory connection");
        self.hub.unlink(connection, reason, true);
    }

    /// Number of live connection ends (two per established connection)
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.hub.links.len()
    }

    /// Whether a listener is bound at the endpoint's authority
    #[must_use]
    pub fn is_bound(&self, endpoint: &Endpoint) -> bool {
        self.hub.listeners.contains_key(&endpoint.authority())
    }

    /// Client connections accepted by `listener`, as seen from the client side
    #[must_use]
    pub fn clients_of(&self, listener: ConnectionHandle) -> Vec<ConnectionHandle> {
        self.hub
            .links
            .iter()
            .filter(|entry| entry.side == (Side::Server { listener }))
            .map(|entry| entry.peer)
            .collect()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }

    async fn connect(&self, endpoint: &Endpoint) -> TransportResult<ConnectionHandle> {
        let hub = &self.hub;
        let client = hub.allocate();
        hub.queues.insert(client, EventQueue::new());

        let listener = hub.listeners.get(&endpoint.authority()).map(|l| *l);
        let Some(listener) = listener else {
            debug!(%client, %endpoint, "memory connect refused");
            hub.push(
                client,
                TransportEvent::Connected {
                    connection: client,
                    result: Err(CONNECTION_REFUSED.to_string()),
                },
            );
            return Ok(client);
        };

        let accepted = hub.allocate();
        let websocket = endpoint.is_websocket();
        hub.links.insert(
            client,
            Link {
                peer: accepted,
                side: Side::Client,
                websocket,
            },
        );
        hub.links.insert(
            accepted,
            Link {
                peer: client,
                side: Side::Server { listener },
                websocket,
            },
        );
        debug!(%client, %accepted, %endpoint, websocket, "memory connection established");

        hub.push(
            client,
            TransportEvent::Connected {
                connection: client,
                result: Ok(()),
            },
        );
        if websocket {
            let request = HttpRequest::get(&endpoint.request_target())
                .with_header("Host", endpoint.host_header())
                .with_header("Upgrade", "websocket")
                .with_header("Connection", "Upgrade");
            hub.push(
                listener,
                TransportEvent::WebSocketOpened {
                    connection: accepted,
                    request,
                },
            );
        }
        Ok(client)
    }

    async fn bind(&self, endpoint: &Endpoint) -> TransportResult<ConnectionHandle> {
        let authority = endpoint.authority();
        if self.hub.listeners.contains_key(&authority) {
            return Err(TransportError::BindFailed(format!(
                "address already in use: {}",
                authority
            )));
        }
        let listener = self.hub.allocate();
        self.hub.queues.insert(listener, EventQueue::new());
        self.hub.listeners.insert(authority, listener);
        debug!(%listener, %endpoint, "memory listener bound");
        Ok(listener)
    }

    async fn send(&self, connection: ConnectionHandle, frame: Frame) -> TransportResult<()> {
        validate_frame_size(frame.body_len(), &self.hub.limits)?;

        let link = self
            .hub
            .links
            .get(&connection)
            .map(|l| *l)
            .ok_or_else(|| TransportError::ConnectionLost(format!("{} is not open", connection)))?;
        let peer_side = self
            .hub
            .links
            .get(&link.peer)
            .map(|l| l.side)
            .ok_or_else(|| TransportError::ConnectionLost(format!("peer of {} is gone", connection)))?;

        let peer = link.peer;
        let event = match (frame, link.side, link.websocket) {
            (Frame::Message(payload), _, true) => TransportEvent::MessageReceived {
                connection: peer,
                payload,
            },
            (Frame::Request(request), Side::Client, false) => TransportEvent::RequestReceived {
                connection: peer,
                request,
            },
            (Frame::Response(response), Side::Server { .. }, false) => {
                TransportEvent::ResponseReceived {
                    connection: peer,
                    response,
                }
            }
            (frame, side, websocket) => {
                let kind = match frame {
                    Frame::Request(_) => "request",
                    Frame::Response(_) => "response",
                    Frame::Message(_) => "message",
                };
                return Err(TransportError::SendFailed(format!(
                    "{} frame not valid on {:?} {} connection",
                    kind,
                    side,
                    if websocket { "websocket" } else { "http" }
                )));
            }
        };

        trace!(%connection, %peer, event = event.name(), "memory frame delivered");
        self.hub.push(Hub::destination(peer, peer_side), event);
        Ok(())
    }

    async fn poll(
        &self,
        handle: ConnectionHandle,
        wait: Duration,
    ) -> TransportResult<Option<TransportEvent>> {
        let rx = self
            .hub
            .queues
            .get(&handle)
            .map(|q| Arc::clone(&q.rx))
            .ok_or(TransportError::UnknownHandle(handle.0))?;

        let mut rx = rx.lock().await;
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => Err(TransportError::ConnectionLost(format!(
                "event queue for {} closed",
                handle
            ))),
            Err(_) => Ok(None),
        }
    }

    async fn close(&self, handle: ConnectionHandle) -> TransportResult<()> {
        let hub = &self.hub;

        let was_listener = {
            let before = hub.listeners.len();
            hub.listeners.retain(|_, l| *l != handle);
            hub.listeners.len() != before
        };
        if was_listener {
            let accepted: Vec<ConnectionHandle> = hub
                .links
                .iter()
                .filter(|entry| entry.side == (Side::Server { listener: handle }))
                .map(|entry| *entry.key())
                .collect();
            for connection in accepted {
                hub.unlink(connection, CLOSED_BY_PEER, false);
            }
            debug!(listener = %handle, "memory listener closed");
        } else {
            hub.unlink(handle, CLOSED_BY_PEER, false);
            trace!(connection = %handle, "memory connection closed");
        }

        hub.queues.remove(&handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(raw: &str) -> Endpoint {
        Endpoint::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_bind_twice_fails() {
        let transport = MemoryTransport::new();
        transport.bind(&endpoint("http://127.0.0.1:9000")).await.unwrap();
        let err = transport
            .bind(&endpoint("http://127.0.0.1:9000/other"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::BindFailed(_)));
    }

    #[tokio::test]
    async fn test_poll_unknown_handle() {
        let transport = MemoryTransport::new();
        let err = transport
            .poll(ConnectionHandle(99), Duration::from_millis(1))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownHandle(99));
    }

    #[tokio::test]
    async fn test_poll_times_out_quietly() {
        let transport = MemoryTransport::new();
        let listener = transport.bind(&endpoint("http://h:1")).await.unwrap();
        let event = transport
            .poll(listener, Duration::from_millis(5))
            .await
            .unwrap();
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn test_frame_limit_enforced() {
        let transport = MemoryTransport::with_limits(LimitsConfig {
            max_frame_size: Some(4),
        });
        transport.bind(&endpoint("http://h:1")).await.unwrap();
        let client = transport.connect(&endpoint("http://h:1")).await.unwrap();
        let err = transport
            .send(client, Frame::Request(HttpRequest::post("/").with_body("too long")))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { size: 8, max: 4 }));
    }
}
