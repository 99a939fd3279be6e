//! WebSocket client with envelope routing
//!
//! Incoming text frames are parsed as envelopes and routed by
//! `concat(method, id)` (or the bare id when no method is present) onto
//! handlers registered with [`WsClientBuilder`]. Handlers run on the poll
//! task; anything they [`queue`](WsClient::queue) is written once they
//! return.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use turbonet_core::{ErrorKind, NetError, NetResult, Params, Router};
use turbonet_protocol::Envelope;
use turbonet_transport_traits::{ConnectionHandle, Endpoint, Frame, Transport, TransportEvent};

use crate::config::WsClientConfig;
use crate::connection::{ConnectionState, establish};

/// Handler for an incoming envelope
pub type WsClientHandler = Arc<dyn Fn(&WsClient, &Envelope, &Params) + Send + Sync>;

#[derive(Default)]
struct WsShared {
    state: ConnectionState,
    endpoint: Option<Endpoint>,
    handle: Option<ConnectionHandle>,
    outbox: VecDeque<Bytes>,
    generation: u64,
    closing: bool,
    poll_task: Option<JoinHandle<()>>,
    poll_cancel: CancellationToken,
    reconnect_cancel: CancellationToken,
}

struct Inner {
    transport: Arc<dyn Transport>,
    router: Router<WsClientHandler>,
    config: WsClientConfig,
    shared: Mutex<WsShared>,
    connect_lock: tokio::sync::Mutex<()>,
    flush_lock: tokio::sync::Mutex<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let shared = self.shared.get_mut();
        shared.poll_cancel.cancel();
        shared.reconnect_cancel.cancel();
    }
}

/// Builder for [`WsClient`]
pub struct WsClientBuilder {
    transport: Arc<dyn Transport>,
    router: Router<WsClientHandler>,
    config: WsClientConfig,
}

impl fmt::Debug for WsClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsClientBuilder")
            .field("routes", &self.router.patterns())
            .field("config", &self.config)
            .finish()
    }
}

impl WsClientBuilder {
    /// Set the client configuration
    #[must_use]
    pub fn config(mut self, config: WsClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle envelopes carrying `method` and an id matching `id`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed patterns.
    pub fn route<F>(mut self, method: &str, id: &str, handler: F) -> NetResult<Self>
    where
        F: Fn(&WsClient, &Envelope, &Params) + Send + Sync + 'static,
    {
        self.router.route(method, id, Arc::new(handler))?;
        Ok(self)
    }

    /// Handle envelopes without a method whose id matches `id`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed patterns.
    pub fn on<F>(mut self, id: &str, handler: F) -> NetResult<Self>
    where
        F: Fn(&WsClient, &Envelope, &Params) + Send + Sync + 'static,
    {
        self.router.on(id, Arc::new(handler))?;
        Ok(self)
    }

    /// Build the client; it starts disconnected
    #[must_use]
    pub fn build(self) -> WsClient {
        WsClient {
            inner: Arc::new(Inner {
                transport: self.transport,
                router: self.router,
                config: self.config,
                shared: Mutex::new(WsShared::default()),
                connect_lock: tokio::sync::Mutex::new(()),
                flush_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

/// WebSocket client.
///
/// Cloning is cheap; clones share the connection and the routes.
#[derive(Clone)]
pub struct WsClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for WsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("WsClient")
            .field("state", &shared.state)
            .field("endpoint", &shared.endpoint)
            .field("handle", &shared.handle)
            .field("outbox", &shared.outbox.len())
            .finish()
    }
}

struct ConnectingGuard<'a> {
    shared: &'a Mutex<WsShared>,
    generation: u64,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut shared = self.shared.lock();
            if shared.generation == self.generation && shared.state == ConnectionState::Connecting {
                shared.state = ConnectionState::Disconnected;
                shared.outbox.clear();
            }
        }
    }
}

impl WsClient {
    /// Start building a client over `transport`
    #[must_use]
    pub fn builder(transport: Arc<dyn Transport>) -> WsClientBuilder {
        WsClientBuilder {
            transport,
            router: Router::new(),
            config: WsClientConfig::default(),
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Whether the client is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The endpoint of the last connect
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.inner.shared.lock().endpoint.clone()
    }

    /// The active transport handle
    #[must_use]
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.inner.shared.lock().handle
    }

    /// Registered route patterns
    #[must_use]
    pub fn routes(&self) -> Vec<String> {
        self.inner.router.patterns()
    }

    /// Connect to a `ws` or `wss` URL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for other schemes or when already
    /// connected elsewhere, `ConnectionFailed` when the transport refuses,
    /// or `TimedOut` past the connect timeout.
    pub async fn connect(&self, url: &str) -> NetResult<()> {
        let endpoint = Endpoint::parse(url)?;
        if !endpoint.is_websocket() {
            return Err(NetError::configuration(format!(
                "'{}' is not a WebSocket endpoint",
                url
            )));
        }
        self.connect_to(endpoint, true).await
    }

    async fn connect_to(&self, endpoint: Endpoint, explicit: bool) -> NetResult<()> {
        let _serial = self.inner.connect_lock.lock().await;

        let generation = {
            let mut shared = self.inner.shared.lock();
            if shared.state == ConnectionState::Connected {
                if shared.endpoint.as_ref() == Some(&endpoint) {
                    return Ok(());
                }
                return Err(NetError::configuration(format!(
                    "already connected to {}",
                    shared.endpoint.as_ref().map_or_else(String::new, ToString::to_string)
                )));
            }
            if explicit {
                shared.closing = false;
                shared.reconnect_cancel.cancel();
                shared.reconnect_cancel = CancellationToken::new();
            } else if shared.closing {
                return Err(NetError::cancelled("client is closing"));
            }
            shared.state = ConnectionState::Connecting;
            shared.endpoint = Some(endpoint.clone());
            shared.generation += 1;
            shared.generation
        };
        let mut guard = ConnectingGuard {
            shared: &self.inner.shared,
            generation,
            armed: true,
        };

        let handle = establish(
            self.inner.transport.as_ref(),
            &endpoint,
            self.inner.config.connect_timeout,
            self.inner.config.poll_interval,
        )
        .await?;

        let superseded = {
            let mut shared = self.inner.shared.lock();
            if shared.generation != generation || (shared.closing && !explicit) {
                true
            } else {
                guard.armed = false;
                let cancel = CancellationToken::new();
                shared.state = ConnectionState::Connected;
                shared.handle = Some(handle);
                shared.poll_cancel = cancel.clone();
                shared.poll_task = Some(tokio::spawn(poll_loop(
                    Arc::downgrade(&self.inner),
                    Arc::clone(&self.inner.transport),
                    handle,
                    generation,
                    self.inner.config.poll_interval,
                    cancel,
                )));
                false
            }
        };
        if superseded {
            drop(guard);
            self.release(handle).await;
            return Err(NetError::cancelled("connect superseded by disconnect"));
        }
        info!(%endpoint, %handle, "websocket connected");

        self.flush().await;
        Ok(())
    }

    /// Send a JSON message.
    ///
    /// While connecting the message is held and written once the
    /// connection is up.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` when disconnected or when the write fails,
    /// and a serialization error if `message` cannot be encoded.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> NetResult<()> {
        self.enqueue(message)?;
        self.flush().await;
        match self.state() {
            ConnectionState::Connected | ConnectionState::Connecting => Ok(()),
            _ => Err(NetError::connection_lost("websocket closed while sending")
                .with_operation("send")),
        }
    }

    /// Queue a JSON message from inside a handler; it is written after the
    /// handler returns.
    ///
    /// # Errors
    ///
    /// Same as [`WsClient::send`], minus write failures.
    pub fn queue<T: Serialize + ?Sized>(&self, message: &T) -> NetResult<()> {
        self.enqueue(message)
    }

    fn enqueue<T: Serialize + ?Sized>(&self, message: &T) -> NetResult<()> {
        let bytes = Bytes::from(serde_json::to_vec(message)?);
        let mut shared = self.inner.shared.lock();
        match shared.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                shared.outbox.push_back(bytes);
                Ok(())
            }
            ConnectionState::Disconnected | ConnectionState::Closing => {
                Err(NetError::connection_lost("websocket is not connected").with_operation("send"))
            }
        }
    }

    /// Write everything queued, in order
    async fn flush(&self) {
        let _serial = self.inner.flush_lock.lock().await;
        let (handle, generation, frames) = {
            let mut shared = self.inner.shared.lock();
            if shared.state != ConnectionState::Connected || shared.outbox.is_empty() {
                return;
            }
            let Some(handle) = shared.handle else {
                return;
            };
            let frames: Vec<Bytes> = shared.outbox.drain(..).collect();
            (handle, shared.generation, frames)
        };

        for payload in frames {
            trace!(%handle, bytes = payload.len(), "writing message");
            if let Err(e) = self
                .inner
                .transport
                .send(handle, Frame::Message(payload))
                .await
            {
                warn!(%handle, error = %e, "message write failed");
                self.connection_lost(generation, &e.to_string());
                return;
            }
        }
    }

    fn on_message(&self, payload: &[u8]) {
        let envelope = match Envelope::parse(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                trace!(error = %e, "dropping malformed envelope");
                return;
            }
        };
        let key = envelope.dispatch_key();
        match self.inner.router.resolve(&key) {
            Ok(found) => {
                trace!(key = %key, "dispatching envelope");
                (found.handler)(self, &envelope, &found.params);
            }
            Err(_) => debug!(key = %key, "no handler for envelope, dropping"),
        }
    }

    fn connection_lost(&self, generation: u64, reason: &str) {
        let (endpoint, dropped, reconnect) = {
            let mut shared = self.inner.shared.lock();
            if shared.generation != generation || shared.state != ConnectionState::Connected {
                return;
            }
            shared.state = ConnectionState::Disconnected;
            shared.handle = None;
            shared.poll_task = None;
            shared.poll_cancel.cancel();
            let dropped = shared.outbox.len();
            shared.outbox.clear();
            let reconnect = !shared.closing && self.inner.config.reconnect.enabled;
            (
                shared.endpoint.clone(),
                dropped,
                reconnect.then(|| shared.reconnect_cancel.clone()),
            )
        };

        warn!(reason, dropped, "websocket connection lost");
        if let (Some(endpoint), Some(cancel)) = (endpoint, reconnect) {
            tokio::spawn(reconnect_loop(Arc::downgrade(&self.inner), endpoint, cancel));
        }
    }

    /// Close the connection and stop reconnecting.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the poll task does not finish within the
    /// disconnect timeout; the task is aborted in that case.
    pub async fn disconnect(&self) -> NetResult<()> {
        let (handle, task) = {
            let mut shared = self.inner.shared.lock();
            shared.closing = true;
            shared.reconnect_cancel.cancel();
            shared.poll_cancel.cancel();
            if matches!(
                shared.state,
                ConnectionState::Connected | ConnectionState::Connecting
            ) {
                shared.state = ConnectionState::Closing;
            }
            shared.generation += 1;
            (shared.handle.take(), shared.poll_task.take())
        };

        if let Some(handle) = handle {
            self.release(handle).await;
        }

        let mut outcome = Ok(());
        if let Some(mut task) = task {
            let timeout = self.inner.config.disconnect_timeout;
            if tokio::time::timeout(timeout, &mut task).await.is_err() {
                error!(?timeout, "websocket poll task did not stop, aborting");
                task.abort();
                outcome = Err(NetError::timed_out("websocket teardown timed out")
                    .with_operation("disconnect"));
            }
        }

        let mut shared = self.inner.shared.lock();
        shared.state = ConnectionState::Disconnected;
        shared.outbox.clear();
        debug!("websocket disconnected");
        outcome
    }

    async fn release(&self, handle: ConnectionHandle) {
        if let Err(e) = self.inner.transport.close(handle).await {
            warn!(%handle, error = %e, "failed to close websocket");
        }
    }
}

async fn poll_loop(
    weak: Weak<Inner>,
    transport: Arc<dyn Transport>,
    handle: ConnectionHandle,
    generation: u64,
    interval: std::time::Duration,
    cancel: CancellationToken,
) {
    loop {
        let polled = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            polled = transport.poll(handle, interval) => polled,
        };
        let Some(inner) = weak.upgrade() else {
            let _ = transport.close(handle).await;
            break;
        };
        let client = WsClient { inner };

        match polled {
            Ok(Some(TransportEvent::MessageReceived { payload, .. })) => {
                client.on_message(&payload);
                client.flush().await;
            }
            Ok(Some(TransportEvent::Closed { reason, .. })) => {
                client.connection_lost(generation, &reason);
                break;
            }
            Ok(Some(event)) => trace!(event = event.name(), "ignoring websocket event"),
            Ok(None) => client.flush().await,
            Err(e) => {
                client.connection_lost(generation, &e.to_string());
                break;
            }
        }
    }
    trace!(%handle, generation, "websocket poll task stopped");
}

async fn reconnect_loop(weak: Weak<Inner>, endpoint: Endpoint, cancel: CancellationToken) {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let policy = match weak.upgrade() {
            Some(inner) => inner.config.reconnect,
            None => return,
        };
        if !policy.allows(attempt) {
            warn!(attempts = attempt - 1, %endpoint, "giving up on reconnection");
            return;
        }

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(policy.backoff) => {}
        }

        let Some(inner) = weak.upgrade() else {
            return;
        };
        let client = WsClient { inner };
        match client.connect_to(endpoint.clone(), false).await {
            Ok(()) => {
                info!(attempt, %endpoint, "websocket reconnected");
                return;
            }
            Err(e) if e.kind == ErrorKind::Cancelled => return,
            Err(e) => warn!(attempt, error = %e, "reconnect attempt failed"),
        }
    }
}
