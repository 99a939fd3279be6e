//! Server poll loop
//!
//! A [`Server`] owns one listener on a [`Transport`]. Its loop polls the
//! listener, hands every event to the [`Dispatcher`] and writes the actions
//! the handler produced before polling again, so handler invocation for one
//! event always completes before the next event is seen.
//!
//! Other tasks talk to a running server through a [`ServerHandle`]: pushed
//! messages land in an outbox that the loop drains between polls.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use turbonet_core::{NetError, NetResult};
use turbonet_transport_traits::{ConnectionHandle, Endpoint, Frame, Transport, TransportEvent};

use crate::config::ServerConfig;
use crate::context::Outbound;
use crate::dispatcher::Dispatcher;

/// Observer for every outgoing WebSocket payload
pub type SentHook = Arc<dyn Fn(ConnectionHandle, &[u8]) + Send + Sync>;

enum Step {
    Shutdown,
    Outbound(Outbound),
    Polled(NetResult<Option<TransportEvent>>),
}

/// HTTP and WebSocket server driving a [`Dispatcher`]
pub struct Server {
    transport: Arc<dyn Transport>,
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    on_ws_sent: Option<SentHook>,
    listener: Option<ConnectionHandle>,
    websockets: HashSet<ConnectionHandle>,
    outbox_tx: mpsc::UnboundedSender<Outbound>,
    outbox_rx: mpsc::UnboundedReceiver<Outbound>,
    shutdown: CancellationToken,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("listener", &self.listener)
            .field("websockets", &self.websockets.len())
            .finish()
    }
}

impl Server {
    /// Create a server; nothing is bound until [`Server::listen`] or [`Server::run`]
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        config: ServerConfig,
        dispatcher: Dispatcher,
    ) -> Self {
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            config,
            dispatcher: Arc::new(dispatcher),
            on_ws_sent: None,
            listener: None,
            websockets: HashSet::new(),
            outbox_tx,
            outbox_rx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Observe every outgoing WebSocket payload
    #[must_use]
    pub fn on_ws_sent<F>(mut self, hook: F) -> Self
    where
        F: Fn(ConnectionHandle, &[u8]) + Send + Sync + 'static,
    {
        self.on_ws_sent = Some(Arc::new(hook));
        self
    }

    /// Server configuration
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The bound listener, if any
    #[must_use]
    pub fn listener(&self) -> Option<ConnectionHandle> {
        self.listener
    }

    /// Handle for pushing messages and requesting shutdown from other tasks
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            outbox: self.outbox_tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Bind the configured endpoint. Calling it again returns the existing
    /// listener.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the endpoint is invalid or already bound.
    pub async fn listen(&mut self) -> NetResult<ConnectionHandle> {
        if let Some(listener) = self.listener {
            return Ok(listener);
        }

        let endpoint = Endpoint::parse(&self.config.endpoint())?;
        let listener = self
            .transport
            .bind(&endpoint)
            .await
            .map_err(|e| NetError::from(e).with_operation("listen"))?;
        self.listener = Some(listener);

        let (http_routes, ws_routes) = self.dispatcher.routes();
        info!(
            server = %self.config.name,
            %endpoint,
            transport = %self.transport.transport_type(),
            http_routes = http_routes.len(),
            ws_routes = ws_routes.len(),
            "server listening"
        );
        debug!(?http_routes, ?ws_routes, "registered routes");
        Ok(listener)
    }

    /// Poll until shutdown is requested, binding first if needed.
    ///
    /// # Errors
    ///
    /// Returns the bind error, or the transport error that ended the loop.
    pub async fn run(&mut self) -> NetResult<()> {
        let listener = self.listen().await?;
        let transport = Arc::clone(&self.transport);
        let shutdown = self.shutdown.clone();
        let interval = self.config.poll_interval;

        loop {
            let step = tokio::select! {
                biased;
                () = shutdown.cancelled() => Step::Shutdown,
                Some(action) = self.outbox_rx.recv() => Step::Outbound(action),
                polled = transport.poll(listener, interval) => {
                    Step::Polled(polled.map_err(NetError::from))
                }
            };

            match step {
                Step::Shutdown => break,
                Step::Outbound(action) => self.flush(vec![action]).await,
                Step::Polled(Ok(Some(event))) => self.handle_event(event).await,
                Step::Polled(Ok(None)) => {}
                Step::Polled(Err(e)) => {
                    error!(server = %self.config.name, error = %e, "listener poll failed");
                    self.listener = None;
                    return Err(e.with_operation("poll"));
                }
            }
        }

        self.teardown(listener).await;
        Ok(())
    }

    /// Run on a spawned task
    #[must_use]
    pub fn start(mut self) -> RunningServer {
        let handle = self.handle();
        let stop_timeout = self.config.stop_timeout;
        let task = tokio::spawn(async move { self.run().await });
        RunningServer {
            handle,
            task,
            stop_timeout,
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        trace!(event = event.name(), connection = %event.connection(), "server event");
        let actions = match event {
            TransportEvent::RequestReceived {
                connection,
                request,
            } => self.dispatcher.dispatch_http(connection, request, false),
            TransportEvent::WebSocketOpened {
                connection,
                request,
            } => {
                debug!(%connection, path = request.path(), "websocket opened");
                self.websockets.insert(connection);
                self.dispatcher.dispatch_http(connection, request, true)
            }
            TransportEvent::MessageReceived {
                connection,
                payload,
            } => self.dispatcher.dispatch_ws(connection, &payload),
            TransportEvent::Closed { connection, reason } => {
                let websocket = self.websockets.remove(&connection);
                debug!(%connection, websocket, reason = %reason, "connection closed");
                self.dispatcher.connection_closed(connection, websocket);
                return;
            }
            other => {
                warn!(event = other.name(), "unexpected event on listener");
                return;
            }
        };
        self.flush(actions).await;
    }

    async fn flush(&mut self, actions: Vec<Outbound>) {
        for action in actions {
            match action {
                Outbound::Send { connection, frame } => {
                    if let (Frame::Message(payload), Some(hook)) = (&frame, &self.on_ws_sent) {
                        hook(connection, &payload[..]);
                    }
                    if let Err(e) = self.transport.send(connection, frame).await {
                        warn!(%connection, error = %e, "failed to write frame");
                    }
                }
                Outbound::Close { connection } => {
                    if let Err(e) = self.transport.close(connection).await {
                        warn!(%connection, error = %e, "failed to close connection");
                    }
                    let websocket = self.websockets.remove(&connection);
                    self.dispatcher.connection_closed(connection, websocket);
                }
            }
        }
    }

    async fn teardown(&mut self, listener: ConnectionHandle) {
        // Messages pushed before shutdown still go out
        while let Ok(action) = self.outbox_rx.try_recv() {
            self.flush(vec![action]).await;
        }
        if let Err(e) = self.transport.close(listener).await {
            error!(%listener, error = %e, "failed to close listener");
        }
        self.listener = None;
        self.websockets.clear();
        info!(server = %self.config.name, "server stopped");
    }
}

/// Cloneable handle to a server loop
#[derive(Debug, Clone)]
pub struct ServerHandle {
    outbox: mpsc::UnboundedSender<Outbound>,
    shutdown: CancellationToken,
}

impl ServerHandle {
    /// Push a JSON text frame to a WebSocket connection.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be encoded, or
    /// `ConnectionLost` once the server is gone.
    pub fn push<T: Serialize + ?Sized>(
        &self,
        connection: ConnectionHandle,
        value: &T,
    ) -> NetResult<()> {
        let payload = serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| NetError::serialization(e.to_string()))?;
        self.submit(Outbound::Send {
            connection,
            frame: Frame::Message(payload),
        })
    }

    /// Ask the loop to close a connection.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` once the server is gone.
    pub fn close(&self, connection: ConnectionHandle) -> NetResult<()> {
        self.submit(Outbound::Close { connection })
    }

    /// Request shutdown; the loop exits after its current step
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether shutdown was requested
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn submit(&self, action: Outbound) -> NetResult<()> {
        if self.is_shutdown() {
            return Err(NetError::connection_lost("server is shutting down"));
        }
        self.outbox
            .send(action)
            .map_err(|_| NetError::connection_lost("server loop has exited"))
    }
}

/// A server running on its own task
#[derive(Debug)]
pub struct RunningServer {
    handle: ServerHandle,
    task: JoinHandle<NetResult<()>>,
    stop_timeout: Duration,
}

impl RunningServer {
    /// Handle to the running loop
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Request shutdown and wait for the loop to exit.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the loop does not exit within the configured
    /// stop timeout (the task is aborted), or the error the loop ended with.
    pub async fn stop(self) -> NetResult<()> {
        self.handle.shutdown();
        let mut task = self.task;
        match tokio::time::timeout(self.stop_timeout, &mut task).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                error!(timeout = ?self.stop_timeout, "server did not stop in time, aborting");
                task.abort();
                Err(NetError::timed_out("server stop timed out").with_operation("stop"))
            }
        }
    }

    /// Wait for the loop to exit on its own
    ///
    /// # Errors
    ///
    /// Returns the error the loop ended with.
    pub async fn join(self) -> NetResult<()> {
        flatten(self.task.await)
    }
}

fn flatten(joined: Result<NetResult<()>, tokio::task::JoinError>) -> NetResult<()> {
    joined.map_err(|e| NetError::internal(format!("server task failed: {}", e)))?
}
