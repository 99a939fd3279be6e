//! Request/reply session over one logical connection
//!
//! A [`Session`] bridges the transport's event model into a send/receive
//! contract:
//!
//! - **Queue**: requests wait in FIFO order; exactly one is in service
//!   (written and awaiting its reply) at any time.
//! - **Correlation**: replies arrive in transmission order and complete the
//!   in-service request; the next request is written only after the reply
//!   callback has returned or the request was abandoned.
//! - **Abandonment**: a request whose waiter timed out or was dropped leaves
//!   the queue; if it was already written, its late reply is counted and
//!   discarded instead of being matched to a later request.
//! - **Lifecycle**: a background task polls the connection; an unexpected
//!   close fails every pending request with `ConnectionLost` and, when the
//!   reconnection policy allows, reconnects after a fixed backoff.
//!
//! ```text
//! send ─► queue ─► in-flight ─► Transport::send
//!                      ▲                │
//!                      │           (poll task)
//!         pump ◄─ callback ◄─ ResponseReceived
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use turbonet_core::{ErrorKind, NetError, NetResult};
use turbonet_protocol::{HttpRequest, HttpResponse};
use turbonet_transport_traits::{ConnectionHandle, Endpoint, Frame, Transport, TransportEvent};

use crate::config::SessionConfig;
use crate::connection::{ConnectionState, establish};

/// Callback receiving the outcome of one request
pub type ReplyCallback = Box<dyn FnOnce(NetResult<HttpResponse>) + Send + 'static>;

struct Pending {
    seq: u64,
    request: Option<HttpRequest>,
    callback: Option<ReplyCallback>,
    enqueued_at: Instant,
    replied: bool,
}

impl Pending {
    fn fail(mut self, error: &NetError) {
        if let Some(callback) = self.callback.take() {
            callback(Err(error.clone()));
        }
    }
}

#[derive(Default)]
struct Shared {
    state: ConnectionState,
    handle: Option<ConnectionHandle>,
    queue: VecDeque<Pending>,
    in_flight: Option<Pending>,
    /// Replies still owed for abandoned in-flight requests
    stale_replies: u64,
    discarded_replies: u64,
    generation: u64,
    closing: bool,
    poll_task: Option<JoinHandle<()>>,
    poll_cancel: CancellationToken,
    reconnect_cancel: CancellationToken,
}

impl Shared {
    /// Detach everything pending; callers fail the result outside the lock.
    fn drain(&mut self) -> Vec<Pending> {
        self.stale_replies = 0;
        let mut pending: Vec<Pending> = self.in_flight.take().into_iter().collect();
        pending.extend(self.queue.drain(..));
        pending
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    config: SessionConfig,
    shared: Mutex<Shared>,
    connect_lock: tokio::sync::Mutex<()>,
    wake: Notify,
    next_seq: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let shared = self.shared.get_mut();
        shared.poll_cancel.cancel();
        shared.reconnect_cancel.cancel();
        let error = NetError::connection_lost("session dropped");
        for pending in shared.drain() {
            pending.fail(&error);
        }
    }
}

/// One logical connection with queued, correlated request/reply exchange.
///
/// Cloning is cheap; clones share the connection. The background poll task
/// holds only a weak reference, so dropping the last clone tears the
/// connection down.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("Session")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &shared.state)
            .field("handle", &shared.handle)
            .field("queued", &shared.queue.len())
            .field("in_flight", &shared.in_flight.as_ref().map(|p| p.seq))
            .finish()
    }
}

/// Abandons a pending request if the waiting future goes away
struct AbandonGuard<'a> {
    session: &'a Session,
    seq: u64,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.abandon(self.seq);
        }
    }
}

/// Returns the session to `Disconnected` if a connect attempt is cut short
struct ConnectingGuard<'a> {
    shared: &'a Mutex<Shared>,
    generation: u64,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut shared = self.shared.lock();
            if shared.generation == self.generation && shared.state == ConnectionState::Connecting {
                shared.state = ConnectionState::Disconnected;
            }
        }
    }
}

impl Session {
    /// Create a disconnected session for `endpoint`
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, endpoint: Endpoint, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                endpoint,
                config,
                shared: Mutex::new(Shared::default()),
                connect_lock: tokio::sync::Mutex::new(()),
                wake: Notify::new(),
                next_seq: AtomicU64::new(1),
            }),
        }
    }

    /// The endpoint this session connects to
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Whether the session is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The active transport handle
    #[must_use]
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.inner.shared.lock().handle
    }

    /// Requests queued or in service
    #[must_use]
    pub fn pending(&self) -> usize {
        let shared = self.inner.shared.lock();
        shared.queue.len() + usize::from(shared.in_flight.is_some())
    }

    /// Late replies to abandoned requests that were dropped so far
    #[must_use]
    pub fn discarded_replies(&self) -> u64 {
        self.inner.shared.lock().discarded_replies
    }

    /// Connect if not already connected.
    ///
    /// Concurrent calls wait for one another; an explicit connect re-enables
    /// reconnection after a previous [`Session::disconnect`].
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the transport reports a failure, or
    /// `TimedOut` if the connection is not confirmed within the connect
    /// timeout.
    pub async fn connect(&self) -> NetResult<()> {
        self.connect_with(true, None).await
    }

    /// Connect, giving up at `deadline` when one is set
    async fn connect_with(&self, explicit: bool, deadline: Option<Instant>) -> NetResult<()> {
        let _serial = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.inner.connect_lock.lock())
                .await
                .map_err(|_| {
                    NetError::timed_out("deadline passed waiting for a connect in progress")
                        .with_operation("connect")
                })?,
            None => self.inner.connect_lock.lock().await,
        };

        let generation = {
            let mut shared = self.inner.shared.lock();
            if shared.state == ConnectionState::Connected {
                return Ok(());
            }
            if explicit {
                shared.closing = false;
                shared.reconnect_cancel.cancel();
                shared.reconnect_cancel = CancellationToken::new();
            } else if shared.closing {
                return Err(NetError::cancelled("session is closing"));
            }
            shared.state = ConnectionState::Connecting;
            shared.generation += 1;
            shared.generation
        };
        debug!(endpoint = %self.inner.endpoint, generation, "connecting");
        let mut guard = ConnectingGuard {
            shared: &self.inner.shared,
            generation,
            armed: true,
        };

        let mut timeout = self.inner.config.timeouts.connect;
        if let Some(deadline) = deadline {
            timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
        }
        let established = establish(
            self.inner.transport.as_ref(),
            &self.inner.endpoint,
            timeout,
            self.inner.config.poll_interval,
        )
        .await;

        let handle = match established {
            Ok(handle) => handle,
            Err(e) => {
                debug!(endpoint = %self.inner.endpoint, error = %e, "connect failed");
                return Err(e);
            }
        };

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
        info!(endpoint = %self.inner.endpoint, %handle, "session connected");

        self.pump().await;
        Ok(())
    }

    /// Queue a request; `on_reply` receives its outcome exactly once.
    ///
    /// Returns once the request is queued. If the session is not connected
    /// it connects first when `connect_on_send` is set.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` when the request could not be queued,
    /// including a failed connect on send, or `TimedOut` when that connect
    /// is not confirmed in time; `on_reply` is not called in either case.
    pub async fn send<F>(&self, request: HttpRequest, on_reply: F) -> NetResult<()>
    where
        F: FnOnce(NetResult<HttpResponse>) + Send + 'static,
    {
        self.submit(request, Box::new(on_reply), None)
            .await
            .map(|_| ())
    }

    /// Send a request and wait for its reply, bounded by the configured
    /// request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` if the connection drops first, or `TimedOut`
    /// when the timeout expires.
    pub async fn request(&self, request: HttpRequest) -> NetResult<HttpResponse> {
        match self.inner.config.timeouts.request {
            Some(timeout) => self.request_with_timeout(request, timeout).await,
            None => self.wait_for_reply(request, None).await,
        }
    }

    /// Send a request and wait at most `timeout` for its reply.
    ///
    /// The timeout covers connecting when the session is not connected yet.
    /// A zero timeout on a session that is not connected fails immediately.
    /// On expiry the request is abandoned, so a late reply cannot complete
    /// another request.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` if not connected (and not allowed to
    /// connect) or if the connection drops, or `TimedOut` on expiry.
    pub async fn request_with_timeout(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> NetResult<HttpResponse> {
        if timeout.is_zero() && !self.is_connected() {
            return Err(NetError::connection_lost("session is not connected")
                .with_operation("request"));
        }
        self.wait_for_reply(request, Some(Instant::now() + timeout))
            .await
    }

    async fn wait_for_reply(
        &self,
        request: HttpRequest,
        deadline: Option<Instant>,
    ) -> NetResult<HttpResponse> {
        let (tx, rx) = oneshot::channel();
        let seq = self
            .submit(
                request,
                Box::new(move |result| {
                    // The waiter may already be gone
                    let _ = tx.send(result);
                }),
                deadline,
            )
            .await?;

        let mut guard = AbandonGuard {
            session: self,
            seq,
            armed: true,
        };
        let received = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, rx).await {
                Ok(received) => received,
                Err(_) => {
                    debug!(seq, "request timed out, abandoning");
                    return Err(NetError::timed_out("no reply before the request timeout")
                        .with_operation("request"));
                }
            },
            None => rx.await,
        };
        guard.armed = false;

        received.unwrap_or_else(|_| {
            Err(NetError::connection_lost("connection closed before the reply")
                .with_operation("request"))
        })
    }

    async fn submit(
        &self,
        request: HttpRequest,
        callback: ReplyCallback,
        deadline: Option<Instant>,
    ) -> NetResult<u64> {
        if !self.is_connected() {
            if !self.inner.config.connect_on_send {
                return Err(
                    NetError::connection_lost("session is not connected").with_operation("send")
                );
            }
            self.connect_with(true, deadline).await.map_err(|e| {
                if e.kind == ErrorKind::ConnectionFailed {
                    NetError::connection_lost(e.message).with_operation("send")
                } else {
                    e
                }
            })?;
        }

        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut shared = self.inner.shared.lock();
            if shared.state != ConnectionState::Connected {
                return Err(
                    NetError::connection_lost("connection lost while sending").with_operation("send")
                );
            }
            shared.queue.push_back(Pending {
                seq,
                request: Some(request),
                callback: Some(callback),
                enqueued_at: Instant::now(),
                replied: false,
            });
            trace!(seq, queued = shared.queue.len(), "request queued");
        }

        self.pump().await;
        Ok(seq)
    }

    /// Write the next queued request if the in-flight slot is free
    async fn pump(&self) {
        let (handle, generation, seq, request) = {
            let mut shared = self.inner.shared.lock();
            if shared.state != ConnectionState::Connected || shared.in_flight.is_some() {
                return;
            }
            let Some(handle) = shared.handle else {
                return;
            };
            let Some(mut next) = shared.queue.pop_front() else {
                return;
            };
            let Some(request) = next.request.take() else {
                return;
            };
            let seq = next.seq;
            trace!(seq, waited = ?next.enqueued_at.elapsed(), "request in service");
            shared.in_flight = Some(next);
            (handle, shared.generation, seq, request)
        };

        if let Err(e) = self
            .inner
            .transport
            .send(handle, Frame::Request(request))
            .await
        {
            warn!(seq, %handle, error = %e, "request write failed");
            self.connection_lost(generation, &e.to_string());
        }
    }

    /// Drop a request whose waiter went away
    fn abandon(&self, seq: u64) {
        let mut shared = self.inner.shared.lock();
        if let Some(index) = shared.queue.iter().position(|p| p.seq == seq) {
            shared.queue.remove(index);
            trace!(seq, "abandoned queued request");
            return;
        }
        let in_service = shared
            .in_flight
            .as_ref()
            .is_some_and(|p| p.seq == seq && !p.replied);
        if in_service {
            shared.in_flight = None;
            shared.stale_replies += 1;
            trace!(seq, stale = shared.stale_replies, "abandoned in-flight request");
            drop(shared);
            // Let the poll task write the next request
            self.inner.wake.notify_one();
        }
    }

    async fn on_response(&self, generation: u64, response: HttpResponse) {
        let callback = {
            let mut shared = self.inner.shared.lock();
            if shared.generation != generation {
                return;
            }
            if shared.stale_replies > 0 {
                shared.stale_replies -= 1;
                shared.discarded_replies += 1;
                trace!(status = response.status, "discarding reply to abandoned request");
                None
            } else {
                match shared.in_flight.as_mut() {
                    Some(slot) if !slot.replied => {
                        slot.replied = true;
                        trace!(seq = slot.seq, status = response.status, "reply received");
                        slot.callback.take()
                    }
                    _ => {
                        shared.discarded_replies += 1;
                        warn!(status = response.status, "discarding unsolicited reply");
                        None
                    }
                }
            }
        };

        if let Some(callback) = callback {
            callback(Ok(response));
            let mut shared = self.inner.shared.lock();
            if shared.generation == generation && shared.in_flight.as_ref().is_some_and(|p| p.replied)
            {
                shared.in_flight = None;
            }
        }
        self.pump().await;
    }

    /// Handle an unexpected close of the connection of `generation`
    fn connection_lost(&self, generation: u64, reason: &str) {
        let (pending, reconnect) = {
            let mut shared = self.inner.shared.lock();
            if shared.generation != generation || shared.state != ConnectionState::Connected {
                return;
            }
            shared.state = ConnectionState::Disconnected;
            shared.handle = None;
            shared.poll_task = None;
            shared.poll_cancel.cancel();
            let reconnect = !shared.closing && self.inner.config.reconnect.enabled;
            (shared.drain(), reconnect.then(|| shared.reconnect_cancel.clone()))
        };

        warn!(
            endpoint = %self.inner.endpoint,
            reason,
            failed = pending.len(),
            "session connection lost"
        );
        let error = NetError::connection_lost(format!("connection lost: {}", reason));
        for p in pending {
            p.fail(&error);
        }

        if let Some(cancel) = reconnect {
            tokio::spawn(reconnect_loop(Arc::downgrade(&self.inner), cancel));
        }
    }

    /// Tear the connection down and stop reconnecting.
    ///
    /// Pending requests fail with `ConnectionLost`.
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
            let timeout = self.inner.config.timeouts.disconnect;
            if tokio::time::timeout(timeout, &mut task).await.is_err() {
                error!(endpoint = %self.inner.endpoint, ?timeout, "poll task did not stop, aborting");
                task.abort();
                outcome = Err(NetError::timed_out("session teardown timed out")
                    .with_operation("disconnect"));
            }
        }

        let pending = {
            let mut shared = self.inner.shared.lock();
            shared.state = ConnectionState::Disconnected;
            shared.drain()
        };
        let error = NetError::connection_lost("session disconnected");
        for p in pending {
            p.fail(&error);
        }
        debug!(endpoint = %self.inner.endpoint, "session disconnected");
        outcome
    }

    async fn release(&self, handle: ConnectionHandle) {
        if let Err(e) = self.inner.transport.close(handle).await {
            warn!(%handle, error = %e, "failed to close connection");
        }
    }
}

async fn poll_loop(
    weak: Weak<Inner>,
    transport: Arc<dyn Transport>,
    handle: ConnectionHandle,
    generation: u64,
    interval: Duration,
    cancel: CancellationToken,
) {
    trace!(%handle, generation, "session poll task started");
    loop {
        let Some(inner) = weak.upgrade() else {
            debug!(%handle, "session dropped, closing connection");
            let _ = transport.close(handle).await;
            break;
        };
        let session = Session { inner };

        let polled = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = session.inner.wake.notified() => {
                session.pump().await;
                continue;
            }
            polled = transport.poll(handle, interval) => polled,
        };

        match polled {
            Ok(Some(TransportEvent::ResponseReceived { response, .. })) => {
                session.on_response(generation, response).await;
            }
            Ok(Some(TransportEvent::Closed { reason, .. })) => {
                session.connection_lost(generation, &reason);
                break;
            }
            Ok(Some(event)) => trace!(event = event.name(), "ignoring session event"),
            Ok(None) => {}
            Err(e) => {
                session.connection_lost(generation, &e.to_string());
                break;
            }
        }
    }
    trace!(%handle, generation, "session poll task stopped");
}

async fn reconnect_loop(weak: Weak<Inner>, cancel: CancellationToken) {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let policy = match weak.upgrade() {
            Some(inner) => inner.config.reconnect,
            None => return,
        };
        if !policy.allows(attempt) {
            warn!(attempts = attempt - 1, "giving up on reconnection");
            return;
        }

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(policy.backoff) => {}
        }

        let Some(inner) = weak.upgrade() else {
            return;
        };
        let session = Session { inner };
        match session.connect_with(false, None).await {
            Ok(()) => {
                info!(attempt, endpoint = %session.inner.endpoint, "session reconnected");
                return;
            }
            Err(e) if e.kind == ErrorKind::Cancelled => return,
            Err(e) => warn!(attempt, error = %e, "reconnect attempt failed"),
        }
    }
}
