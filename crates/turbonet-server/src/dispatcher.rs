//! Event dispatcher: maps transport events onto registered handlers
//!
//! Two routers live here, one for HTTP `(method, path)` routes and one for
//! WebSocket `(method, id)` routes. Both are populated during a registration
//! phase through `&mut self`; afterwards the dispatcher is only read.
//!
//! ```text
//! RequestReceived  ─► concat(method, path) ─► http router ─► handler | fallback | 404
//! WebSocketOpened  ─► concat(GET, path)    ─► http router ─► handler | accept
//! MessageReceived  ─► Envelope::parse      ─► concat(method, id) ─► ws router ─► handler | ws_fallback | drop
//! ```
//!
//! Handlers are synchronous. They write through their context and the
//! dispatcher returns the resulting [`Outbound`] actions.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use turbonet_core::{NetResult, Params, Router, concat};
use turbonet_protocol::{Envelope, HttpRequest, HttpResponse, Method};
use turbonet_transport_traits::ConnectionHandle;

use crate::context::{HttpContext, Outbound, WsContext};

/// Handler for HTTP requests and WebSocket handshakes
pub type HttpHandler = Arc<dyn Fn(&mut HttpContext, &Params) + Send + Sync>;

/// Handler for WebSocket envelopes
pub type WsHandler = Arc<dyn Fn(&mut WsContext, &Envelope, &Params) + Send + Sync>;

/// Observer called once per dispatched request or envelope
pub type ApiObserver = Arc<dyn Fn(&ApiCall<'_>) + Send + Sync>;

/// Hook called when a connection closes
pub type CloseHook = Arc<dyn Fn(ConnectionHandle) + Send + Sync>;

/// Which side of the dispatcher an [`ApiCall`] came through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKind {
    /// HTTP request
    Http,
    /// WebSocket envelope
    WebSocket,
}

/// What the API observer sees for each dispatched call
#[derive(Debug, Clone, Copy)]
pub struct ApiCall<'a> {
    /// HTTP or WebSocket
    pub kind: ApiKind,
    /// Connection the call arrived on
    pub connection: ConnectionHandle,
    /// HTTP method or envelope method
    pub method: &'a str,
    /// Request path or envelope id
    pub target: &'a str,
    /// Raw request body or text frame
    pub body: &'a [u8],
}

/// Routes HTTP requests and WebSocket envelopes to handlers
#[derive(Default)]
pub struct Dispatcher {
    http: Router<HttpHandler>,
    ws: Router<WsHandler>,
    fallback: Option<HttpHandler>,
    ws_fallback: Option<WsHandler>,
    api_observer: Option<ApiObserver>,
    on_ws_close: Option<CloseHook>,
    on_http_close: Option<CloseHook>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("http", &self.http)
            .field("ws", &self.ws)
            .field("fallback", &self.fallback.is_some())
            .field("ws_fallback", &self.ws_fallback.is_some())
            .field("api_observer", &self.api_observer.is_some())
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no routes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an HTTP handler for `(method, path)`.
    ///
    /// The same handler also receives WebSocket handshakes for `path` when
    /// registered under `GET`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid pattern.
    pub fn on_http<F>(
        &mut self,
        method: impl Into<Method>,
        path: &str,
        handler: F,
    ) -> NetResult<&mut Self>
    where
        F: Fn(&mut HttpContext, &Params) + Send + Sync + 'static,
    {
        let method = method.into();
        self.http.route(method.as_str(), path, Arc::new(handler))?;
        Ok(self)
    }

    /// Register a WebSocket handler for envelopes with `method` and an id
    /// matching `id`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid pattern.
    pub fn on_ws<F>(&mut self, method: &str, id: &str, handler: F) -> NetResult<&mut Self>
    where
        F: Fn(&mut WsContext, &Envelope, &Params) + Send + Sync + 'static,
    {
        self.ws.route(method, id, Arc::new(handler))?;
        Ok(self)
    }

    /// Handler for HTTP requests that match no route
    pub fn fallback<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut HttpContext, &Params) + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// Handler for envelopes that match no route
    pub fn ws_fallback<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut WsContext, &Envelope, &Params) + Send + Sync + 'static,
    {
        self.ws_fallback = Some(Arc::new(handler));
        self
    }

    /// Observe every dispatched request and well-formed envelope
    pub fn on_api<F>(&mut self, observer: F) -> &mut Self
    where
        F: Fn(&ApiCall<'_>) + Send + Sync + 'static,
    {
        self.api_observer = Some(Arc::new(observer));
        self
    }

    /// Hook for closed WebSocket connections
    pub fn on_ws_close<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(ConnectionHandle) + Send + Sync + 'static,
    {
        self.on_ws_close = Some(Arc::new(hook));
        self
    }

    /// Hook for closed plain HTTP connections
    pub fn on_http_close<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(ConnectionHandle) + Send + Sync + 'static,
    {
        self.on_http_close = Some(Arc::new(hook));
        self
    }

    /// Remove an HTTP route
    pub fn unregister_http(&mut self, method: impl Into<Method>, path: &str) -> bool {
        self.http.unregister(method.into().as_str(), path)
    }

    /// Remove a WebSocket route
    pub fn unregister_ws(&mut self, method: &str, id: &str) -> bool {
        self.ws.unregister(method, id)
    }

    /// Registered `(http, ws)` patterns, for startup logging
    #[must_use]
    pub fn routes(&self) -> (Vec<String>, Vec<String>) {
        (self.http.patterns(), self.ws.patterns())
    }

    /// Dispatch an HTTP request or WebSocket handshake.
    ///
    /// The matched handler (or the fallback) runs exactly once. A plain
    /// request that nothing handles gets `404 not found`; an unhandled
    /// handshake is accepted without a response.
    pub fn dispatch_http(
        &self,
        connection: ConnectionHandle,
        request: HttpRequest,
        websocket: bool,
    ) -> Vec<Outbound> {
        let key = request.dispatch_key();

        if let Some(observer) = &self.api_observer {
            observer(&ApiCall {
                kind: ApiKind::Http,
                connection,
                method: request.method.as_str(),
                target: request.path(),
                body: &request.body,
            });
        }

        let mut ctx = HttpContext::new(connection, request, websocket);
        match self.http.resolve(&key) {
            Ok(found) => {
                trace!(%connection, key = %key, websocket, "dispatching http route");
                (found.handler)(&mut ctx, &found.params);
            }
            Err(_) => match &self.fallback {
                Some(fallback) => {
                    trace!(%connection, key = %key, "dispatching http fallback");
                    fallback(&mut ctx, &Params::new());
                }
                None if websocket => {
                    trace!(%connection, key = %key, "accepting unrouted websocket handshake");
                }
                None => {
                    debug!(%connection, key = %key, "no route, responding 404");
                    ctx.send(HttpResponse::not_found());
                }
            },
        }
        ctx.into_outbound()
    }

    /// Dispatch one WebSocket text frame.
    ///
    /// Frames that are not a JSON object with string `id` and `method` are
    /// dropped silently.
    pub fn dispatch_ws(&self, connection: ConnectionHandle, payload: &[u8]) -> Vec<Outbound> {
        let envelope = match Envelope::parse(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                trace!(%connection, error = %e, "dropping malformed envelope");
                return Vec::new();
            }
        };
        let method = match envelope.require_method() {
            Ok(method) => method,
            Err(e) => {
                trace!(%connection, error = %e, "dropping envelope without method");
                return Vec::new();
            }
        };

        if let Some(observer) = &self.api_observer {
            observer(&ApiCall {
                kind: ApiKind::WebSocket,
                connection,
                method,
                target: &envelope.id,
                body: payload,
            });
        }

        let key = concat(method, &envelope.id);
        let mut ctx = WsContext::new(connection);
        match self.ws.resolve(&key) {
            Ok(found) => {
                trace!(%connection, key = %key, "dispatching ws route");
                (found.handler)(&mut ctx, &envelope, &found.params);
            }
            Err(_) => match &self.ws_fallback {
                Some(fallback) => {
                    trace!(%connection, key = %key, "dispatching ws fallback");
                    fallback(&mut ctx, &envelope, &Params::new());
                }
                None => warn!(%connection, key = %key, "dropping unrouted envelope"),
            },
        }
        ctx.into_outbound()
    }

    /// Run the close hook matching the connection kind
    pub fn connection_closed(&self, connection: ConnectionHandle, websocket: bool) {
        let hook = if websocket {
            &self.on_ws_close
        } else {
            &self.on_http_close
        };
        if let Some(hook) = hook {
            hook(connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use turbonet_transport_traits::Frame;

    const CONN: ConnectionHandle = ConnectionHandle(1);

    fn response(outbound: &[Outbound]) -> &HttpResponse {
        match outbound {
            [
                Outbound::Send {
                    frame: Frame::Response(response),
                    ..
                },
            ] => response,
            other => panic!("expected a single response, got {:?}", other),
        }
    }

    fn message(outbound: &[Outbound]) -> serde_json::Value {
        match outbound {
            [
                Outbound::Send {
                    frame: Frame::Message(payload),
                    ..
                },
            ] => serde_json::from_slice(payload).unwrap(),
            other => panic!("expected a single message, got {:?}", other),
        }
    }

    #[test]
    fn test_http_route_with_params() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .on_http("GET", "/items/{id}", |ctx, params| {
                let id = params.get("id").unwrap_or_default().to_string();
                ctx.send_status(200, id);
            })
            .unwrap();

        let out = dispatcher.dispatch_http(CONN, HttpRequest::get("/items/42?x=1"), false);
        assert_eq!(response(&out).body_text(), Some("42"));
    }

    #[test]
    fn test_http_unrouted_is_404() {
        let dispatcher = Dispatcher::new();
        let out = dispatcher.dispatch_http(CONN, HttpRequest::get("/missing"), false);
        let response = response(&out);
        assert_eq!(response.status, 404);
        assert_eq!(response.body_text(), Some("not found"));
    }

    #[test]
    fn test_http_fallback_replaces_404() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.fallback(|ctx, params| {
            assert!(params.is_empty());
            ctx.send_status(418, "teapot");
        });
        let out = dispatcher.dispatch_http(CONN, HttpRequest::post("/anything"), false);
        assert_eq!(response(&out).status, 418);
    }

    #[test]
    fn test_unrouted_handshake_is_accepted_silently() {
        let dispatcher = Dispatcher::new();
        let out = dispatcher.dispatch_http(CONN, HttpRequest::get("/chat"), true);
        assert!(out.is_empty());
    }

    #[test]
    fn test_ws_route() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .on_ws("POST", "hello-world", |ctx, envelope, _| {
                ctx.send(&json!({"id": envelope.id, "reply": "hi"})).unwrap();
            })
            .unwrap();

        let out = dispatcher.dispatch_ws(CONN, br#"{"id":"hello-world","method":"POST"}"#);
        assert_eq!(message(&out), json!({"id": "hello-world", "reply": "hi"}));
    }

    #[test]
    fn test_malformed_envelopes_are_dropped() {
        let calls = Arc::new(Mutex::new(0));
        let mut dispatcher = Dispatcher::new();
        let seen = Arc::clone(&calls);
        dispatcher.ws_fallback(move |_, _, _| *seen.lock().unwrap() += 1);

        for frame in [
            &b"not json"[..],
            br#"[1, 2]"#,
            br#"{"method":"POST"}"#,
            br#"{"id":"x"}"#,
            br#"{"id":5,"method":"POST"}"#,
        ] {
            assert!(dispatcher.dispatch_ws(CONN, frame).is_empty());
        }
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_api_observer_sees_each_call_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        let log = Arc::clone(&seen);
        dispatcher.on_api(move |call| {
            log.lock()
                .unwrap()
                .push((call.kind, call.method.to_string(), call.target.to_string()));
        });

        dispatcher.dispatch_http(CONN, HttpRequest::get("/a?b=c"), false);
        dispatcher.dispatch_ws(CONN, br#"{"id":"x","method":"GET"}"#);
        dispatcher.dispatch_ws(CONN, b"garbage");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (ApiKind::Http, "GET".to_string(), "/a".to_string()),
                (ApiKind::WebSocket, "GET".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn test_close_hooks_by_kind() {
        let closed = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        let ws = Arc::clone(&closed);
        let http = Arc::clone(&closed);
        dispatcher
            .on_ws_close(move |c| ws.lock().unwrap().push(("ws", c)))
            .on_http_close(move |c| http.lock().unwrap().push(("http", c)));

        dispatcher.connection_closed(ConnectionHandle(1), true);
        dispatcher.connection_closed(ConnectionHandle(2), false);
        assert_eq!(
            *closed.lock().unwrap(),
            vec![("ws", ConnectionHandle(1)), ("http", ConnectionHandle(2))]
        );
    }

    #[test]
    fn test_unregister_and_routes() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.on_http("GET", "/a", |_, _| {}).unwrap();
        dispatcher.on_ws("POST", "b", |_, _, _| {}).unwrap();
        assert_eq!(
            dispatcher.routes(),
            (vec!["/a/GET".to_string()], vec!["/b/POST".to_string()])
        );

        assert!(dispatcher.unregister_http("GET", "/a"));
        assert!(dispatcher.unregister_ws("POST", "b"));
        let out = dispatcher.dispatch_http(CONN, HttpRequest::get("/a"), false);
        assert_eq!(response(&out).status, 404);
    }
}
