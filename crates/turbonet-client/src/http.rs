//! HTTP client bound to one base endpoint

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use turbonet_core::{NetError, NetResult};
use turbonet_protocol::{HttpRequest, HttpResponse};
use turbonet_transport_traits::{Endpoint, Transport};

use crate::config::SessionConfig;
use crate::session::Session;

/// HTTP client over a [`Session`].
///
/// Every request gets a `Host` header for the base endpoint unless it
/// already carries one.
#[derive(Debug, Clone)]
pub struct HttpClient {
    session: Session,
    host: String,
}

impl HttpClient {
    /// Create a client for `base` (an `http` or `https` URL).
    ///
    /// Nothing is connected until the first request or [`HttpClient::connect`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unparsable URLs and for WebSocket
    /// schemes.
    pub fn new(transport: Arc<dyn Transport>, base: &str, config: SessionConfig) -> NetResult<Self> {
        let endpoint = Endpoint::parse(base)?;
        if endpoint.is_websocket() {
            return Err(NetError::configuration(format!(
                "'{}' is a WebSocket endpoint, use WsClient",
                base
            )));
        }
        let host = endpoint.host_header();
        Ok(Self {
            session: Session::new(transport, endpoint, config),
            host,
        })
    }

    /// The underlying session
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Connect ahead of the first request.
    ///
    /// # Errors
    ///
    /// See [`Session::connect`].
    pub async fn connect(&self) -> NetResult<()> {
        self.session.connect().await
    }

    /// Queue a request; `on_reply` receives its outcome exactly once.
    ///
    /// # Errors
    ///
    /// See [`Session::send`].
    pub async fn send<F>(&self, request: HttpRequest, on_reply: F) -> NetResult<()>
    where
        F: FnOnce(NetResult<HttpResponse>) + Send + 'static,
    {
        self.session.send(self.prepare(request), on_reply).await
    }

    /// Send a request and wait for the reply.
    ///
    /// # Errors
    ///
    /// See [`Session::request`].
    pub async fn request(&self, request: HttpRequest) -> NetResult<HttpResponse> {
        self.session.request(self.prepare(request)).await
    }

    /// Send a request and wait at most `timeout` for the reply.
    ///
    /// # Errors
    ///
    /// See [`Session::request_with_timeout`].
    pub async fn request_with_timeout(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> NetResult<HttpResponse> {
        self.session
            .request_with_timeout(self.prepare(request), timeout)
            .await
    }

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// See [`Session::disconnect`].
    pub async fn disconnect(&self) -> NetResult<()> {
        self.session.disconnect().await
    }

    /// Connect, send one request, wait for the reply and disconnect.
    ///
    /// # Errors
    ///
    /// Returns the construction, connect or request error. A failed
    /// teardown after a successful reply is only logged.
    pub async fn fetch(
        transport: Arc<dyn Transport>,
        base: &str,
        request: HttpRequest,
    ) -> NetResult<HttpResponse> {
        let client = Self::new(transport, base, SessionConfig::default())?;
        let reply = client.request(request).await;
        if let Err(e) = client.disconnect().await {
            warn!(base, error = %e, "teardown after fetch failed");
        }
        reply
    }

    /// Send one request and tear the client down once `on_reply` has run.
    ///
    /// # Errors
    ///
    /// Returns the construction or connect error; `on_reply` is not called
    /// in that case.
    pub async fn dispatch<F>(
        transport: Arc<dyn Transport>,
        base: &str,
        request: HttpRequest,
        on_reply: F,
    ) -> NetResult<()>
    where
        F: FnOnce(NetResult<HttpResponse>) + Send + 'static,
    {
        let client = Self::new(transport, base, SessionConfig::default())?;
        let owner = client.clone();
        let base = base.to_string();
        let sent = client
            .send(request, move |reply| {
                on_reply(reply);
                tokio::spawn(async move {
                    if let Err(e) = owner.disconnect().await {
                        warn!(base = %base, error = %e, "teardown after dispatch failed");
                    }
                });
            })
            .await;
        if sent.is_err() {
            // The callback owning the clone was dropped with the request
            client.disconnect().await.ok();
        }
        sent
    }

    fn prepare(&self, request: HttpRequest) -> HttpRequest {
        if request.headers.contains("host") {
            request
        } else {
            debug!(host = %self.host, "adding Host header");
            request.with_header("Host", self.host.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbonet_core::ErrorKind;
    use turbonet_transport::MemoryTransport;

    fn transport() -> Arc<dyn Transport> {
        Arc::new(MemoryTransport::new())
    }

    #[test]
    fn test_rejects_websocket_base() {
        let err = HttpClient::new(transport(), "ws://127.0.0.1:8000", SessionConfig::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_rejects_invalid_base() {
        let err = HttpClient::new(transport(), "not a url", SessionConfig::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_host_header_added_once() {
        let client =
            HttpClient::new(transport(), "http://example.com:8080", SessionConfig::default())
                .unwrap();

        let prepared = client.prepare(HttpRequest::get("/"));
        assert_eq!(prepared.header("host"), Some("example.com:8080"));

        let explicit = client.prepare(HttpRequest::get("/").with_header("Host", "other"));
        assert_eq!(explicit.header("host"), Some("other"));
        assert_eq!(explicit.headers.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_refused() {
        let err = HttpClient::fetch(transport(), "http://127.0.0.1:7001", HttpRequest::get("/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConnectionLost);
    }
}
