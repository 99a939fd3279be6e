//! Connection state and establishment shared by the clients

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};
use turbonet_core::{NetError, NetResult};
use turbonet_transport_traits::{ConnectionHandle, Endpoint, Transport, TransportEvent};

/// Lifecycle state of a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection
    #[default]
    Disconnected,
    /// Waiting for the transport to report the connection
    Connecting,
    /// Connected; the transport handle is usable
    Connected,
    /// Explicit teardown in progress
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Open a connection and wait for the transport to confirm it.
///
/// The handle is closed again on failure.
pub(crate) async fn establish(
    transport: &dyn Transport,
    endpoint: &Endpoint,
    timeout: Duration,
    poll_interval: Duration,
) -> NetResult<ConnectionHandle> {
    let deadline = Instant::now() + timeout;
    let handle = transport
        .connect(endpoint)
        .await
        .map_err(|e| NetError::connection_failed(e.to_string()).with_operation("connect"))?;

    let outcome = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break Err(NetError::timed_out(format!(
                "connection to {} not established within {:?}",
                endpoint, timeout
            )));
        }
        match transport.poll(handle, remaining.min(poll_interval)).await {
            Ok(Some(TransportEvent::Connected { result: Ok(()), .. })) => break Ok(()),
            Ok(Some(TransportEvent::Connected {
                result: Err(reason),
                ..
            })) => {
                break Err(NetError::connection_failed(format!(
                    "connection to {} failed: {}",
                    endpoint, reason
                )));
            }
            Ok(Some(event)) => trace!(event = event.name(), "ignoring event before connect"),
            Ok(None) => {}
            Err(e) => break Err(NetError::connection_failed(e.to_string())),
        }
    };

    match outcome {
        Ok(()) => {
            debug!(%handle, %endpoint, "connection established");
            Ok(handle)
        }
        Err(e) => {
            if let Err(close_err) = transport.close(handle).await {
                warn!(%handle, error = %close_err, "failed to release connection");
            }
            Err(e.with_operation("connect"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbonet_core::ErrorKind;
    use turbonet_transport::MemoryTransport;

    const STEP: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_establish_refused() {
        let transport = MemoryTransport::new();
        let endpoint = Endpoint::parse("http://127.0.0.1:1").unwrap();
        let err = establish(&transport, &endpoint, Duration::from_secs(1), STEP)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_establish_ok() {
        let transport = MemoryTransport::new();
        let endpoint = Endpoint::parse("http://127.0.0.1:2").unwrap();
        transport.bind(&endpoint).await.unwrap();

        let handle =
            tokio_test::assert_ok!(establish(&transport, &endpoint, Duration::from_secs(1), STEP).await);
        assert_eq!(transport.connection_count(), 2);
        transport.close(handle).await.unwrap();
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Closing.to_string(), "closing");
    }
}
