use std::time::Duration;

use alloy::{
    pubsub::{ConnectionHandle, PubSubConnect},
    transports::{TransportErrorKind, TransportResult, layers::RetryBackoffLayer, ws::WsConnect},
};
use backoff::{ExponentialBackoffBuilder, backoff::Constant, future::retry};
use tracing::warn;

/// The default retry layer applied to every HTTP RPC client: retries
/// rate-limited and transient transport errors with a backoff.
pub const DEFAULT_RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(8, 300, 330);

/// The delay between WebSocket reconnection attempts.
const WS_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Returns an exponential backoff policy that gives up after roughly
/// fifteen minutes, used for role-level operations such as driver syncs.
pub fn exponential_backoff() -> backoff::ExponentialBackoff {
    ExponentialBackoffBuilder::new().build()
}

/// Returns a constant backoff policy that never gives up.
pub fn constant_backoff(interval: Duration) -> Constant {
    Constant::new(interval)
}

/// Returns true if the given transport error is a connection refusal,
/// which happens when the target endpoint is temporarily unreachable.
pub fn is_connection_refused(kind: &TransportErrorKind) -> bool {
    match kind {
        TransportErrorKind::Custom(err) => err.to_string().contains("Connection refused"),
        _ => false,
    }
}

/// A WebSocket connection that keeps retrying the initial handshake and any
/// subsequent reconnection with a constant delay.
///
/// Alloy drops a pubsub subscription for good once `try_reconnect` fails;
/// wrapping the connector keeps subscriptions alive across node restarts.
#[derive(Debug, Clone)]
pub struct RetryWsConnect(WsConnect);

impl RetryWsConnect {
    /// Create a new retrying WebSocket connector from the given URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self(WsConnect::new(url))
    }
}

impl PubSubConnect for RetryWsConnect {
    fn is_local(&self) -> bool {
        self.0.is_local()
    }

    async fn connect(&self) -> TransportResult<ConnectionHandle> {
        self.0.connect().await
    }

    async fn try_reconnect(&self) -> TransportResult<ConnectionHandle> {
        let inner = &self.0;
        retry(constant_backoff(WS_RECONNECT_DELAY), || async move {
            inner.try_reconnect().await.map_err(|e| {
                warn!(error = %e, "WebSocket reconnection failed, retrying");
                backoff::Error::transient(e)
            })
        })
        .await
    }
}
