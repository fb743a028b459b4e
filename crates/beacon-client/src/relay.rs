//! Relay bridge.
//!
//! Tunnel mode only needs the relay's address: the session opens its gateway
//! transport there and sends `INIT_PROXY` first. Request forwarding opens a
//! short-lived auxiliary transport per call and waits for one `REST_RESULT`.

use crate::transport::{Connector, TransportError, TransportEvent};
use async_trait::async_trait;
use beacon_core::{NORMAL_CLOSURE, ProxyDescriptor, RelayReply, RestRequest};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait RelayBridge: Send + Sync + 'static {
    /// Where tunnels are opened. `None` when no relay is configured.
    fn address(&self) -> Option<&str>;

    /// Execute `request` through `proxy` and return the response body.
    async fn forward(
        &self,
        request: RestRequest,
        proxy: &ProxyDescriptor,
    ) -> Result<serde_json::Value, RelayError>;
}

/// Relay reached over the engine's own connector.
pub struct WsRelay {
    address: Option<String>,
    connector: Arc<dyn Connector>,
    timeout: Duration,
}

impl WsRelay {
    /// Relay bridge over `connector`. Without an address every forward fails.
    pub fn new(address: Option<String>, connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        Self {
            address: address.filter(|a| !a.trim().is_empty()),
            connector,
            timeout,
        }
    }

    async fn round_trip(
        &self,
        address: &str,
        request: RestRequest,
        proxy: &ProxyDescriptor,
    ) -> Result<serde_json::Value, RelayError> {
        let mut transport = self.connector.open(address).await?;
        let frame = serde_json::to_string(&request.into_relay(proxy.params()))?;
        if !transport.send(frame) {
            return Err(RelayError::Closed);
        }

        loop {
            match transport.recv().await {
                Some(TransportEvent::Text(text)) => match serde_json::from_str::<RelayReply>(&text) {
                    Ok(RelayReply::RestResult { data }) => {
                        transport.close(NORMAL_CLOSURE);
                        return Ok(data);
                    }
                    Ok(RelayReply::RelayError { error }) => {
                        transport.close(NORMAL_CLOSURE);
                        return Err(RelayError::Remote(error));
                    }
                    Ok(RelayReply::RelayReady) => {}
                    Err(e) => tracing::debug!("Ignoring unexpected relay frame: {}", e),
                },
                Some(TransportEvent::Failed(reason)) => return Err(RelayError::Failed(reason)),
                Some(TransportEvent::Closed { .. }) | None => return Err(RelayError::Closed),
            }
        }
    }
}

#[async_trait]
impl RelayBridge for WsRelay {
    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    async fn forward(
        &self,
        request: RestRequest,
        proxy: &ProxyDescriptor,
    ) -> Result<serde_json::Value, RelayError> {
        let address = self.address.as_deref().ok_or(RelayError::NotConfigured)?;
        tokio::time::timeout(self.timeout, self.round_trip(address, request, proxy))
            .await
            .map_err(|_| RelayError::Timeout(self.timeout))?
    }
}

/// Error forwarding through the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("no relay address configured")]
    NotConfigured,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("relay reported: {0}")]
    Remote(String),
    #[error("relay closed before replying")]
    Closed,
    #[error("relay connection failed: {0}")]
    Failed(String),
    #[error("relay did not reply within {0:?}")]
    Timeout(Duration),
    #[error("could not encode relay frame: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelConnector, Outgoing};

    fn proxy() -> ProxyDescriptor {
        ProxyDescriptor::new("p1", "10.1.1.1", 8080)
    }

    #[tokio::test]
    async fn forward_round_trip() {
        let (connector, mut accepted) = ChannelConnector::new();
        let relay = WsRelay::new(
            Some("ws://relay".into()),
            Arc::new(connector),
            Duration::from_secs(5),
        );

        let server = tokio::spawn(async move {
            let mut conn = accepted.recv().await.unwrap();
            assert_eq!(conn.url, "ws://relay");
            let Some(Outgoing::Text(text)) = conn.peer.recv().await else {
                panic!("expected request frame");
            };
            let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(frame["type"], "REST_PROXY");
            assert_eq!(frame["method"], "GET");
            assert_eq!(frame["proxy"]["host"], "10.1.1.1");
            conn.peer
                .send_text(r#"{"type":"REST_RESULT","data":{"id":"1","username":"u"}}"#);
            assert_eq!(conn.peer.recv().await, Some(Outgoing::Close(NORMAL_CLOSURE)));
        });

        let data = relay
            .forward(RestRequest::new("GET", "https://api/users/@me"), &proxy())
            .await
            .unwrap();
        assert_eq!(data["username"], "u");
        server.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn forward_times_out() {
        let (connector, mut accepted) = ChannelConnector::new();
        let relay = WsRelay::new(
            Some("ws://relay".into()),
            Arc::new(connector),
            Duration::from_secs(5),
        );
        let _silent = tokio::spawn(async move {
            let _conn = accepted.recv().await;
            std::future::pending::<()>().await;
        });

        let err = relay
            .forward(RestRequest::new("GET", "https://api/x"), &proxy())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout(_)));
    }

    #[tokio::test]
    async fn forward_without_address() {
        let (connector, _accepted) = ChannelConnector::new();
        let relay = WsRelay::new(Some("  ".into()), Arc::new(connector), Duration::from_secs(1));
        assert_eq!(relay.address(), None);
        assert!(matches!(
            relay
                .forward(RestRequest::new("GET", "https://api/x"), &proxy())
                .await,
            Err(RelayError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn relay_error_is_surfaced() {
        let (connector, mut accepted) = ChannelConnector::new();
        let relay = WsRelay::new(
            Some("ws://relay".into()),
            Arc::new(connector),
            Duration::from_secs(5),
        );
        tokio::spawn(async move {
            let mut conn = accepted.recv().await.unwrap();
            conn.peer.recv().await;
            conn.peer
                .send_text(r#"{"type":"RELAY_ERROR","error":"proxy refused"}"#);
            conn.peer.recv().await;
        });

        let err = relay
            .forward(RestRequest::new("GET", "https://api/x"), &proxy())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Remote(ref e) if e == "proxy refused"));
    }
}
