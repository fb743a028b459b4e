//! Transport seam.
//!
//! The engine never touches a socket directly. A [`Connector`] hands out a
//! [`Transport`], which is a pair of channels: text frames and close requests
//! go out, text frames and closure notices come back. The WebSocket
//! connector runs a pump task per socket; [`ChannelConnector`] hands the far
//! end to the caller instead, which is how the engine is driven in tests.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Something that happened on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    /// The remote end closed, with a close code when it sent one.
    Closed { code: Option<u16>, reason: String },
    /// The stream failed without a closing handshake.
    Failed(String),
}

/// A request from the engine to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    Close(u16),
}

/// The engine's end of one connection.
#[derive(Debug)]
pub struct Transport {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// The wire's end of one connection.
#[derive(Debug)]
pub struct Peer {
    events: mpsc::UnboundedSender<TransportEvent>,
    outgoing: mpsc::UnboundedReceiver<Outgoing>,
}

impl Transport {
    /// A connected transport/peer pair.
    pub fn pair() -> (Transport, Peer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        (
            Transport {
                outgoing: out_tx,
                events: ev_rx,
            },
            Peer {
                events: ev_tx,
                outgoing: out_rx,
            },
        )
    }

    /// Queue a text frame. Returns false once the wire side is gone.
    pub fn send(&self, text: String) -> bool {
        self.outgoing.send(Outgoing::Text(text)).is_ok()
    }

    /// Request a closing handshake with `code`.
    pub fn close(&self, code: u16) {
        let _ = self.outgoing.send(Outgoing::Close(code));
    }

    /// Next event from the socket, or `None` once the pump is gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

impl Peer {
    /// Push a text frame to the session.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Text(text.into())).is_ok()
    }

    /// Close from the remote side.
    pub fn close(&self, code: Option<u16>, reason: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    /// Report a socket failure.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Failed(reason.into()));
    }

    /// Next frame or close the session sent.
    pub async fn recv(&mut self) -> Option<Outgoing> {
        self.outgoing.recv().await
    }

    /// True once the engine has dropped its end.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<Transport, TransportError>;
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Transport, TransportError> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Open {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!("Opened websocket to {}", url);

        let (transport, peer) = Transport::pair();
        tokio::spawn(pump(ws, peer));
        Ok(transport)
    }
}

async fn pump(ws: WebSocketStream<MaybeTlsStream<TcpStream>>, mut peer: Peer) {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            out = peer.recv() => match out {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        peer.fail(e.to_string());
                        break;
                    }
                }
                Some(Outgoing::Close(code)) => {
                    let frame = CloseFrame {
                        code: code.into(),
                        reason: String::new().into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                }
                // Engine dropped its end
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },

            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if !peer.send_text(text.as_str()) {
                        let _ = sink.close().await;
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                        None => (None, String::new()),
                    };
                    peer.close(code, reason);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    peer.fail(e.to_string());
                    break;
                }
                None => {
                    peer.close(None, "stream ended");
                    break;
                }
            },
        }
    }

    tracing::debug!("Websocket pump finished");
}

/// A newly opened in-memory connection.
#[derive(Debug)]
pub struct Accepted {
    pub url: String,
    pub peer: Peer,
}

/// In-memory connector: every `open` yields an [`Accepted`] on the paired receiver.
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    accepted: mpsc::UnboundedSender<Accepted>,
}

impl ChannelConnector {
    /// Connector plus the receiver that yields each opened connection.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Accepted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { accepted: tx }, rx)
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, url: &str) -> Result<Transport, TransportError> {
        let (transport, peer) = Transport::pair();
        self.accepted
            .send(Accepted {
                url: url.to_string(),
                peer,
            })
            .map_err(|_| TransportError::Refused(url.to_string()))?;
        Ok(transport)
    }
}

/// Error opening a transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open {url}: {reason}")]
    Open { url: String, reason: String },
    #[error("connection to {0} refused")]
    Refused(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_carries_both_directions() {
        let (mut transport, mut peer) = Transport::pair();

        assert!(transport.send("out".into()));
        transport.close(1000);
        assert_eq!(peer.recv().await, Some(Outgoing::Text("out".into())));
        assert_eq!(peer.recv().await, Some(Outgoing::Close(1000)));

        peer.send_text("in");
        peer.close(Some(4004), "bad token");
        assert_eq!(
            transport.recv().await,
            Some(TransportEvent::Text("in".into()))
        );
        assert_eq!(
            transport.recv().await,
            Some(TransportEvent::Closed {
                code: Some(4004),
                reason: "bad token".into()
            })
        );

        drop(transport);
        assert!(peer.is_closed());
    }

    #[tokio::test]
    async fn channel_connector_refuses_when_nobody_listens() {
        let (connector, accepted) = ChannelConnector::new();
        drop(accepted);
        assert!(matches!(
            connector.open("ws://nowhere").await,
            Err(TransportError::Refused(_))
        ));
    }
}
