//! WebSocket transport built on `tokio-tungstenite`
//!
//! `open()` spawns a pump task that performs the handshake and then shuttles
//! frames between the socket and the engine: outbound commands arrive on an
//! mpsc channel, inbound text frames and lifecycle transitions leave as
//! [`TransportEvent`]s. After the handshake the pump guarantees a terminal
//! `Closed` event before it exits, so the engine always observes the end of
//! a connection it managed to open.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace};
use url::Url;

use super::{
    ABNORMAL_CLOSURE, BoxedTransport, EventReceiver, Transport, TransportEvent, TransportFactory,
    TransportResult,
};
use crate::error::TransportError;

/// Close code reported when the peer closed without sending a status
const NO_STATUS_RECEIVED: u16 = 1005;

enum Outbound {
    Text(String),
    Close(u16),
}

/// WebSocket transport instance; one per connection attempt
pub struct WebSocketTransport {
    url: Url,
    connect_timeout: Duration,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

impl WebSocketTransport {
    pub fn new(url: Url, connect_timeout: Duration) -> Self {
        Self {
            url,
            connect_timeout,
            outbound: None,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn open(&mut self) -> TransportResult<EventReceiver> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);

        tokio::spawn(run_connection(
            self.url.clone(),
            self.connect_timeout,
            outbound_rx,
            event_tx,
        ));

        Ok(event_rx)
    }

    async fn send(&mut self, text: String) -> TransportResult<()> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, code: u16) -> TransportResult<()> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        outbound
            .send(Outbound::Close(code))
            .map_err(|_| TransportError::Closed)
    }
}

async fn run_connection(
    url: Url,
    connect_timeout: Duration,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let connected = tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await;
    let socket = match connected {
        Err(_) => {
            let _ = events.send(TransportEvent::Error(format!(
                "connection to {} timed out",
                url
            )));
            return;
        }
        Ok(Err(e)) => {
            let _ = events.send(TransportEvent::Error(format!(
                "connection to {} failed: {}",
                url, e
            )));
            return;
        }
        Ok(Ok((socket, _response))) => socket,
    };

    debug!(url = %url, "websocket connected");
    if events.send(TransportEvent::Opened).is_err() {
        return;
    }

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    trace!(len = text.len(), "sending frame");
                    if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
                        let _ = events.send(TransportEvent::Error(format!("send failed: {}", e)));
                        let _ = events.send(TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: e.to_string(),
                        });
                        return;
                    }
                }
                Some(Outbound::Close(code)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "".into(),
                    };
                    if sink.send(WsMessage::Close(Some(frame))).await.is_err() {
                        let _ = events.send(TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: "connection lost during close handshake".to_string(),
                        });
                        return;
                    }
                    // keep reading until the peer echoes the close frame
                }
                None => return, // transport handle dropped
            },
            inbound = stream.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text.to_string()));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                    debug!(code, reason = %reason, "websocket closed");
                    let _ = events.send(TransportEvent::Closed { code, reason });
                    return;
                }
                // binary, ping, and pong frames are not part of this protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(format!("websocket error: {}", e)));
                    let _ = events.send(TransportEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: e.to_string(),
                    });
                    return;
                }
                None => {
                    let _ = events.send(TransportEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: "connection reset".to_string(),
                    });
                    return;
                }
            }
        }
    }
}

/// Factory producing a [`WebSocketTransport`] per connection attempt
pub struct WebSocketFactory {
    url: Url,
    connect_timeout: Duration,
}

impl WebSocketFactory {
    pub fn new(url: &str, connect_timeout: Duration) -> TransportResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| TransportError::Unsupported(format!("invalid URL: {}", e)))?;

        match url.scheme() {
            "ws" | "wss" => Ok(Self {
                url,
                connect_timeout,
            }),
            scheme => Err(TransportError::Unsupported(format!(
                "unknown scheme: {}",
                scheme
            ))),
        }
    }
}

impl TransportFactory for WebSocketFactory {
    fn create(&self) -> BoxedTransport {
        Box::new(WebSocketTransport::new(
            self.url.clone(),
            self.connect_timeout,
        ))
    }

    fn endpoint(&self) -> String {
        self.url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_accepts_websocket_schemes() {
        assert!(WebSocketFactory::new("ws://localhost:8080/rpc", Duration::from_secs(5)).is_ok());
        assert!(WebSocketFactory::new("wss://example.com/rpc", Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_factory_rejects_other_schemes() {
        for url in ["http://localhost:8080/rpc", "stdio://x", "not a url"] {
            assert!(matches!(
                WebSocketFactory::new(url, Duration::from_secs(5)),
                Err(TransportError::Unsupported(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_send_before_open_is_rejected() {
        let factory =
            WebSocketFactory::new("ws://localhost:8080/rpc", Duration::from_secs(5)).unwrap();
        let mut transport = factory.create();
        assert!(matches!(
            transport.send("{}".to_string()).await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.close(crate::transport::NORMAL_CLOSURE).await,
            Err(TransportError::NotConnected)
        ));
    }
}
