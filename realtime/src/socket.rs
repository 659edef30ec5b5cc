//! Socket abstraction.
//!
//! The transport never touches a WebSocket directly. A [`Connector`] opens a
//! socket and hands back a [`SocketHandle`]: an outbound frame sender and a
//! stream of lifecycle events (`open`, `message`, `error`, `close`). Opening
//! is synchronous and the outcome arrives as events, so production sockets,
//! test doubles, and the in-process simulator all look the same to the
//! context.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Close code used for intentional, client-initiated closes. A close with
/// this code never triggers automatic reconnection.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Close code reported when a socket drops without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Close code reported when the peer sends a close frame without a status.
pub const NO_STATUS_CLOSE_CODE: u16 = 1005;

/// Lifecycle event emitted by a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The socket finished opening.
    Open,
    /// A text frame arrived.
    Message(String),
    /// The socket failed.
    Error(String),
    /// The socket closed.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Frame written by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A text frame.
    Text(String),
    /// A close request.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Client end of an opened socket.
#[derive(Debug)]
pub struct SocketHandle {
    /// Sender for outbound frames. Dropping it closes the socket.
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,

    /// Lifecycle events in arrival order.
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

/// Opens sockets for the transport connection.
pub trait Connector: Send + Sync + 'static {
    /// Starts opening a socket to `url`. Must be called within a Tokio
    /// runtime; the outcome is reported through the handle's events.
    fn open(&self, url: &str) -> SocketHandle;
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn open(&self, url: &str) -> SocketHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_socket(url.to_string(), outbound_rx, events_tx));

        SocketHandle {
            outbound: outbound_tx,
            events: events_rx,
        }
    }
}

/// Drives one tungstenite socket until it closes.
async fn run_socket(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            let _ = events.send(SocketEvent::Error(format!("connection failed: {}", e)));
            let _ = events.send(SocketEvent::Close {
                code: ABNORMAL_CLOSE_CODE,
                reason: "connection failed".to_string(),
            });
            return;
        }
    };

    let _ = events.send(SocketEvent::Open);
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        let _ = events.send(SocketEvent::Error(format!("send failed: {}", e)));
                        let _ = events.send(SocketEvent::Close {
                            code: ABNORMAL_CLOSE_CODE,
                            reason: "send failed".to_string(),
                        });
                        break;
                    }
                }
                Some(OutboundFrame::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        debug!("Close frame not delivered to {}: {}", url, e);
                    }
                    let _ = events.send(SocketEvent::Close { code, reason });
                    break;
                }
                None => {
                    // Handle dropped by the context.
                    let _ = sink.close().await;
                    break;
                }
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(SocketEvent::Message(text.as_str().to_string()));
                }
                Some(Ok(Message::Binary(data))) => {
                    // Envelopes are text; the context counts this as a decode error.
                    debug!("Binary frame ({} bytes) from {}", data.len(), url);
                    let text = String::from_utf8_lossy(&data).into_owned();
                    let _ = events.send(SocketEvent::Message(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                        .unwrap_or((NO_STATUS_CLOSE_CODE, String::new()));
                    let _ = events.send(SocketEvent::Close { code, reason });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error on {}: {}", url, e);
                    let _ = events.send(SocketEvent::Error(e.to_string()));
                    let _ = events.send(SocketEvent::Close {
                        code: ABNORMAL_CLOSE_CODE,
                        reason: "socket error".to_string(),
                    });
                    break;
                }
                None => {
                    let _ = events.send(SocketEvent::Close {
                        code: ABNORMAL_CLOSE_CODE,
                        reason: "stream ended".to_string(),
                    });
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::RealtimeConfig;
    use crate::context::RealtimeContext;
    use crate::envelope::Envelope;

    /// Starts a one-shot WebSocket peer that sends `frame` after the
    /// handshake and then stays open. Returns its URL.
    async fn peer_sending(frame: Message) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("handshake");
            ws.send(frame).await.expect("send");
            while let Some(Ok(_)) = ws.next().await {}
        });

        format!("ws://{}/api/websocket/dashboard", addr)
    }

    fn binary_frame() -> Message {
        Message::Binary(vec![0xff, 0xfe, 0x00].into())
    }

    #[tokio::test]
    async fn test_tungstenite_connector_forwards_binary_frames() {
        let url = peer_sending(binary_frame()).await;
        let mut handle = TungsteniteConnector.open(&url);

        assert_eq!(handle.events.recv().await, Some(SocketEvent::Open));
        match handle.events.recv().await {
            Some(SocketEvent::Message(text)) => assert!(Envelope::decode(&text).is_err()),
            other => panic!("expected message event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_binary_frame_counts_as_decode_error() {
        let url = peer_sending(binary_frame()).await;
        let ctx = RealtimeContext::new(RealtimeConfig::new(url)).expect("context");
        ctx.connect();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while ctx.error_count() == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(ctx.is_connected());
        assert_eq!(ctx.error_count(), 1);
        assert_eq!(ctx.message_count(), 0);
        assert!(ctx.last_error().is_some());

        ctx.disconnect();
    }

    #[tokio::test]
    async fn test_tungstenite_connector_reports_failure() {
        // Nothing listens on port 9 of the loopback interface.
        let mut handle = TungsteniteConnector.open("ws://127.0.0.1:9/api/websocket/dashboard");

        let first = handle.events.recv().await;
        assert!(matches!(first, Some(SocketEvent::Error(_))));

        let second = handle.events.recv().await;
        assert!(matches!(
            second,
            Some(SocketEvent::Close {
                code: ABNORMAL_CLOSE_CODE,
                ..
            })
        ));
    }
}
