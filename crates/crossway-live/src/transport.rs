//! Transport channel abstraction and its WebSocket implementation.
//!
//! [`LiveFeed`](crate::feed::LiveFeed) only talks to a [`Transport`], so the
//! lifecycle logic can be exercised against an in-memory transport in tests
//! and against [`WsTransport`] in production.

use std::future::Future;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::TransportError;

/// Close code for a caller-requested shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code sent by a server that is going away.
pub const GOING_AWAY: u16 = 1001;

/// Whether a close code means the peer shut down on purpose.
pub const fn is_normal_closure(code: u16) -> bool {
    matches!(code, NORMAL_CLOSURE | GOING_AWAY)
}

/// One inbound event from an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text frame.
    Text(String),
    /// The peer closed the connection, with its close code if it sent one.
    Close(Option<u16>),
}

/// An open, bidirectional text channel.
pub trait Connection: Send + 'static {
    /// Wait for the next inbound frame. `None` means the stream ended
    /// without a close frame.
    fn recv(&mut self) -> impl Future<Output = Option<Result<Frame, TransportError>>> + Send;

    /// Send a text frame.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send a close frame with `code`.
    fn close(&mut self, code: u16) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Something that can open [`Connection`]s to an endpoint.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by [`open`](Self::open).
    type Conn: Connection;

    /// Open a connection to `endpoint`.
    fn open(&self, endpoint: &str) -> impl Future<Output = Result<Self::Conn, TransportError>> + Send;
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// [`Transport`] over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

/// An open WebSocket client connection.
#[derive(Debug)]
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Transport for WsTransport {
    type Conn = WsConnection;

    async fn open(&self, endpoint: &str) -> Result<WsConnection, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|err| TransportError::Open {
                endpoint: endpoint.to_owned(),
                reason: err.to_string(),
            })?;
        debug!(endpoint, status = %response.status(), "websocket handshake complete");
        Ok(WsConnection { stream })
    }
}

impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(err.into())),
            };
            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(Frame::Text(text))),
                    Err(_) => trace!(len = bytes.len(), "skipping non-UTF-8 binary frame"),
                },
                Message::Close(frame) => {
                    return Some(Ok(Frame::Close(frame.map(|f| u16::from(f.code)))));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}
