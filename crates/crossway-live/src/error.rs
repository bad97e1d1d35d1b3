//! Error types for the live feed.
//!
//! [`TransportError`] covers failures of a single connection.
//! [`LiveError`] is what error subscribers receive from
//! [`LiveFeed`](crate::feed::LiveFeed); none of its variants are returned
//! to the caller of a feed operation.

/// Failures reported by a [`Transport`](crate::transport::Transport) or
/// its connections.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint could not be reached or the handshake failed.
    #[error("failed to open {endpoint}: {reason}")]
    Open {
        /// The endpoint that was dialed.
        endpoint: String,
        /// Transport-specific description.
        reason: String,
    },

    /// Reading from or writing to an open connection failed.
    #[error("connection I/O failed: {0}")]
    Io(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors delivered to [`LiveFeed::on_error`](crate::feed::LiveFeed::on_error)
/// subscribers.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    /// The transport failed to open or broke while open.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An inbound frame was not valid JSON.
    #[error("failed to decode inbound frame: {source}")]
    Decode {
        /// The underlying parse error.
        #[from]
        source: serde_json::Error,
    },

    /// The server closed the connection with a non-normal close code.
    #[error("connection closed unexpectedly (code {code:?})")]
    UnexpectedClose {
        /// The close code, if the server sent one.
        code: Option<u16>,
    },

    /// Every automatic reconnect attempt failed.
    #[error("gave up after {attempts} reconnect attempts")]
    ReconnectExhausted {
        /// Number of attempts made.
        attempts: u32,
    },
}
