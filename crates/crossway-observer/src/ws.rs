//! `WebSocket` push of metrics updates.
//!
//! Clients connect to `GET /ws/metrics`. A client that connects after the
//! first ingestion immediately receives the update for the latest snapshot,
//! then one JSON-encoded [`MetricsUpdate`] per ingestion. An update older
//! than the last one sent, or equal to it, is dropped, so the initial update
//! and a racing broadcast never reach the client twice. A lagging client
//! skips to the newest update.
//!
//! The stream is read-only. Client text and binary frames are ignored;
//! pings are answered by the protocol layer.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::{AppState, MetricsUpdate};

/// Upgrade to a `WebSocket` that streams metrics updates.
///
/// # Route
///
/// `GET /ws/metrics`
pub async fn ws_metrics(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_updates(socket, state))
}

/// Sends updates to one client, remembering the last update delivered.
struct UpdateStream {
    socket: WebSocket,
    last_sent: Option<MetricsUpdate>,
}

impl UpdateStream {
    /// Send `update` unless the client already has it or something newer.
    /// Returns `false` once the client is gone.
    async fn push(&mut self, update: &MetricsUpdate) -> bool {
        if self.last_sent.as_ref().is_some_and(|sent| {
            update.received_at < sent.received_at || update == sent
        }) {
            return true;
        }
        let json = match serde_json::to_string(update) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "metrics update not serializable");
                return true;
            }
        };
        if self.socket.send(Message::Text(json.into())).await.is_err() {
            return false;
        }
        self.last_sent = Some(update.clone());
        true
    }
}

async fn stream_updates(socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before reading the current update so nothing ingested in
    // between is missed.
    let mut rx = state.subscribe();
    let mut stream = UpdateStream {
        socket,
        last_sent: None,
    };

    if let Some(update) = state.current_update().await {
        if !stream.push(&update).await {
            return;
        }
    }
    debug!(initial = stream.last_sent.is_some(), "metrics client connected");

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(update) => {
                    if !stream.push(&update).await {
                        debug!("metrics client gone");
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "metrics client lagging"),
                Err(RecvError::Closed) => return,
            },
            incoming = stream.socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => {
                    debug!("metrics client disconnected");
                    return;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
