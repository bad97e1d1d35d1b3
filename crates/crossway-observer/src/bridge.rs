//! Bridge from the live feed into the metrics engine.
//!
//! The bridge subscribes to the feed's generic message channel. Messages
//! carrying a `type` discriminator (for example the server's `pong`) are
//! control traffic and are skipped; everything else is decoded as a
//! [`Snapshot`]. Decoded snapshots go through an unbounded in-order channel
//! to a single ingestion task, so snapshots are ingested in arrival order
//! and each ingestion completes under one write lock.

use std::sync::Arc;

use crossway_live::listeners::KIND_FIELD;
use crossway_live::{LiveFeed, MESSAGE_CHANNEL, Subscription, Transport};
use crossway_types::Snapshot;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::state::AppState;

/// A running bridge. Dropping it leaves the bridge running; call
/// [`shutdown`](Self::shutdown) to stop it.
#[derive(Debug)]
pub struct FeedBridge {
    subscription: Subscription,
    task: JoinHandle<()>,
}

impl FeedBridge {
    /// Stop receiving messages and end the ingestion task. Snapshots
    /// already queued are discarded.
    pub fn shutdown(self) {
        self.subscription.unsubscribe();
        self.task.abort();
    }
}

/// Decode an inbound message as a snapshot.
///
/// Returns `Ok(None)` for typed control messages.
///
/// # Errors
///
/// Returns the decode error when an untyped message is not a valid
/// snapshot.
pub fn decode_snapshot(message: &Value) -> Result<Option<Snapshot>, serde_json::Error> {
    if message.get(KIND_FIELD).is_some() {
        return Ok(None);
    }
    Snapshot::deserialize(message).map(Some)
}

/// Subscribe to `feed` and start the ingestion task.
pub fn spawn_bridge<T: Transport>(feed: &LiveFeed<T>, state: Arc<AppState>) -> FeedBridge {
    let (tx, task) = spawn_ingestion(state);
    let subscription = feed.subscribe(MESSAGE_CHANNEL, move |message| forward(message, &tx));
    FeedBridge { subscription, task }
}

fn forward(message: &Value, tx: &mpsc::UnboundedSender<Snapshot>) {
    match decode_snapshot(message) {
        Ok(Some(snapshot)) => {
            if tx.send(snapshot).is_err() {
                debug!("ingestion task stopped; snapshot dropped");
            }
        }
        Ok(None) => trace!(kind = ?message.get(KIND_FIELD), "skipping control message"),
        Err(err) => warn!(error = %err, "skipping message that is not a snapshot"),
    }
}

/// Start the single ingestion task. It runs until every sender is dropped.
fn spawn_ingestion(state: Arc<AppState>) -> (mpsc::UnboundedSender<Snapshot>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Snapshot>();
    let task = tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            let update = state.ingest(snapshot).await;
            debug!(
                simulation_time = update.simulation_time,
                data_points = update.data_points,
                active_alerts = update.active_alerts,
                "snapshot ingested"
            );
        }
    });
    (tx, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_messages_are_skipped() {
        let decoded = decode_snapshot(&json!({"type": "pong"}));
        assert!(matches!(decoded, Ok(None)));
    }

    #[test]
    fn untyped_messages_decode_as_snapshots() {
        let decoded = decode_snapshot(&json!({
            "simulation_time": 12,
            "metrics": {"congestion_level": 40.5}
        }));
        let snapshot = decoded.ok().flatten();
        assert_eq!(snapshot.as_ref().map(|s| s.simulation_time), Some(12));
        assert!(snapshot.is_some_and(|s| (s.metrics.congestion_level - 40.5).abs() < f64::EPSILON));
    }

    #[test]
    fn snapshot_without_metrics_is_an_error() {
        assert!(decode_snapshot(&json!({"simulation_time": 1})).is_err());
    }

    #[tokio::test]
    async fn snapshots_are_ingested_in_arrival_order() {
        let state = Arc::new(AppState::default());
        let (tx, task) = spawn_ingestion(Arc::clone(&state));

        forward(&json!({"simulation_time": 1, "metrics": {}}), &tx);
        forward(&json!({"type": "pong"}), &tx);
        forward(&json!({"simulation_time": "bad"}), &tx);
        forward(&json!({"simulation_time": 2, "metrics": {}}), &tx);
        forward(&json!({"simulation_time": 3, "metrics": {}}), &tx);
        drop(tx);
        let _ = task.await;

        let engine = state.engine.read().await;
        let times: Vec<u64> = engine
            .store()
            .window(10)
            .iter()
            .map(|entry| entry.snapshot.simulation_time)
            .collect();
        assert_eq!(times, vec![1, 2, 3]);
    }
}
