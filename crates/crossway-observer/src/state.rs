//! Shared application state for the observer API server.
//!
//! [`AppState`] owns the [`MetricsEngine`] behind a read-write lock, the
//! broadcast channel for [`MetricsUpdate`]s, and a watch receiver for the
//! live feed's connection state. Handlers only ever take the read lock;
//! the bridge's ingestion task is the single writer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossway_core::MetricsEngine;
use crossway_core::config::MetricsConfig;
use crossway_types::{ConnectionState, CurrentMetrics, Snapshot};
use tokio::sync::{RwLock, broadcast, watch};

/// Capacity of the broadcast channel for metrics updates.
///
/// If a subscriber falls behind by more than this many messages it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest message.
const BROADCAST_CAPACITY: usize = 256;

/// JSON message pushed over `/ws/metrics` after every ingestion.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricsUpdate {
    /// Simulation minute of the snapshot just ingested.
    pub simulation_time: u64,
    /// Latest metrics with trends and derived scores.
    pub current: CurrentMetrics,
    /// Number of active alerts after the ingestion.
    pub active_alerts: u32,
    /// Snapshots held in the history window.
    pub data_points: u32,
    /// When the snapshot was ingested.
    pub received_at: DateTime<Utc>,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Broadcast sender for metrics updates.
    pub tx: broadcast::Sender<MetricsUpdate>,
    /// The metrics engine. Written only by the ingestion task.
    pub engine: Arc<RwLock<MetricsEngine>>,
    /// Connection state of the live feed.
    pub connection: watch::Receiver<ConnectionState>,
}

impl AppState {
    /// Create state with an empty engine and a feed that reports
    /// [`ConnectionState::Disconnected`] forever.
    pub fn new(config: &MetricsConfig) -> Self {
        let (_, connection) = watch::channel(ConnectionState::Disconnected);
        Self::with_connection(config, connection)
    }

    /// Create state that reports the connection state from `connection`.
    pub fn with_connection(
        config: &MetricsConfig,
        connection: watch::Receiver<ConnectionState>,
    ) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            engine: Arc::new(RwLock::new(MetricsEngine::new(config))),
            connection,
        }
    }

    /// Current connection state of the live feed.
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Subscribe to metrics updates.
    pub fn subscribe(&self) -> broadcast::Receiver<MetricsUpdate> {
        self.tx.subscribe()
    }

    /// Publish an update to all connected clients.
    ///
    /// Returns the number of receivers that received the message.
    /// Returns 0 if no clients are connected (this is not an error).
    pub fn broadcast(&self, update: &MetricsUpdate) -> usize {
        self.tx.send(update.clone()).unwrap_or(0)
    }

    /// Ingest one snapshot under a single write lock, then broadcast the
    /// resulting update.
    pub async fn ingest(&self, snapshot: Snapshot) -> MetricsUpdate {
        let simulation_time = snapshot.simulation_time;
        let received_at = Utc::now();

        let update = {
            let mut engine = self.engine.write().await;
            engine.ingest_at(snapshot, received_at);
            build_update(&engine, simulation_time, received_at, received_at)
        };

        self.broadcast(&update);
        update
    }

    /// The update describing the most recent ingestion, or `None` before the
    /// first snapshot. Active alerts are counted as of now.
    pub async fn current_update(&self) -> Option<MetricsUpdate> {
        let engine = self.engine.read().await;
        let latest = engine.store().latest()?;
        Some(build_update(
            &engine,
            latest.snapshot.simulation_time,
            latest.received_at,
            Utc::now(),
        ))
    }
}

fn build_update(
    engine: &MetricsEngine,
    simulation_time: u64,
    received_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> MetricsUpdate {
    MetricsUpdate {
        simulation_time,
        current: engine.current_metrics(),
        active_alerts: saturating_u32(engine.active_alerts_at(now, None).len()),
        data_points: saturating_u32(engine.store().len()),
        received_at,
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}
