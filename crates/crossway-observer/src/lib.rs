//! Observer API server for the Crossway dashboard.
//!
//! This crate connects the live feed to the metrics engine and exposes the
//! engine read-only to a view layer:
//!
//! - **Bridge** ([`bridge`]) decoding feed messages into snapshots and
//!   ingesting them in arrival order
//! - **REST endpoints** for current metrics, summary, alerts and chart
//!   series
//! - **`WebSocket` endpoint** (`/ws/metrics`) pushing a
//!   [`MetricsUpdate`] after every ingestion via
//!   [`tokio::sync::broadcast`]
//!
//! Nothing here sends commands to the simulation backend.

pub mod bridge;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use bridge::{FeedBridge, spawn_bridge};
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::{AppState, MetricsUpdate};
