//! Shared type definitions for the Crossway live intersection dashboard.
//!
//! This crate is the single source of truth for the records that flow from
//! the simulation feed through the metrics engine to the view layer. Types
//! defined here flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers
//! - [`enums`] -- Connection state, alert severity/kind, metric keys
//! - [`snapshot`] -- The inbound simulation snapshot
//! - [`structs`] -- Derived records (alerts, trends, chart points, summaries)

pub mod enums;
pub mod ids;
pub mod snapshot;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{AlertKind, AlertSeverity, ConnectionState, MetricKey, UnknownMetric};
pub use ids::AlertId;
pub use snapshot::{RoadState, Snapshot, SnapshotMetrics, VehicleSummary};
pub use structs::{
    Alert, ChartPoint, CurrentMetrics, MetricsSummary, SummaryStatistics, Trends,
};
