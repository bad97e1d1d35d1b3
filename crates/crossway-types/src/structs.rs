//! Derived records produced by the metrics engine for the view layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AlertKind, AlertSeverity};
use crate::ids::AlertId;

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// A time-stamped, severity-tagged notification generated by a threshold
/// rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Alert {
    /// Unique alert identifier.
    pub id: AlertId,
    /// Rule family that raised the alert.
    pub kind: AlertKind,
    /// Severity of the alert.
    pub severity: AlertSeverity,
    /// Short headline.
    pub title: String,
    /// Human-readable message.
    pub message: String,
    /// When the alert was raised.
    pub created_at: DateTime<Utc>,
    /// Sort rank. Lower ranks are shown first.
    pub priority: u8,
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// One point of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChartPoint {
    /// Position within the returned series (0 = oldest).
    pub index: u32,
    /// Metric value at that point.
    pub value: f64,
    /// Local receipt time of the underlying snapshot.
    pub timestamp: DateTime<Utc>,
}

/// Percent change of selected metrics, recent window against prior window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Trends {
    /// Average wait time trend (percent).
    pub wait_time: f64,
    /// Congestion level trend (percent).
    pub congestion: f64,
    /// Throughput trend (percent).
    pub throughput: f64,
}

/// Latest metrics plus derived scores. All zeros before the first snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CurrentMetrics {
    /// Mean wait time per processed vehicle (minutes).
    pub avg_wait_time: f64,
    /// Overall congestion (percent).
    pub congestion_level: f64,
    /// Vehicles processed per hour.
    pub throughput: f64,
    /// Emergency vehicles seen.
    pub emergency_vehicles: u64,
    /// Average wait time trend (percent).
    pub wait_time_trend: f64,
    /// Congestion trend (percent).
    pub congestion_trend: f64,
    /// Throughput trend (percent).
    pub throughput_trend: f64,
    /// `max(0, 100 - congestion - wait_time_trend)`.
    pub efficiency: f64,
    /// `100 - congestion / 2 - max(0, wait_time_trend) / 2`.
    pub system_health: f64,
    /// Estimated CO2 saved (kg).
    pub co2_saved: f64,
    /// Estimated fuel saved (litres).
    pub fuel_saved: f64,
    /// Vehicles that cleared the intersection.
    pub vehicles_processed: u64,
    /// Signal phase changes.
    pub signal_changes: u64,
}

/// Window statistics reported with the metrics summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SummaryStatistics {
    /// Snapshots currently held in the window.
    pub data_points: u32,
    /// Milliseconds between the oldest and newest snapshot receipt.
    pub time_range_ms: i64,
}

/// Everything a dashboard panel needs in one read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MetricsSummary {
    /// Current metrics and scores.
    pub current: CurrentMetrics,
    /// Current trend values.
    pub trends: Trends,
    /// The highest-ranked active alerts (at most five).
    pub alerts: Vec<Alert>,
    /// Window statistics.
    pub statistics: SummaryStatistics,
}
