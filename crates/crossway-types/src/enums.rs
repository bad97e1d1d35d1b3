//! Enumeration types shared by the live feed, the metrics engine and the
//! observer surface.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// State of the single logical connection to the simulation feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The connection is open and delivering frames.
    Connected,
    /// A caller-initiated close handshake is in progress.
    Closing,
    /// The reconnect budget is exhausted. Only an explicit connect leaves
    /// this state.
    Failed,
}

impl ConnectionState {
    /// Whether a connect request issued in this state must be ignored.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Lowercase label used in logs and JSON payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Severity level of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum AlertSeverity {
    /// Immediate attention required.
    Critical,
    /// Something is off but not critical.
    Warning,
    /// A notable condition that does not require action.
    Info,
    /// A positive development.
    Success,
}

impl AlertSeverity {
    /// Sort rank of this severity. Lower ranks are shown first.
    pub const fn priority(self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::Warning => 2,
            Self::Info => 3,
            Self::Success => 4,
        }
    }
}

/// The threshold rule family that produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AlertKind {
    /// Overall congestion crossed the warning or critical threshold.
    Congestion,
    /// Average wait time crossed the warning or critical threshold.
    WaitTime,
    /// At least one emergency vehicle is in the system.
    Emergency,
    /// The wait-time trend shows a significant improvement.
    WaitTimeImproving,
}

// ---------------------------------------------------------------------------
// Metric keys
// ---------------------------------------------------------------------------

/// A numeric field of [`SnapshotMetrics`](crate::SnapshotMetrics) that can
/// be charted or trended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MetricKey {
    /// Vehicles generated since the simulation started.
    TotalVehiclesGenerated,
    /// Vehicles that cleared the intersection.
    VehiclesProcessed,
    /// Sum of wait times of processed vehicles (minutes).
    TotalWaitTime,
    /// Mean wait time per processed vehicle (minutes).
    AvgWaitTime,
    /// Longest wait time seen (minutes).
    MaxWaitTime,
    /// Emergency vehicles seen.
    EmergencyVehicles,
    /// Signal phase changes.
    SignalChanges,
    /// Overall congestion (percent of capacity).
    CongestionLevel,
    /// Estimated CO2 saved (kg).
    Co2Saved,
    /// Estimated fuel saved (litres).
    FuelSaved,
    /// Vehicles processed per hour.
    Throughput,
    /// Roads waiting in the priority queue.
    QueueSize,
    /// Backend-computed efficiency score.
    SystemEfficiency,
}

impl MetricKey {
    /// Every metric key, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::TotalVehiclesGenerated,
        Self::VehiclesProcessed,
        Self::TotalWaitTime,
        Self::AvgWaitTime,
        Self::MaxWaitTime,
        Self::EmergencyVehicles,
        Self::SignalChanges,
        Self::CongestionLevel,
        Self::Co2Saved,
        Self::FuelSaved,
        Self::Throughput,
        Self::QueueSize,
        Self::SystemEfficiency,
    ];

    /// The snake_case wire name of this metric.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TotalVehiclesGenerated => "total_vehicles_generated",
            Self::VehiclesProcessed => "vehicles_processed",
            Self::TotalWaitTime => "total_wait_time",
            Self::AvgWaitTime => "avg_wait_time",
            Self::MaxWaitTime => "max_wait_time",
            Self::EmergencyVehicles => "emergency_vehicles",
            Self::SignalChanges => "signal_changes",
            Self::CongestionLevel => "congestion_level",
            Self::Co2Saved => "co2_saved",
            Self::FuelSaved => "fuel_saved",
            Self::Throughput => "throughput",
            Self::QueueSize => "queue_size",
            Self::SystemEfficiency => "system_efficiency",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a metric name does not match any [`MetricKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric: {0}")]
pub struct UnknownMetric(pub String);

impl FromStr for MetricKey {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_owned()))
    }
}
