//! The simulation snapshot delivered by the feed.
//!
//! Every inbound frame is one complete snapshot of the intersection. The
//! dashboard treats it as opaque apart from the metrics sub-record; road
//! and vehicle data pass through untouched for the view layer.
//!
//! All fields except `metrics` default when absent so that older backends
//! without e.g. `queue_size` still decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::MetricKey;

/// One complete state record of the simulated intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// Simulation clock in simulation minutes.
    #[serde(default)]
    pub simulation_time: u64,
    /// Direction angle of the road currently holding the green signal.
    #[serde(default)]
    pub current_green: Option<u16>,
    /// Green-signal duration in seconds.
    #[serde(default)]
    pub green_duration: u32,
    /// Per-direction road data keyed by direction angle (`"0"` .. `"315"`).
    #[serde(default)]
    pub roads: BTreeMap<String, RoadState>,
    /// Aggregate metrics for this snapshot.
    pub metrics: SnapshotMetrics,
    /// Roads waiting in the signal priority queue.
    #[serde(default)]
    pub queue_size: u32,
    /// Whether the backend simulation loop is running.
    #[serde(default)]
    pub is_running: bool,
}

/// State of one approach road.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RoadState {
    /// Display name (e.g. "North Road").
    #[serde(default)]
    pub name: String,
    /// Vehicles currently queued on the road.
    #[serde(default)]
    pub vehicle_count: u32,
    /// Weighted traffic density (percent).
    #[serde(default)]
    pub density: f64,
    /// Head of the vehicle queue.
    #[serde(default)]
    pub vehicles: Vec<VehicleSummary>,
    /// Capacity usage as a display string (e.g. `"42.0%"`).
    #[serde(default)]
    pub capacity_used: String,
}

/// One queued vehicle as reported by the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VehicleSummary {
    /// Vehicle class (`car`, `truck`, `emergency`, ...).
    #[serde(rename = "type", default)]
    pub vehicle_type: String,
    /// Minutes spent waiting.
    #[serde(default)]
    pub waiting_time: f64,
    /// Whether this is an emergency vehicle.
    #[serde(default)]
    pub emergency: bool,
    /// Backend scheduling priority.
    #[serde(default)]
    pub priority: f64,
}

/// Aggregate metrics carried by every snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "bindings/")]
pub struct SnapshotMetrics {
    /// Vehicles generated since the simulation started.
    pub total_vehicles_generated: u64,
    /// Vehicles that cleared the intersection.
    pub vehicles_processed: u64,
    /// Sum of wait times of processed vehicles (minutes).
    pub total_wait_time: f64,
    /// Mean wait time per processed vehicle (minutes).
    pub avg_wait_time: f64,
    /// Longest wait time seen (minutes).
    pub max_wait_time: f64,
    /// Emergency vehicles seen.
    pub emergency_vehicles: u64,
    /// Signal phase changes.
    pub signal_changes: u64,
    /// Overall congestion (percent of capacity).
    pub congestion_level: f64,
    /// Estimated CO2 saved (kg).
    pub co2_saved: f64,
    /// Estimated fuel saved (litres).
    pub fuel_saved: f64,
    /// Vehicles processed per hour.
    pub throughput: f64,
    /// Roads waiting in the priority queue.
    pub queue_size: u64,
    /// Backend-computed efficiency score.
    pub system_efficiency: f64,
}

impl SnapshotMetrics {
    /// Read a metric field as `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub const fn value(&self, key: MetricKey) -> f64 {
        match key {
            MetricKey::TotalVehiclesGenerated => self.total_vehicles_generated as f64,
            MetricKey::VehiclesProcessed => self.vehicles_processed as f64,
            MetricKey::TotalWaitTime => self.total_wait_time,
            MetricKey::AvgWaitTime => self.avg_wait_time,
            MetricKey::MaxWaitTime => self.max_wait_time,
            MetricKey::EmergencyVehicles => self.emergency_vehicles as f64,
            MetricKey::SignalChanges => self.signal_changes as f64,
            MetricKey::CongestionLevel => self.congestion_level,
            MetricKey::Co2Saved => self.co2_saved,
            MetricKey::FuelSaved => self.fuel_saved,
            MetricKey::Throughput => self.throughput,
            MetricKey::QueueSize => self.queue_size as f64,
            MetricKey::SystemEfficiency => self.system_efficiency,
        }
    }
}

impl Snapshot {
    /// Build a snapshot carrying only the given metrics.
    pub fn from_metrics(metrics: SnapshotMetrics) -> Self {
        Self {
            simulation_time: 0,
            current_green: None,
            green_duration: 0,
            roads: BTreeMap::new(),
            metrics,
            queue_size: 0,
            is_running: false,
        }
    }
}
