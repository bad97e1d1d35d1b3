//! The metrics engine: single read surface for presentation code.
//!
//! [`MetricsEngine`] owns the snapshot window, the current trends and the
//! alert feed. [`MetricsEngine::ingest`] updates all three before it
//! returns, so a reader holding `&MetricsEngine` always observes the result
//! of whole ingestions.
//!
//! Every time-dependent operation has an `_at` variant taking `now`
//! explicitly; the plain variants use [`Utc::now`].

use chrono::{DateTime, TimeDelta, Utc};
use crossway_types::{
    Alert, AlertId, ChartPoint, CurrentMetrics, MetricKey, MetricsSummary, Snapshot,
    SummaryStatistics, Trends,
};
use tracing::debug;

use crate::alerts::{AlertFeed, CONGESTION_CRITICAL, CONGESTION_WARNING, WAIT_TIME_WARNING};
use crate::config::MetricsConfig;
use crate::error::MetricsError;
use crate::store::{RecordedSnapshot, SnapshotStore};
use crate::trend::compute_trends;

/// Alerts included in [`MetricsEngine::summary`].
const SUMMARY_ALERTS: usize = 5;

/// Default number of points for a chart series.
pub const DEFAULT_CHART_POINTS: usize = 20;

/// Snapshot history, trends and alerts behind one interface.
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    store: SnapshotStore,
    trend_window: usize,
    trends: Trends,
    alerts: AlertFeed,
}

impl MetricsEngine {
    /// Create an engine from configuration.
    pub fn new(config: &MetricsConfig) -> Self {
        let ttl_secs = i64::try_from(config.alert_ttl_seconds).unwrap_or(i64::MAX);
        let ttl = TimeDelta::try_seconds(ttl_secs).unwrap_or(TimeDelta::MAX);
        Self {
            store: SnapshotStore::new(config.history_capacity),
            trend_window: config.trend_window,
            trends: Trends::default(),
            alerts: AlertFeed::new(ttl),
        }
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Ingest a snapshot received now.
    pub fn ingest(&mut self, snapshot: Snapshot) {
        self.ingest_at(snapshot, Utc::now());
    }

    /// Ingest a snapshot received at `now`: append it to the window,
    /// recompute trends, and re-derive the alert list.
    pub fn ingest_at(&mut self, snapshot: Snapshot, now: DateTime<Utc>) {
        self.store.ingest(snapshot, now);

        let history = self.store.window(self.store.capacity());
        self.trends = compute_trends(&history, self.trend_window);

        if let Some(latest) = self.store.latest() {
            self.alerts
                .refresh(&latest.snapshot.metrics, &self.trends, now);
        }

        debug!(
            data_points = self.store.len(),
            wait_time_trend = self.trends.wait_time,
            congestion_trend = self.trends.congestion,
            alerts = self.alerts.all().len(),
            "snapshot ingested"
        );
    }

    /// Drop all history, trends and alerts.
    pub fn reset(&mut self) {
        self.store.clear();
        self.trends = Trends::default();
        self.alerts.clear_all();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The most recently ingested snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.store.latest().map(|entry| &entry.snapshot)
    }

    /// Read-only access to the snapshot window.
    pub const fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Current trend values.
    pub const fn trends(&self) -> Trends {
        self.trends
    }

    /// Latest metrics plus trends and derived scores, or zeros before the
    /// first snapshot.
    pub fn current_metrics(&self) -> CurrentMetrics {
        let Some(latest) = self.store.latest() else {
            return CurrentMetrics::default();
        };
        let m = &latest.snapshot.metrics;
        let wait_trend = self.trends.wait_time;

        CurrentMetrics {
            avg_wait_time: m.avg_wait_time,
            congestion_level: m.congestion_level,
            throughput: m.throughput,
            emergency_vehicles: m.emergency_vehicles,
            wait_time_trend: wait_trend,
            congestion_trend: self.trends.congestion,
            throughput_trend: self.trends.throughput,
            efficiency: (100.0 - m.congestion_level - wait_trend).max(0.0),
            system_health: 100.0 - m.congestion_level / 2.0 - wait_trend.max(0.0) / 2.0,
            co2_saved: m.co2_saved,
            fuel_saved: m.fuel_saved,
            vehicles_processed: m.vehicles_processed,
            signal_changes: m.signal_changes,
        }
    }

    /// The last `n` snapshots mapped to chart points for `key`, oldest
    /// first.
    pub fn chart_series(&self, key: MetricKey, n: usize) -> Vec<ChartPoint> {
        to_points(&self.store.window(n), key)
    }

    /// Like [`chart_series`](Self::chart_series) but takes the metric by
    /// its wire name.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::UnknownMetric`] if the name does not match a
    /// metric.
    pub fn chart_series_by_name(&self, name: &str, n: usize) -> Result<Vec<ChartPoint>, MetricsError> {
        let key: MetricKey = name.parse()?;
        Ok(self.chart_series(key, n))
    }

    /// Every snapshot in the window mapped to chart points for `key`.
    pub fn metric_history(&self, key: MetricKey) -> Vec<ChartPoint> {
        self.chart_series(key, self.store.capacity())
    }

    /// Active alerts sorted by priority, truncated to `limit` when given.
    pub fn active_alerts(&self, limit: Option<usize>) -> Vec<Alert> {
        self.active_alerts_at(Utc::now(), limit)
    }

    /// Active alerts as of `now`.
    pub fn active_alerts_at(&self, now: DateTime<Utc>, limit: Option<usize>) -> Vec<Alert> {
        self.alerts.active(now, limit)
    }

    /// Remove one alert. Returns `true` if it existed.
    pub fn clear_alert(&mut self, id: AlertId) -> bool {
        self.alerts.clear(id)
    }

    /// Remove every alert.
    pub fn clear_all_alerts(&mut self) {
        self.alerts.clear_all();
    }

    /// Current metrics, trends, top alerts and window statistics.
    pub fn summary(&self) -> MetricsSummary {
        self.summary_at(Utc::now())
    }

    /// [`summary`](Self::summary) as of `now`.
    pub fn summary_at(&self, now: DateTime<Utc>) -> MetricsSummary {
        let time_range_ms = match (self.store.oldest(), self.store.latest()) {
            (Some(oldest), Some(latest)) => latest
                .received_at
                .signed_duration_since(oldest.received_at)
                .num_milliseconds(),
            _ => 0,
        };

        MetricsSummary {
            current: self.current_metrics(),
            trends: self.trends,
            alerts: self.active_alerts_at(now, Some(SUMMARY_ALERTS)),
            statistics: SummaryStatistics {
                data_points: u32::try_from(self.store.len()).unwrap_or(u32::MAX),
                time_range_ms,
            },
        }
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    /// Congestion at or above the warning threshold.
    pub fn is_congested(&self) -> bool {
        self.current_metrics().congestion_level >= CONGESTION_WARNING
    }

    /// Congestion at or above the critical threshold.
    pub fn is_heavily_congested(&self) -> bool {
        self.current_metrics().congestion_level >= CONGESTION_CRITICAL
    }

    /// Average wait above the warning threshold.
    pub fn is_wait_time_high(&self) -> bool {
        self.current_metrics().avg_wait_time > WAIT_TIME_WARNING
    }

    /// At least one emergency vehicle in the system.
    pub fn is_emergency_active(&self) -> bool {
        self.current_metrics().emergency_vehicles > 0
    }

    /// Wait-time trend is negative.
    pub fn is_improving(&self) -> bool {
        self.current_metrics().wait_time_trend < 0.0
    }
}

fn to_points(entries: &[std::sync::Arc<RecordedSnapshot>], key: MetricKey) -> Vec<ChartPoint> {
    entries
        .iter()
        .zip(0u32..)
        .map(|(entry, index)| ChartPoint {
            index,
            value: entry.snapshot.metrics.value(key),
            timestamp: entry.received_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossway_types::{AlertKind, AlertSeverity, SnapshotMetrics};

    fn engine() -> MetricsEngine {
        MetricsEngine::new(&MetricsConfig::default())
    }

    fn snap(congestion_level: f64, avg_wait_time: f64) -> Snapshot {
        Snapshot::from_metrics(SnapshotMetrics {
            congestion_level,
            avg_wait_time,
            ..SnapshotMetrics::default()
        })
    }

    #[test]
    fn defaults_before_first_snapshot() {
        let engine = engine();
        assert_eq!(engine.current_metrics(), CurrentMetrics::default());
        assert!(engine.latest().is_none());
        assert!(engine.chart_series(MetricKey::CongestionLevel, 5).is_empty());
        assert!(engine.active_alerts(None).is_empty());
        assert!(!engine.is_congested());
        assert!(!engine.is_emergency_active());
    }

    #[test]
    fn rising_congestion_end_to_end() {
        let mut engine = engine();
        let t0 = Utc::now();
        // 10, 15, ..., 95 at five-unit steps.
        for i in 0..18u32 {
            let value = 10.0 + f64::from(i) * 5.0;
            engine.ingest_at(snap(value, 0.0), t0 + TimeDelta::seconds(i64::from(i)));
        }
        let at = t0 + TimeDelta::seconds(17);

        assert!((engine.current_metrics().congestion_level - 95.0).abs() < f64::EPSILON);

        let alerts = engine.active_alerts_at(at, None);
        assert!(alerts
            .iter()
            .any(|a| a.kind == AlertKind::Congestion && a.severity == AlertSeverity::Critical));

        let series: Vec<f64> = engine
            .chart_series(MetricKey::CongestionLevel, 5)
            .iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(series, vec![75.0, 80.0, 85.0, 90.0, 95.0]);
        assert!(engine.is_heavily_congested());
        assert!(engine.current_metrics().congestion_trend > 0.0);
    }

    #[test]
    fn linear_congestion_ramp_of_twelve() {
        let mut engine = engine();
        let t0 = Utc::now();
        // Linear from 40 to 95 in steps of 5: twelve snapshots.
        for i in 0..12u32 {
            let value = 40.0 + f64::from(i) * 5.0;
            engine.ingest_at(snap(value, 0.0), t0 + TimeDelta::seconds(i64::from(i)));
        }
        let now = t0 + TimeDelta::seconds(11);

        assert!((engine.current_metrics().congestion_level - 95.0).abs() < f64::EPSILON);
        assert!(engine
            .active_alerts_at(now, None)
            .iter()
            .any(|a| a.kind == AlertKind::Congestion && a.severity == AlertSeverity::Critical));
        let series: Vec<f64> = engine
            .chart_series_by_name("congestion_level", 5)
            .unwrap_or_default()
            .iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(series, vec![75.0, 80.0, 85.0, 90.0, 95.0]);
    }

    #[test]
    fn congestion_without_wait_alert() {
        let mut engine = engine();
        let now = Utc::now();
        engine.ingest_at(snap(85.0, 3.0), now);

        let alerts = engine.active_alerts_at(now, None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts.first().map(|a| a.kind), Some(AlertKind::Congestion));
        assert!(engine
            .active_alerts_at(now + TimeDelta::seconds(301), None)
            .is_empty());
    }

    #[test]
    fn chart_points_are_indexed_oldest_first() {
        let mut engine = engine();
        let t0 = Utc::now();
        for i in 0..3i32 {
            engine.ingest_at(snap(f64::from(i), 0.0), t0 + TimeDelta::seconds(i64::from(i)));
        }
        let points = engine.chart_series(MetricKey::CongestionLevel, 10);
        let indices: Vec<u32> = points.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(points.first().map(|p| p.timestamp), Some(t0));
    }

    #[test]
    fn unknown_chart_metric_is_an_error() {
        let engine = engine();
        assert!(matches!(
            engine.chart_series_by_name("latency", 5),
            Err(MetricsError::UnknownMetric(_))
        ));
    }

    #[test]
    fn derived_scores_follow_formulas() {
        let config = MetricsConfig {
            trend_window: 1,
            ..MetricsConfig::default()
        };
        let mut engine = MetricsEngine::new(&config);
        let now = Utc::now();
        engine.ingest_at(snap(40.0, 2.0), now);
        engine.ingest_at(snap(40.0, 3.0), now);

        let current = engine.current_metrics();
        // Wait time rose from 2 to 3: +50%.
        assert!((current.wait_time_trend - 50.0).abs() < 1e-9);
        assert!((current.efficiency - 10.0).abs() < 1e-9);
        assert!((current.system_health - 55.0).abs() < 1e-9);
        assert!(!engine.is_improving());
    }

    #[test]
    fn improvement_alert_fires_on_falling_wait() {
        let config = MetricsConfig {
            trend_window: 1,
            ..MetricsConfig::default()
        };
        let mut engine = MetricsEngine::new(&config);
        let now = Utc::now();
        engine.ingest_at(snap(0.0, 4.0), now);
        engine.ingest_at(snap(0.0, 2.0), now);

        assert!(engine.is_improving());
        let alerts = engine.active_alerts_at(now, None);
        assert_eq!(alerts.first().map(|a| a.kind), Some(AlertKind::WaitTimeImproving));
        assert_eq!(
            alerts.first().map(|a| a.message.as_str()),
            Some("Wait time decreased by 50.0%")
        );
    }

    #[test]
    fn summary_reports_window_statistics() {
        let mut engine = engine();
        let t0 = Utc::now();
        for i in 0..8 {
            engine.ingest_at(snap(90.0, 12.0), t0 + TimeDelta::seconds(i));
        }
        let summary = engine.summary_at(t0 + TimeDelta::seconds(7));
        assert_eq!(summary.statistics.data_points, 8);
        assert_eq!(summary.statistics.time_range_ms, 7000);
        // Sixteen alerts exist but the summary caps at five.
        assert_eq!(summary.alerts.len(), 5);
        assert!((summary.current.congestion_level - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clear_alert_and_reset() {
        let mut engine = engine();
        let now = Utc::now();
        engine.ingest_at(snap(70.0, 7.0), now);
        let ids: Vec<AlertId> = engine.active_alerts_at(now, None).iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), 2);

        assert!(ids.first().is_some_and(|id| engine.clear_alert(*id)));
        assert_eq!(engine.active_alerts_at(now, None).len(), 1);

        engine.clear_all_alerts();
        assert!(engine.active_alerts_at(now, None).is_empty());

        engine.reset();
        assert!(engine.latest().is_none());
        assert_eq!(engine.trends(), Trends::default());
    }

    #[test]
    fn predicates_track_latest_snapshot() {
        let mut engine = engine();
        engine.ingest(Snapshot::from_metrics(SnapshotMetrics {
            congestion_level: 65.0,
            avg_wait_time: 6.0,
            emergency_vehicles: 1,
            ..SnapshotMetrics::default()
        }));
        assert!(engine.is_congested());
        assert!(!engine.is_heavily_congested());
        assert!(engine.is_wait_time_high());
        assert!(engine.is_emergency_active());
    }
}
