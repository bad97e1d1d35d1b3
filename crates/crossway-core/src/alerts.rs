//! Threshold alerts derived from the latest snapshot and trends.
//!
//! The alert list is re-derived on every ingestion: all rules are evaluated
//! against the newest snapshot, the resulting alerts are appended to the
//! previous list, anything older than the TTL is dropped, and the result is
//! sorted by priority.
//!
//! # Rules
//!
//! | Condition | Severity | Kind |
//! |-----------|----------|------|
//! | congestion >= 80% | critical | `congestion` |
//! | 60% <= congestion < 80% | warning | `congestion` |
//! | avg wait > 10 min | critical | `wait_time` |
//! | 5 < avg wait <= 10 min | warning | `wait_time` |
//! | emergency vehicles > 0 | info | `emergency` |
//! | wait-time trend < -10% | success | `wait_time_improving` |
//!
//! A rule that still holds on the next snapshot raises a fresh alert; the
//! list is a timeline of occurrences and is not deduplicated by kind.

use chrono::{DateTime, TimeDelta, Utc};
use crossway_types::{Alert, AlertId, AlertKind, AlertSeverity, SnapshotMetrics, Trends};
use tracing::debug;

/// Congestion percentage at or above which a critical alert is raised.
pub const CONGESTION_CRITICAL: f64 = 80.0;
/// Congestion percentage at or above which a warning is raised.
pub const CONGESTION_WARNING: f64 = 60.0;
/// Average wait (minutes) above which a critical alert is raised.
pub const WAIT_TIME_CRITICAL: f64 = 10.0;
/// Average wait (minutes) above which a warning is raised.
pub const WAIT_TIME_WARNING: f64 = 5.0;
/// Wait-time trend (percent) below which an improvement is reported.
pub const WAIT_TIME_IMPROVEMENT: f64 = -10.0;

// ---------------------------------------------------------------------------
// Rule evaluation
// ---------------------------------------------------------------------------

/// Evaluate every rule against the latest metrics and trends.
pub fn evaluate_rules(metrics: &SnapshotMetrics, trends: &Trends, now: DateTime<Utc>) -> Vec<Alert> {
    let mut raised = Vec::new();

    let congestion = metrics.congestion_level;
    if congestion >= CONGESTION_CRITICAL {
        raised.push(new_alert(
            AlertKind::Congestion,
            AlertSeverity::Critical,
            "High Congestion Alert",
            format!("Traffic congestion at {congestion:.1}%"),
            now,
        ));
    } else if congestion >= CONGESTION_WARNING {
        raised.push(new_alert(
            AlertKind::Congestion,
            AlertSeverity::Warning,
            "Moderate Congestion",
            format!("Traffic congestion at {congestion:.1}%"),
            now,
        ));
    }

    let wait = metrics.avg_wait_time;
    if wait > WAIT_TIME_CRITICAL {
        raised.push(new_alert(
            AlertKind::WaitTime,
            AlertSeverity::Critical,
            "High Wait Time",
            format!("Average wait time: {wait:.1} minutes"),
            now,
        ));
    } else if wait > WAIT_TIME_WARNING {
        raised.push(new_alert(
            AlertKind::WaitTime,
            AlertSeverity::Warning,
            "Elevated Wait Time",
            format!("Average wait time: {wait:.1} minutes"),
            now,
        ));
    }

    if metrics.emergency_vehicles > 0 {
        raised.push(new_alert(
            AlertKind::Emergency,
            AlertSeverity::Info,
            "Emergency Vehicle Active",
            format!(
                "{} emergency vehicle(s) in the system",
                metrics.emergency_vehicles
            ),
            now,
        ));
    }

    if trends.wait_time < WAIT_TIME_IMPROVEMENT {
        raised.push(new_alert(
            AlertKind::WaitTimeImproving,
            AlertSeverity::Success,
            "Wait Time Improving",
            format!("Wait time decreased by {:.1}%", trends.wait_time.abs()),
            now,
        ));
    }

    raised
}

fn new_alert(
    kind: AlertKind,
    severity: AlertSeverity,
    title: &str,
    message: String,
    now: DateTime<Utc>,
) -> Alert {
    Alert {
        id: AlertId::new(),
        kind,
        severity,
        title: title.to_owned(),
        message,
        created_at: now,
        priority: severity.priority(),
    }
}

/// Whether `alert` is still within its TTL at `now`.
pub fn is_live(alert: &Alert, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
    now.signed_duration_since(alert.created_at) < ttl
}

/// Order alerts by priority rank, newest first within a rank.
pub fn sort_alerts(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Derive the next alert list.
///
/// Newly raised alerts are unioned with `previous`, alerts older than
/// `ttl` at `now` are dropped, and the result is sorted by
/// [`sort_alerts`].
pub fn derive_alerts(
    metrics: &SnapshotMetrics,
    trends: &Trends,
    previous: &[Alert],
    now: DateTime<Utc>,
    ttl: TimeDelta,
) -> Vec<Alert> {
    let raised = evaluate_rules(metrics, trends, now);
    if !raised.is_empty() {
        debug!(raised = raised.len(), "alert rules fired");
    }

    let mut next: Vec<Alert> = previous
        .iter()
        .filter(|a| is_live(a, now, ttl))
        .cloned()
        .chain(raised)
        .collect();
    sort_alerts(&mut next);
    next
}

// ---------------------------------------------------------------------------
// Alert feed
// ---------------------------------------------------------------------------

/// The live, sorted alert list.
#[derive(Debug, Clone)]
pub struct AlertFeed {
    /// Sorted by priority, newest first within a priority.
    alerts: Vec<Alert>,
    ttl: TimeDelta,
}

impl AlertFeed {
    /// Create an empty feed whose alerts expire after `ttl`.
    pub const fn new(ttl: TimeDelta) -> Self {
        Self {
            alerts: Vec::new(),
            ttl,
        }
    }

    /// Re-derive the list for a newly ingested snapshot.
    pub fn refresh(&mut self, metrics: &SnapshotMetrics, trends: &Trends, now: DateTime<Utc>) {
        self.alerts = derive_alerts(metrics, trends, &self.alerts, now, self.ttl);
    }

    /// Alerts still live at `now`, truncated to `limit` when given.
    pub fn active(&self, now: DateTime<Utc>, limit: Option<usize>) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| is_live(a, now, self.ttl))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Remove one alert by ID.
    ///
    /// Returns `true` if the alert was found and removed.
    pub fn clear(&mut self, id: AlertId) -> bool {
        let before = self.alerts.len();
        self.alerts.retain(|a| a.id != id);
        self.alerts.len() != before
    }

    /// Remove every alert.
    pub fn clear_all(&mut self) {
        self.alerts.clear();
    }

    /// All alerts currently held, including ones that expired since the
    /// last refresh.
    pub fn all(&self) -> &[Alert] {
        &self.alerts
    }

    /// The alert expiry window.
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(congestion_level: f64, avg_wait_time: f64) -> SnapshotMetrics {
        SnapshotMetrics {
            congestion_level,
            avg_wait_time,
            ..SnapshotMetrics::default()
        }
    }

    fn five_minutes() -> TimeDelta {
        TimeDelta::seconds(300)
    }

    #[test]
    fn heavy_congestion_raises_single_critical() {
        let now = Utc::now();
        let alerts = evaluate_rules(&metrics(85.0, 3.0), &Trends::default(), now);
        assert_eq!(alerts.len(), 1);
        let alert = alerts.first();
        assert_eq!(alert.map(|a| a.kind), Some(AlertKind::Congestion));
        assert_eq!(alert.map(|a| a.severity), Some(AlertSeverity::Critical));
        assert_eq!(
            alert.map(|a| a.message.as_str()),
            Some("Traffic congestion at 85.0%")
        );
    }

    #[test]
    fn thresholds_are_inclusive_and_exclusive_as_documented() {
        let now = Utc::now();
        let trends = Trends::default();

        let at_sixty = evaluate_rules(&metrics(60.0, 0.0), &trends, now);
        assert_eq!(at_sixty.first().map(|a| a.severity), Some(AlertSeverity::Warning));

        let at_eighty = evaluate_rules(&metrics(80.0, 0.0), &trends, now);
        assert_eq!(at_eighty.first().map(|a| a.severity), Some(AlertSeverity::Critical));

        // Wait time of exactly 5 raises nothing; exactly 10 is only a warning.
        assert!(evaluate_rules(&metrics(0.0, 5.0), &trends, now).is_empty());
        let at_ten = evaluate_rules(&metrics(0.0, 10.0), &trends, now);
        assert_eq!(at_ten.first().map(|a| a.severity), Some(AlertSeverity::Warning));
        assert_eq!(
            at_ten.first().map(|a| a.message.as_str()),
            Some("Average wait time: 10.0 minutes")
        );
    }

    #[test]
    fn emergency_and_improvement_rules() {
        let now = Utc::now();
        let m = SnapshotMetrics {
            emergency_vehicles: 2,
            ..SnapshotMetrics::default()
        };
        let trends = Trends {
            wait_time: -25.0,
            ..Trends::default()
        };
        let alerts = evaluate_rules(&m, &trends, now);
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().any(|a| a.kind == AlertKind::Emergency
            && a.severity == AlertSeverity::Info
            && a.message == "2 emergency vehicle(s) in the system"));
        assert!(alerts.iter().any(|a| a.kind == AlertKind::WaitTimeImproving
            && a.severity == AlertSeverity::Success
            && a.message == "Wait time decreased by 25.0%"));
    }

    #[test]
    fn derive_merges_prunes_and_sorts() {
        let t0 = Utc::now();
        let trends = Trends::default();
        let emergency = SnapshotMetrics {
            emergency_vehicles: 1,
            ..SnapshotMetrics::default()
        };

        let first = derive_alerts(&emergency, &trends, &[], t0, five_minutes());
        assert_eq!(first.len(), 1);

        // One minute later a critical condition appears; the info alert
        // is kept and sorts after it.
        let t1 = t0 + TimeDelta::seconds(60);
        let second = derive_alerts(&metrics(90.0, 0.0), &trends, &first, t1, five_minutes());
        let kinds: Vec<AlertKind> = second.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Congestion, AlertKind::Emergency]);

        // Six minutes after t0 the info alert has expired.
        let t2 = t0 + TimeDelta::seconds(360);
        let third = derive_alerts(&metrics(0.0, 0.0), &trends, &second, t2, five_minutes());
        let kinds: Vec<AlertKind> = third.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Congestion]);
    }

    #[test]
    fn repeated_rule_accumulates_entries() {
        let mut feed = AlertFeed::new(five_minutes());
        let now = Utc::now();
        for i in 0..3 {
            feed.refresh(&metrics(85.0, 0.0), &Trends::default(), now + TimeDelta::seconds(i));
        }
        assert_eq!(feed.all().len(), 3);
        // Newest first within the same priority.
        let stamps: Vec<DateTime<Utc>> = feed.all().iter().map(|a| a.created_at).collect();
        assert!(stamps.windows(2).all(|w| w.first() >= w.get(1)));
    }

    #[test]
    fn alert_absent_after_ttl() {
        let mut feed = AlertFeed::new(five_minutes());
        let t = Utc::now();
        feed.refresh(&metrics(85.0, 3.0), &Trends::default(), t);
        assert_eq!(feed.active(t, None).len(), 1);
        assert_eq!(feed.active(t + TimeDelta::seconds(299), None).len(), 1);
        assert!(feed.active(t + TimeDelta::seconds(301), None).is_empty());
    }

    #[test]
    fn active_respects_limit() {
        let mut feed = AlertFeed::new(five_minutes());
        let now = Utc::now();
        let m = SnapshotMetrics {
            congestion_level: 90.0,
            avg_wait_time: 12.0,
            emergency_vehicles: 1,
            ..SnapshotMetrics::default()
        };
        feed.refresh(&m, &Trends::default(), now);
        assert_eq!(feed.active(now, None).len(), 3);
        assert_eq!(feed.active(now, Some(2)).len(), 2);
        assert_eq!(
            feed.active(now, Some(1)).first().map(|a| a.severity),
            Some(AlertSeverity::Critical)
        );
    }

    #[test]
    fn clear_by_id_and_clear_all() {
        let mut feed = AlertFeed::new(five_minutes());
        let now = Utc::now();
        let m = SnapshotMetrics {
            congestion_level: 70.0,
            emergency_vehicles: 1,
            ..SnapshotMetrics::default()
        };
        feed.refresh(&m, &Trends::default(), now);
        let id = feed.all().first().map_or_else(AlertId::new, |a| a.id);

        assert!(feed.clear(id));
        assert!(!feed.clear(id));
        assert_eq!(feed.all().len(), 1);

        feed.clear_all();
        assert!(feed.all().is_empty());
    }
}
