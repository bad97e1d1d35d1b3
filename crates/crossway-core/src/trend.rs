//! Percent-change trends between consecutive snapshot windows.
//!
//! For metric `m` and window size `k`, the recent window `R` is the last `k`
//! snapshots and the prior window `P` is the `k` snapshots before it:
//!
//! ```text
//! trend(m) = (mean(R, m) - mean(P, m)) / mean(P, m) * 100
//! ```
//!
//! The trend is `0` while fewer than `2k` snapshots exist or when
//! `mean(P, m)` is zero. It is recomputed from the window on every
//! ingestion; no running mean is kept.

use std::sync::Arc;

use crossway_types::{MetricKey, Trends};

use crate::store::RecordedSnapshot;

/// Compute the trend of `key` over `history` (oldest first).
pub fn trend(history: &[Arc<RecordedSnapshot>], key: MetricKey, k: usize) -> f64 {
    let Some(needed) = k.checked_mul(2) else {
        return 0.0;
    };
    if k == 0 || history.len() < needed {
        return 0.0;
    }

    let start = history.len().saturating_sub(needed);
    let Some(tail) = history.get(start..) else {
        return 0.0;
    };
    let (prior, recent) = tail.split_at(k);

    let prior_mean = mean(prior, key);
    if prior_mean == 0.0 {
        return 0.0;
    }
    let recent_mean = mean(recent, key);

    (recent_mean - prior_mean) / prior_mean * 100.0
}

/// Compute every trend the dashboard reports.
pub fn compute_trends(history: &[Arc<RecordedSnapshot>], k: usize) -> Trends {
    Trends {
        wait_time: trend(history, MetricKey::AvgWaitTime, k),
        congestion: trend(history, MetricKey::CongestionLevel, k),
        throughput: trend(history, MetricKey::Throughput, k),
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(window: &[Arc<RecordedSnapshot>], key: MetricKey) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let sum: f64 = window
        .iter()
        .map(|entry| entry.snapshot.metrics.value(key))
        .sum();
    sum / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crossway_types::{Snapshot, SnapshotMetrics};

    fn history(values: &[f64]) -> Vec<Arc<RecordedSnapshot>> {
        values
            .iter()
            .map(|&congestion_level| {
                Arc::new(RecordedSnapshot {
                    received_at: Utc::now(),
                    snapshot: Snapshot::from_metrics(SnapshotMetrics {
                        congestion_level,
                        ..SnapshotMetrics::default()
                    }),
                })
            })
            .collect()
    }

    #[test]
    fn flat_series_has_zero_trend() {
        let h = history(&[50.0; 10]);
        assert!(trend(&h, MetricKey::CongestionLevel, 5).abs() < 1e-9);
    }

    #[test]
    fn doubling_mean_is_one_hundred_percent() {
        let h = history(&[40.0, 60.0, 50.0, 45.0, 55.0, 100.0, 100.0, 90.0, 110.0, 100.0]);
        let t = trend(&h, MetricKey::CongestionLevel, 5);
        assert!((t - 100.0).abs() < 1e-9, "trend was {t}");
    }

    #[test]
    fn halving_mean_is_minus_fifty_percent() {
        let h = history(&[20.0, 20.0, 10.0, 10.0]);
        let t = trend(&h, MetricKey::CongestionLevel, 2);
        assert!((t + 50.0).abs() < 1e-9, "trend was {t}");
    }

    #[test]
    fn short_history_has_zero_trend() {
        let h = history(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]);
        assert!(trend(&h, MetricKey::CongestionLevel, 5).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_prior_mean_has_zero_trend() {
        let h = history(&[0.0, 0.0, 5.0, 5.0]);
        assert!(trend(&h, MetricKey::CongestionLevel, 2).abs() < f64::EPSILON);
    }

    #[test]
    fn only_the_last_two_windows_count() {
        // The leading 1000s fall outside both windows.
        let h = history(&[1000.0, 1000.0, 10.0, 10.0, 15.0, 15.0]);
        let t = trend(&h, MetricKey::CongestionLevel, 2);
        assert!((t - 50.0).abs() < 1e-9, "trend was {t}");
    }

    #[test]
    fn compute_trends_fills_every_field() {
        let h = history(&[10.0, 20.0]);
        let trends = compute_trends(&h, 1);
        assert!((trends.congestion - 100.0).abs() < 1e-9);
        assert!(trends.wait_time.abs() < f64::EPSILON);
        assert!(trends.throughput.abs() < f64::EPSILON);
    }
}
