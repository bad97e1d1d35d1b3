//! Error types for metrics queries.

use crossway_types::UnknownMetric;

/// Errors returned by [`MetricsEngine`](crate::engine::MetricsEngine)
/// queries.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The requested metric name is not part of a snapshot.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
}

impl From<UnknownMetric> for MetricsError {
    fn from(err: UnknownMetric) -> Self {
        Self::UnknownMetric(err.0)
    }
}
