//! Error types for the dashboard binary.
//!
//! [`DashboardError`] wraps every failure that can abort startup or the
//! serve loop, so `main` can propagate with `?`.

/// Top-level error for the dashboard binary.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: crossway_core::ConfigError,
    },

    /// Observer API server failed to start or crashed.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: crossway_observer::ServerError,
    },
}
