//! Snapshot history, trends, alerts, and configuration for the Crossway
//! dashboard.
//!
//! Everything in this crate is synchronous and free of I/O apart from
//! reading the configuration file. Time is always passed in, so the whole
//! pipeline can be driven deterministically from tests.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `crossway-config.yaml` into
//!   strongly-typed structs.
//! - [`store`] -- Bounded FIFO history of received snapshots.
//! - [`trend`] -- Percent-change trends between consecutive windows.
//! - [`alerts`] -- Threshold rules and the expiring alert feed.
//! - [`engine`] -- [`MetricsEngine`], the query surface over all of the above.
//! - [`error`] -- [`MetricsError`].

pub mod alerts;
pub mod config;
pub mod engine;
pub mod error;
pub mod store;
pub mod trend;

pub use config::{ConfigError, DashboardConfig};
pub use engine::{DEFAULT_CHART_POINTS, MetricsEngine};
pub use error::MetricsError;
