//! Crossway dashboard binary.
//!
//! Connects to the traffic simulation's WebSocket feed, keeps a rolling
//! window of snapshots with trends and alerts, and serves them read-only
//! over HTTP and WebSocket until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `crossway-config.yaml` (or
//!    `$CROSSWAY_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the live feed and the shared observer state
//! 4. Start the bridge from feed messages to the metrics engine
//! 5. Connect to the simulation feed
//! 6. Serve the observer API until `Ctrl-C`
//! 7. Stop the bridge and close the feed

mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossway_core::DashboardConfig;
use crossway_live::{LiveFeed, ReconnectPolicy, WsTransport};
use crossway_observer::{AppState, spawn_bridge, start_server};
use crossway_types::ConnectionState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::DashboardError;

/// Default configuration file, relative to the working directory.
const CONFIG_FILE: &str = "crossway-config.yaml";

/// How long shutdown waits for the feed's close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the observer server
/// cannot bind.
#[tokio::main]
async fn main() -> Result<(), DashboardError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        feed_url = %config.feed.url,
        history_capacity = config.metrics.history_capacity,
        trend_window = config.metrics.trend_window,
        alert_ttl_seconds = config.metrics.alert_ttl_seconds,
        "crossway-dashboard starting"
    );

    // 3. Create the feed and shared state.
    let feed = LiveFeed::new(WsTransport, ReconnectPolicy::from(&config.feed));
    let state = Arc::new(AppState::with_connection(
        &config.metrics,
        feed.watch_state(),
    ));
    feed.on_connection_change(|connected| info!(connected, "Feed connection changed"));
    feed.on_error(|err| warn!(error = %err, "Feed error"));

    // 4. Start the bridge.
    let bridge = spawn_bridge(&feed, Arc::clone(&state));
    info!("Feed bridge started");

    // 5. Connect.
    feed.connect(&config.feed.url);

    // 6. Serve until interrupted.
    let served = start_server(&config.observer, state, shutdown_signal()).await;

    // 7. Tear down, even when serving failed.
    bridge.shutdown();
    feed.disconnect();
    let mut states = feed.watch_state();
    let closed = tokio::time::timeout(
        CLOSE_GRACE,
        states.wait_for(|s| *s != ConnectionState::Closing),
    )
    .await
    .is_ok();
    if !closed {
        warn!("Feed close handshake timed out");
    }

    served?;
    info!("crossway-dashboard shutdown complete");
    Ok(())
}

/// Load configuration from `$CROSSWAY_CONFIG` or `crossway-config.yaml`.
///
/// A missing file yields defaults, with environment overrides still
/// applied.
fn load_config() -> Result<DashboardConfig, DashboardError> {
    let path = std::env::var_os("CROSSWAY_CONFIG")
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = if path.exists() {
        DashboardConfig::from_file(&path)?
    } else {
        DashboardConfig::parse("")?
    };
    Ok(config)
}

/// Resolve on `Ctrl-C`. If the handler cannot be installed, never resolve.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "failed to listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
