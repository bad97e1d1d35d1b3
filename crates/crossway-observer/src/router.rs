//! Axum router construction for the observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the observer server.
///
/// The router includes:
/// - `GET /ws/metrics` -- `WebSocket` metrics update stream
/// - `GET /api/metrics` -- current metrics and trends
/// - `GET /api/summary` -- summary with top alerts
/// - `GET, DELETE /api/alerts` -- list or clear alerts
/// - `DELETE /api/alerts/{id}` -- clear one alert
/// - `GET /api/chart/{metric}` -- chart series
/// - `GET /api/health` -- liveness and connection state
///
/// CORS allows any origin so a separately served view layer can call it.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws/metrics", get(ws::ws_metrics))
        // REST API
        .route("/api/metrics", get(handlers::get_metrics))
        .route("/api/summary", get(handlers::get_summary))
        .route(
            "/api/alerts",
            get(handlers::list_alerts).delete(handlers::clear_all_alerts),
        )
        .route(
            "/api/alerts/{id}",
            axum::routing::delete(handlers::clear_alert),
        )
        .route("/api/chart/{metric}", get(handlers::get_chart))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
