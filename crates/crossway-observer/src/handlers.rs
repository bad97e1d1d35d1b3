//! REST API endpoint handlers for the observer server.
//!
//! All reads take the engine's read lock for the duration of one query, so
//! a response never mixes state from two ingestions.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/metrics` | Current metrics, trends, connection state |
//! | `GET` | `/api/summary` | Summary with top alerts and window statistics |
//! | `GET` | `/api/alerts` | Active alerts (`?limit=N`) |
//! | `DELETE` | `/api/alerts` | Clear every alert |
//! | `DELETE` | `/api/alerts/{id}` | Clear one alert |
//! | `GET` | `/api/chart/{metric}` | Chart series (`?points=N`, default 20) |
//! | `GET` | `/api/health` | Connection state and data point count |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use crossway_core::DEFAULT_CHART_POINTS;
use crossway_types::AlertId;
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/alerts`.
#[derive(Debug, serde::Deserialize)]
pub struct AlertsQuery {
    /// Maximum number of alerts to return. All when absent.
    pub limit: Option<usize>,
}

/// Query parameters for `GET /api/chart/{metric}`.
#[derive(Debug, serde::Deserialize)]
pub struct ChartQuery {
    /// Number of most recent snapshots to chart.
    pub points: Option<usize>,
}

// ---------------------------------------------------------------------------
// GET /api/metrics
// ---------------------------------------------------------------------------

/// Current metrics with derived scores, trends and feed connection state.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let engine = state.engine.read().await;

    Json(serde_json::json!({
        "current": engine.current_metrics(),
        "trends": engine.trends(),
        "connection": state.connection_state(),
        "has_data": engine.latest().is_some(),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/summary
// ---------------------------------------------------------------------------

/// Current metrics, trends, the first five active alerts and window
/// statistics.
pub async fn get_summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    Json(engine.summary())
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Active alerts sorted by priority, then newest first.
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertsQuery>,
) -> impl IntoResponse {
    let engine = state.engine.read().await;
    let alerts = engine.active_alerts(params.limit);

    Json(serde_json::json!({
        "count": alerts.len(),
        "alerts": alerts,
    }))
}

/// Remove one alert. `404` if no alert has that id.
pub async fn clear_alert(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = parse_alert_id(&id_str)?;

    let cleared = state.engine.write().await.clear_alert(id);
    if !cleared {
        return Err(ObserverError::NotFound(format!("alert {id}")));
    }

    info!(%id, "alert cleared");
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every alert.
pub async fn clear_all_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.engine.write().await.clear_all_alerts();
    info!("all alerts cleared");
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// GET /api/chart/{metric}
// ---------------------------------------------------------------------------

/// Chart series for one metric over the most recent `points` snapshots.
/// `points=0` is rejected with `400`.
pub async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path(metric): Path<String>,
    Query(params): Query<ChartQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let points = params.points.unwrap_or(DEFAULT_CHART_POINTS);
    if points == 0 {
        return Err(ObserverError::InvalidQuery("points must be at least 1".to_owned()));
    }
    let engine = state.engine.read().await;
    let series = engine.chart_series_by_name(&metric, points)?;

    Ok(Json(serde_json::json!({
        "metric": metric,
        "count": series.len(),
        "points": series,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Liveness plus feed connection state.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let data_points = state.engine.read().await.store().len();

    Json(serde_json::json!({
        "status": "ok",
        "connection": state.connection_state(),
        "data_points": data_points,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_alert_id(s: &str) -> Result<AlertId, ObserverError> {
    s.parse::<AlertId>()
        .map_err(|e| ObserverError::InvalidUuid(format!("{s}: {e}")))
}
