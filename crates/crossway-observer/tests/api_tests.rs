//! Integration tests for the observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use crossway_core::config::MetricsConfig;
use crossway_observer::router::build_router;
use crossway_observer::state::{AppState, MetricsUpdate};
use futures::StreamExt;
use crossway_types::{ConnectionState, Snapshot, SnapshotMetrics};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

fn snapshot(time: u64, congestion_level: f64, avg_wait_time: f64) -> Snapshot {
    let mut snapshot = Snapshot::from_metrics(SnapshotMetrics {
        congestion_level,
        avg_wait_time,
        throughput: 12.0,
        vehicles_processed: time * 3,
        ..SnapshotMetrics::default()
    });
    snapshot.simulation_time = time;
    snapshot
}

/// State with six snapshots ingested; the last one is heavily congested
/// with elevated waits, so two alerts are active.
async fn make_test_state() -> Arc<AppState> {
    let (_tx, rx) = watch::channel(ConnectionState::Connected);
    let state = Arc::new(AppState::with_connection(&MetricsConfig::default(), rx));

    for (i, congestion) in [20.0, 30.0, 40.0, 50.0, 60.0].into_iter().enumerate() {
        let time = u64::try_from(i).unwrap();
        state.ingest(snapshot(time, congestion, 1.0)).await;
    }
    // Clear the warning raised at 60 so only the final snapshot's alerts remain.
    state.engine.write().await.clear_all_alerts();
    state.ingest(snapshot(5, 85.0, 7.0)).await;

    state
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state)
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

type ClientSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Next metrics update pushed over the socket, skipping control frames.
async fn next_update(socket: &mut ClientSocket) -> MetricsUpdate {
    loop {
        if let Message::Text(text) = socket.next().await.unwrap().unwrap() {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn delete(state: Arc<AppState>, uri: &str) -> StatusCode {
    build_router(state)
        .oneshot(Request::delete(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_get_metrics() {
    let state = make_test_state().await;
    let (status, json) = get(state, "/api/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["current"]["congestion_level"], 85.0);
    assert_eq!(json["current"]["vehicles_processed"], 15);
    assert_eq!(json["connection"], "connected");
    assert_eq!(json["has_data"], true);
    assert!(json["trends"]["congestion"].is_number());
}

#[tokio::test]
async fn test_get_metrics_before_first_snapshot() {
    let state = Arc::new(AppState::default());
    let (status, json) = get(state, "/api/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["current"]["congestion_level"], 0.0);
    assert_eq!(json["connection"], "disconnected");
    assert_eq!(json["has_data"], false);
}

#[tokio::test]
async fn test_get_summary() {
    let state = make_test_state().await;
    let (status, json) = get(state, "/api/summary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["statistics"]["data_points"], 6);
    assert_eq!(json["alerts"].as_array().unwrap().len(), 2);
    assert_eq!(json["current"]["congestion_level"], 85.0);
}

#[tokio::test]
async fn test_list_alerts_sorted_by_priority() {
    let state = make_test_state().await;
    let (status, json) = get(state, "/api/alerts").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["alerts"][0]["severity"], "critical");
    assert_eq!(json["alerts"][0]["kind"], "congestion");
    assert_eq!(json["alerts"][0]["message"], "Traffic congestion at 85.0%");
    assert_eq!(json["alerts"][1]["severity"], "warning");
    assert_eq!(json["alerts"][1]["kind"], "wait_time");
}

#[tokio::test]
async fn test_list_alerts_with_limit() {
    let state = make_test_state().await;
    let (status, json) = get(state, "/api/alerts?limit=1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["alerts"][0]["priority"], 1);
}

#[tokio::test]
async fn test_clear_alert() {
    let state = make_test_state().await;
    let (_, json) = get(Arc::clone(&state), "/api/alerts").await;
    let id = json["alerts"][0]["id"].as_str().unwrap().to_owned();

    let status = delete(Arc::clone(&state), &format!("/api/alerts/{id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Clearing again is a 404.
    let status = delete(Arc::clone(&state), &format!("/api/alerts/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = get(state, "/api/alerts").await;
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn test_clear_alert_invalid_uuid() {
    let state = make_test_state().await;
    let status = delete(state, "/api/alerts/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_all_alerts() {
    let state = make_test_state().await;
    let status = delete(Arc::clone(&state), "/api/alerts").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = get(state, "/api/alerts").await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_chart_series() {
    let state = make_test_state().await;
    let (status, json) = get(state, "/api/chart/congestion_level?points=3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["metric"], "congestion_level");
    assert_eq!(json["count"], 3);
    let values: Vec<f64> = json["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["value"].as_f64().unwrap())
        .collect();
    assert_eq!(values, vec![50.0, 60.0, 85.0]);
    assert_eq!(json["points"][0]["index"], 0);
}

#[tokio::test]
async fn test_chart_series_default_points() {
    let state = make_test_state().await;
    let (status, json) = get(state, "/api/chart/throughput").await;

    assert_eq!(status, StatusCode::OK);
    // Fewer snapshots than the default of 20.
    assert_eq!(json["count"], 6);
}

#[tokio::test]
async fn test_chart_unknown_metric() {
    let state = make_test_state().await;
    let (status, json) = get(state, "/api/chart/latency").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    assert!(json["error"].as_str().unwrap().contains("latency"));
}

#[tokio::test]
async fn test_chart_zero_points_rejected() {
    let state = make_test_state().await;
    let (status, json) = get(state, "/api/chart/throughput?points=0").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid query: points must be at least 1");
}

#[tokio::test]
async fn test_health() {
    let state = make_test_state().await;
    let (status, json) = get(state, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["connection"], "connected");
    assert_eq!(json["data_points"], 6);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let state = make_test_state().await;
    let response = build_router(state)
        .oneshot(Request::get("/api/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ingest_broadcasts_update() {
    let state = Arc::new(AppState::default());
    let mut rx = state.subscribe();

    state.ingest(snapshot(9, 10.0, 0.5)).await;

    let update = rx.recv().await.unwrap();
    assert_eq!(update.simulation_time, 9);
    assert_eq!(update.data_points, 1);
    assert_eq!(update.active_alerts, 0);
}

#[tokio::test]
async fn test_ws_sends_current_update_then_stream() {
    let state = make_test_state().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(Arc::clone(&state));
    tokio::spawn(async move { axum::serve(listener, app).await });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/metrics"))
        .await
        .unwrap();

    // A late client gets the latest state without waiting for an ingestion.
    let initial = next_update(&mut socket).await;
    assert_eq!(initial.simulation_time, 5);
    assert_eq!(initial.data_points, 6);
    assert_eq!(initial.active_alerts, 2);
    assert!((initial.current.congestion_level - 85.0).abs() < f64::EPSILON);

    state.ingest(snapshot(6, 30.0, 1.0)).await;
    let next = next_update(&mut socket).await;
    assert_eq!(next.simulation_time, 6);
    assert_eq!(next.data_points, 7);
}
