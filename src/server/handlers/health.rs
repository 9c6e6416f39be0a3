use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::server::AppState;
use crate::types::HealthSignal;

/// Liveness probe: returns 200 OK if the server process is running.
pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Readiness probe: the feed must be connected (when enabled) and the last
/// bulk refresh must not have failed.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let feed = match &state.feed {
        Some(supervisor) => supervisor.health(),
        None => HealthSignal::healthy_with("feed disabled"),
    };
    let refresh = state.refresh.health();
    let ready = feed.healthy && refresh.healthy;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "feed": feed,
        "refresh": refresh,
        "systems": state.index.system_count(),
        "stations": state.index.station_count(),
    });
    (status, Json(body))
}
