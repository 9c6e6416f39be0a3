use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use prometheus::{Encoder, TextEncoder};

use crate::metrics::{STATIONS_TRACKED, SYSTEMS_TRACKED};
use crate::server::AppState;

/// Serves Prometheus metrics in the text exposition format. Index size gauges
/// are refreshed on every scrape.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    SYSTEMS_TRACKED.set(state.index.system_count() as i64);
    STATIONS_TRACKED.set(state.index.station_count() as i64);

    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    match encoder.encode(&prometheus::gather(), &mut buf) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            buf,
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("metrics encoding failed: {e}").into_bytes(),
            )
        }
    }
}
