use axum::Json;
use axum::extract::State;

use super::AppState;
use super::schemas::{HealthResponse, MetricsResponse};

/// `GET /health` -- service status plus a metrics snapshot.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        metrics: state.gateway.metrics().snapshot().into(),
    })
}

/// `GET /metrics` -- gateway counters.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    summary = "Gateway metrics",
    responses(
        (status = 200, description = "Counters since startup", body = MetricsResponse)
    )
)]
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(state.gateway.metrics().snapshot().into())
}
