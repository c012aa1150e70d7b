//! Liveness and readiness probes.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::constants::READINESS_TIMEOUT_SECS;
use crate::state::AppState;

/// Liveness probe - process is running.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - metadata store round trip.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Database reachable"),
        (status = 503, description = "Database unreachable or slow")
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeout = Duration::from_secs(READINESS_TIMEOUT_SECS);

    let database = match tokio::time::timeout(timeout, state.images.metadata().ping()).await {
        Ok(Ok(())) => "ready".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Database readiness check failed");
            format!("not_ready: {}", e)
        }
        Err(_) => {
            tracing::error!("Database readiness check timed out");
            "timeout".to_string()
        }
    };

    let ready = database == "ready";
    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = serde_json::json!({
        "status": if ready { "ready" } else { "not_ready" },
        "database": database,
    });

    (status_code, Json(body))
}
