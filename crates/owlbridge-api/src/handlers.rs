//! Status handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use owlbridge_core::HealthState;

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: u64,
}

/// 200 `running` while the message loop is alive and connected, 503
/// `unavailable` otherwise.
pub async fn status_handler(State(health): State<HealthState>) -> (StatusCode, Json<StatusResponse>) {
    let (code, status) = if health.is_healthy() {
        (StatusCode::OK, "running")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        code,
        Json(StatusResponse {
            status,
            version: owlbridge_core::VERSION,
            uptime: health.uptime_secs(),
        }),
    )
}
