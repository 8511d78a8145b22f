//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub message: String,
    pub version: &'static str,
}

/// `GET /`: the service is up.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: format!("{} API is running", crate::config::APP_NAME),
        version: crate::config::APP_VERSION,
    })
}
