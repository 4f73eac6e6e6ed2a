//! Liveness endpoint. Does not touch the database.

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::health_check;

    #[tokio::test]
    async fn test_health_reports_service_and_version() {
        let response = health_check().await;

        assert_eq!(response.status, "ok");
        assert_eq!(response.service, "vitae-api");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }
}
