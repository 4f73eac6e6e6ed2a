//! Route modules.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod resume;

/// Every route the server exposes, with the resume context nested under
/// `/api/v1/resume`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/resume", resume::router())
}
