//! Vitae API server entry point.

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vitae_api::config::Config;
use vitae_api::error::AppError;
use vitae_api::routes;
use vitae_api::state::AppState;
use vitae_api::telemetry;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let guard = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!(
        otlp = config.otlp_endpoint.is_some(),
        max_in_flight = config.fan_out.max_in_flight,
        deadline_ms = u64::try_from(config.fan_out.deadline.as_millis()).unwrap_or(u64::MAX),
        "Starting Vitae API server"
    );

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;

    let app_state = AppState::postgres(&pool, config.fan_out);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::api_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = config.socket_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await;

    pool.close().await;
    guard.shutdown();
    served.map_err(AppError::from)
}
