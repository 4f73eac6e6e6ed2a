//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use vitae_core::clock::Clock;
use vitae_resume::application::collections::ResumeCollections;
use vitae_resume::application::fanout::FanOutPolicy;
use vitae_resume::domain::documents::{Reference, Resume, WorkHistory};
use vitae_store::pg_collection::{PgAggregateCollection, PgChildCollection};
use vitae_test_support::{FixedClock, InMemoryAggregateCollection, InMemoryChildCollection};

use vitae_api::routes;
use vitae_api::state::AppState;

fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::default())
}

/// Builds an app backed by fresh in-memory collections. Returns the state
/// too so tests can share it across several one-shot requests.
pub fn in_memory_state() -> AppState {
    let collections = ResumeCollections::new(
        Arc::new(InMemoryAggregateCollection::<Resume>::new()),
        Arc::new(InMemoryChildCollection::<WorkHistory>::new()),
        Arc::new(InMemoryChildCollection::<Reference>::new()),
    );
    AppState::new(fixed_clock(), collections, FanOutPolicy::default())
}

/// State backed by the `PostgreSQL` collections and a fixed clock.
pub fn pg_state(pool: &PgPool) -> AppState {
    let collections = ResumeCollections::new(
        Arc::new(PgAggregateCollection::<Resume>::new(pool.clone())),
        Arc::new(PgChildCollection::<WorkHistory>::new(pool.clone())),
        Arc::new(PgChildCollection::<Reference>::new(pool.clone())),
    );
    AppState::new(fixed_clock(), collections, FanOutPolicy::default())
}

/// Build the full app router over `state`. Uses the same route structure as
/// `main.rs`.
pub fn build_test_app(state: AppState) -> Router {
    routes::api_router().with_state(state)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
