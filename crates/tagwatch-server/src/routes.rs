// ABOUTME: Route definitions for the tagwatch HTTP API.
// ABOUTME: Assembles all endpoints into a single Axum Router with shared state and request tracing.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tags", get(api::tags::list_tags).post(api::tags::register_tag))
        .route("/tag/{id}", get(api::tags::get_tag))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health probe. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
