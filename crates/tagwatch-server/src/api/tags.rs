// ABOUTME: Tag API handlers: registration, listing with live status, and per-tag detail.
// ABOUTME: Joins the SQLite registry against the published snapshot, tolerating either side being absent.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tagwatch_core::TagSnapshot;

use crate::app_state::SharedState;
use crate::registry::{RegisteredTag, RegistryError};

/// Joined view of one tag: registry fields plus last-known status.
/// A tag can appear in the snapshot before it is registered
/// (auto-discovery, empty description) or be registered before it is
/// ever seen (null status fields).
#[derive(Debug, Serialize)]
pub struct TagView {
    pub id: String,
    pub description: String,
    pub registered_at: Option<String>,
    pub last_cnt: Option<i64>,
    pub last_seen: Option<String>,
}

/// Request body for registering a tag.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub id: String,
    #[serde(default)]
    pub description: String,
}

fn join_one(id: &str, registered: Option<&RegisteredTag>, snapshot: &TagSnapshot) -> TagView {
    let status = snapshot.get(id);
    TagView {
        id: id.to_string(),
        description: registered.map(|t| t.description.clone()).unwrap_or_default(),
        registered_at: registered.map(|t| t.registered_at.clone()),
        last_cnt: status.map(|s| s.last_cnt),
        last_seen: status.map(|s| s.last_seen.clone()),
    }
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> axum::response::Response {
    // Detail goes to the log, never to the caller.
    tracing::error!(error = %err, "{context}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal error" })),
    )
        .into_response()
}

/// GET /tags - all known tags (registered or sighted) with their status.
pub async fn list_tags(State(state): State<SharedState>) -> impl IntoResponse {
    let snapshot = match state.load_snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => return internal_error("failed to load snapshot", e),
    };

    let registered = {
        let registry = state.registry.lock().await;
        match registry.list() {
            Ok(tags) => tags,
            Err(e) => return internal_error("failed to list registry", e),
        }
    };

    // Union of both sides, keyed and sorted by id.
    let mut views: BTreeMap<String, TagView> = BTreeMap::new();
    for tag in &registered {
        views.insert(tag.id.clone(), join_one(&tag.id, Some(tag), &snapshot));
    }
    for id in snapshot.keys() {
        views
            .entry(id.clone())
            .or_insert_with(|| join_one(id, None, &snapshot));
    }

    Json(views.into_values().collect::<Vec<_>>()).into_response()
}

/// GET /tag/{id} - one tag's joined view, 404 when entirely unknown.
pub async fn get_tag(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let snapshot = match state.load_snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => return internal_error("failed to load snapshot", e),
    };

    let registered = {
        let registry = state.registry.lock().await;
        match registry.get(&id) {
            Ok(tag) => tag,
            Err(e) => return internal_error("failed to read registry", e),
        }
    };

    if registered.is_none() && !snapshot.contains_key(&id) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("tag not found: {id}") })),
        )
            .into_response();
    }

    Json(join_one(&id, registered.as_ref(), &snapshot)).into_response()
}

/// POST /tags - register a tag, 400 when already registered.
pub async fn register_tag(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let registry = state.registry.lock().await;
    match registry.register(&req.id, &req.description) {
        Ok(tag) => (StatusCode::CREATED, Json(tag)).into_response(),
        Err(e @ (RegistryError::AlreadyRegistered(_) | RegistryError::EmptyId)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => internal_error("failed to register tag", e),
    }
}
