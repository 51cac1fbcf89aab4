// ABOUTME: HTTP query layer for tagwatch: read-only projection over the published snapshot plus tag registry.
// ABOUTME: Axum router with registration, listing, detail, and health endpoints.

pub mod api;
pub mod app_state;
pub mod registry;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use registry::{RegisteredTag, Registry, RegistryError};
pub use routes::create_router;
