// ABOUTME: Shared application state for the tagwatch HTTP server.
// ABOUTME: Holds the registry behind an async mutex and the path of the published snapshot file.

use std::path::PathBuf;
use std::sync::Arc;

use tagwatch_core::TagSnapshot;
use tagwatch_ingest::{PublishError, read_snapshot};
use tokio::sync::Mutex;

use crate::registry::Registry;

/// Shared state accessible by all Axum handlers. The registry connection
/// is not Sync, so it lives behind a tokio mutex; the snapshot is re-read
/// from disk per request and treated as immutable once parsed.
pub struct AppState {
    pub registry: Mutex<Registry>,
    pub snapshot_path: PathBuf,
}

/// Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(registry: Registry, snapshot_path: PathBuf) -> Self {
        Self {
            registry: Mutex::new(registry),
            snapshot_path,
        }
    }

    /// Load the latest published snapshot. Missing file means the
    /// pipeline has not published yet; that is an empty snapshot, not
    /// an error.
    pub fn load_snapshot(&self) -> Result<TagSnapshot, PublishError> {
        read_snapshot(&self.snapshot_path)
    }
}
