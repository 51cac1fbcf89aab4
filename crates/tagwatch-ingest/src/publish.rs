// ABOUTME: Snapshot publisher writing the full per-tag state where external readers can see it.
// ABOUTME: Atomic whole-file rewrite (tmp + fsync + rename) so consumers never observe a torn snapshot.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tagwatch_core::TagSnapshot;
use thiserror::Error;

/// Errors from publishing a snapshot. Recoverable: the in-memory store
/// stays authoritative and the next state change retries publication.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Destination for published snapshots. The reconciliation loop is generic
/// over this seam so tests can capture publishes in memory.
pub trait SnapshotSink {
    fn publish(&mut self, snapshot: &TagSnapshot) -> Result<(), PublishError>;
}

/// Publishes snapshots as one pretty-printed JSON object per file,
/// fully rewritten on every publish. Readers must not assume diff
/// semantics; each publish replaces the whole document.
#[derive(Debug)]
pub struct JsonSnapshotFile {
    path: PathBuf,
}

impl JsonSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for JsonSnapshotFile {
    fn publish(&mut self, snapshot: &TagSnapshot) -> Result<(), PublishError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Read a published snapshot back. A missing file is an empty snapshot:
/// the pipeline may simply not have published yet.
pub fn read_snapshot(path: &Path) -> Result<TagSnapshot, PublishError> {
    if !path.exists() {
        return Ok(TagSnapshot::new());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
