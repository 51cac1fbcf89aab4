// ABOUTME: Durable byte-offset cursor marking how far into the feed file the reader has consumed.
// ABOUTME: Persisted as a small JSON file with atomic write (tmp + fsync + rename) for crash safety.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or storing the cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorData {
    offset: u64,
}

/// On-disk cursor file. Owned exclusively by the tail reader; no other
/// component reads or writes it.
#[derive(Debug)]
pub struct CursorFile {
    path: PathBuf,
}

impl CursorFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted offset, or None when no cursor has been written yet.
    pub fn load(&self) -> Result<Option<u64>, CursorError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let data: CursorData = serde_json::from_str(&contents)?;
        Ok(Some(data.offset))
    }

    /// Persist a new offset atomically: write to a temp file, fsync, rename.
    /// A crash mid-store leaves the previous cursor intact, which at worst
    /// re-delivers lines the store handles idempotently.
    pub fn store(&self, offset: u64) -> Result<(), CursorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(&CursorData { offset })?;
        let tmp_path = self.path.with_extension("cursor.tmp");

        let mut file = File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_returns_none_when_absent() {
        let dir = TempDir::new().unwrap();
        let cursor = CursorFile::new(dir.path().join("feed.log.cursor"));
        assert!(cursor.load().unwrap().is_none());
    }

    #[test]
    fn store_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let cursor = CursorFile::new(dir.path().join("feed.log.cursor"));

        cursor.store(1234).unwrap();
        assert_eq!(cursor.load().unwrap(), Some(1234));

        cursor.store(5678).unwrap();
        assert_eq!(cursor.load().unwrap(), Some(5678));
    }

    #[test]
    fn store_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let cursor = CursorFile::new(dir.path().join("nested").join("feed.log.cursor"));

        cursor.store(42).unwrap();
        assert_eq!(cursor.load().unwrap(), Some(42));
    }

    #[test]
    fn store_leaves_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let cursor = CursorFile::new(dir.path().join("feed.log.cursor"));
        cursor.store(7).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["feed.log.cursor".to_string()]);
    }
}
