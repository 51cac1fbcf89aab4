// ABOUTME: SQLite-backed registry of known tags: id, free-form description, registration time.
// ABOUTME: The registry is a side-channel the query layer joins against the published snapshot.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Errors from registry operations. `AlreadyRegistered` maps to a 400
/// at the API boundary; everything else is a request-scoped 500.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tag already registered: {0}")]
    AlreadyRegistered(String),

    #[error("tag id must not be empty")]
    EmptyId,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One registered tag as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RegisteredTag {
    pub id: String,
    pub description: String,
    pub registered_at: String,
}

/// Handle over the registry database. Callers serialize access; the
/// connection itself is not shared across tasks.
#[derive(Debug)]
pub struct Registry {
    conn: Connection,
}

impl Registry {
    /// Open (or create) the registry at the given path and ensure the
    /// schema exists. Creates parent directories as needed.
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory registry for tests.
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RegistryError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                description TEXT NOT NULL DEFAULT '',
                registered_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Register a new tag. Fails if the id is empty or already present.
    pub fn register(&self, id: &str, description: &str) -> Result<RegisteredTag, RegistryError> {
        if id.is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if self.get(id)?.is_some() {
            return Err(RegistryError::AlreadyRegistered(id.to_string()));
        }

        let registered_at = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO tags (id, description, registered_at) VALUES (?1, ?2, ?3)",
            params![id, description, registered_at],
        )?;

        Ok(RegisteredTag {
            id: id.to_string(),
            description: description.to_string(),
            registered_at,
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<RegisteredTag>, RegistryError> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, description, registered_at FROM tags WHERE id = ?1",
                params![id],
                |row| {
                    Ok(RegisteredTag {
                        id: row.get(0)?,
                        description: row.get(1)?,
                        registered_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(tag)
    }

    pub fn list(&self) -> Result<Vec<RegisteredTag>, RegistryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, description, registered_at FROM tags ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(RegisteredTag {
                id: row.get(0)?,
                description: row.get(1)?,
                registered_at: row.get(2)?,
            })
        })?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }
}
