// ABOUTME: Restart-safe tail reader producing a lazy, effectively infinite sequence of feed lines.
// ABOUTME: Resumes from a durable cursor, suspends on a bounded poll when idle, never delivers partial lines.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::cursor::{CursorError, CursorFile};

const READ_CHUNK: usize = 8192;

/// Errors produced by the tail reader. `SourceUnavailable` is fatal to
/// the reconciliation loop; the reader never fabricates data past it.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("feed source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tails an append-only feed file from a durable cursor position.
///
/// Lines are delivered in file order. The cursor only advances past a
/// line when the caller invokes [`commit`](TailReader::commit) after
/// processing it, so a crash between read and commit re-delivers the
/// line on restart (at-least-once).
#[derive(Debug)]
pub struct TailReader {
    source: PathBuf,
    file: File,
    cursor: CursorFile,
    /// Offset durably recorded in the cursor file.
    committed: u64,
    /// Offset just past the last line handed to the caller.
    delivered: u64,
    /// Bytes read from the file but not yet terminated by a newline.
    buf: Vec<u8>,
    poll: Duration,
}

impl TailReader {
    /// Open the feed for tailing, creating it empty if it does not exist.
    ///
    /// With a persisted cursor, reading resumes at that offset so lines
    /// appended while the process was down are not skipped. Without one
    /// (first run) reading starts at end-of-file: historical data is not
    /// replayed, only new appends. A cursor pointing past the current end
    /// of file means the feed was rewritten underneath us; reading
    /// restarts at the beginning rather than skipping data.
    pub fn open(
        source: impl Into<PathBuf>,
        cursor_path: impl Into<PathBuf>,
        poll: Duration,
    ) -> Result<Self, TailError> {
        let source = source.into();

        if let Some(parent) = source.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        // Touch the file into existence without truncating an existing feed.
        drop(OpenOptions::new().create(true).append(true).open(&source)?);

        let mut file = File::open(&source)?;
        let len = file.metadata()?.len();

        let cursor = CursorFile::new(cursor_path);
        let start = match cursor.load()? {
            Some(offset) if offset <= len => offset,
            Some(offset) => {
                tracing::warn!(
                    source = %source.display(),
                    offset,
                    len,
                    "cursor is past end of feed, assuming the feed was rewritten; restarting from 0"
                );
                0
            }
            None => {
                tracing::info!(
                    source = %source.display(),
                    offset = len,
                    "no cursor found, starting at end of feed"
                );
                len
            }
        };

        file.seek(SeekFrom::Start(start))?;
        cursor.store(start)?;

        Ok(Self {
            source,
            file,
            cursor,
            committed: start,
            delivered: start,
            buf: Vec::new(),
            poll,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Offset durably recorded so far. Test hook and diagnostics.
    pub fn committed_offset(&self) -> u64 {
        self.committed
    }

    /// Wait for and return the next complete line, without its newline.
    ///
    /// Suspends on a bounded poll interval while no new data is present.
    /// A trailing fragment with no newline yet stays buffered until the
    /// writer finishes the line. Returns `SourceUnavailable` if the feed
    /// file disappears or a read fails mid-stream.
    pub async fn next_line(&mut self) -> Result<String, TailError> {
        loop {
            if let Some(line) = self.take_buffered_line() {
                return Ok(line);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.file.read(&mut chunk).map_err(|e| {
                TailError::SourceUnavailable(format!(
                    "read failed on {}: {}",
                    self.source.display(),
                    e
                ))
            })?;

            if n == 0 {
                if !self.source.exists() {
                    return Err(TailError::SourceUnavailable(format!(
                        "feed file deleted: {}",
                        self.source.display()
                    )));
                }
                tokio::time::sleep(self.poll).await;
            } else {
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }
    }

    /// Durably advance the cursor past every line delivered so far.
    /// Called by the reconciliation loop after a line has been fully
    /// processed, never before.
    pub fn commit(&mut self) -> Result<(), TailError> {
        if self.delivered != self.committed {
            self.cursor.store(self.delivered)?;
            self.committed = self.delivered;
        }
        Ok(())
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        let newline = self.buf.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buf.drain(..=newline).collect();
        self.delivered += line_bytes.len() as u64;

        // Drop the newline; the parser trims any stray \r itself.
        let line = String::from_utf8_lossy(&line_bytes[..newline]).into_owned();
        Some(line)
    }
}
