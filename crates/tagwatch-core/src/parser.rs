// ABOUTME: Parser for raw feed lines in the `TAG,<id>,<cnt>,<timestamp>` wire format.
// ABOUTME: Pure and deterministic; malformed lines become typed errors the caller logs and skips.

use thiserror::Error;

/// Record-type marker every valid feed line must start with.
const RECORD_MARKER: &str = "TAG";

/// Number of comma-separated fields in a valid feed line.
const FIELD_COUNT: usize = 4;

/// Minimum length of a plausible `YYYYMMDDHHMMSS.mmm` timestamp field.
const MIN_TIMESTAMP_LEN: usize = 10;

/// Errors produced when a raw feed line fails validation.
/// All variants are recoverable: the line is logged and skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {FIELD_COUNT} comma-separated fields, got {0}")]
    MalformedRecord(usize),

    #[error("unknown record type: {0:?}")]
    UnknownRecordType(String),

    #[error("empty tag identifier")]
    EmptyIdentifier,

    #[error("counter is not an integer: {0:?}")]
    InvalidCounter(String),

    #[error("implausible timestamp: {0:?}")]
    InvalidTimestamp(String),
}

/// One tag sighting as reported by the upstream feed.
/// Constructed only by [`parse_line`] and consumed exactly once by the
/// reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEvent {
    pub tag_id: String,
    pub cnt: i64,
    pub timestamp: String,
}

/// Parse one raw feed line into a [`TagEvent`].
///
/// The line is trimmed and split on commas into exactly four fields:
/// the `TAG` marker, a non-empty tag id, an integer counter, and a
/// timestamp that must be at least ten characters and contain the
/// fractional-seconds dot. The timestamp check is syntactic only; no
/// calendar validation is performed here.
pub fn parse_line(raw: &str) -> Result<TagEvent, ParseError> {
    let fields: Vec<&str> = raw.trim().split(',').collect();

    if fields.len() != FIELD_COUNT {
        return Err(ParseError::MalformedRecord(fields.len()));
    }

    if fields[0] != RECORD_MARKER {
        return Err(ParseError::UnknownRecordType(fields[0].to_string()));
    }

    let tag_id = fields[1];
    if tag_id.is_empty() {
        return Err(ParseError::EmptyIdentifier);
    }

    let cnt: i64 = fields[2]
        .parse()
        .map_err(|_| ParseError::InvalidCounter(fields[2].to_string()))?;

    let timestamp = fields[3];
    if timestamp.len() < MIN_TIMESTAMP_LEN || !timestamp.contains('.') {
        return Err(ParseError::InvalidTimestamp(timestamp.to_string()));
    }

    Ok(TagEvent {
        tag_id: tag_id.to_string(),
        cnt,
        timestamp: timestamp.to_string(),
    })
}
