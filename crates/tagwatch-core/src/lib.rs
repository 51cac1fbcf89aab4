// ABOUTME: Core library for tagwatch, containing the feed record parser and the per-tag state store.
// ABOUTME: This crate defines the shared data model used by the ingestion pipeline and the query API.

pub mod parser;
pub mod state;

pub use parser::{ParseError, TagEvent, parse_line};
pub use state::{StateStore, TagSnapshot, TagStatus, UpdateOutcome};
