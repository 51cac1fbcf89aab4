// ABOUTME: Ingestion pipeline for tagwatch: durable feed tailing with incremental state reconciliation.
// ABOUTME: Owns the cursor, the tail reader, the snapshot publisher, and the loop that drives them.

pub mod cursor;
pub mod publish;
pub mod reconcile;
pub mod tail;

pub use cursor::{CursorError, CursorFile};
pub use publish::{JsonSnapshotFile, PublishError, SnapshotSink, read_snapshot};
pub use reconcile::{IngestError, Reconciler};
pub use tail::{TailError, TailReader};
