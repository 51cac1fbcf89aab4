// ABOUTME: The reconciliation loop driving the pipeline: tail, parse, upsert, publish, commit.
// ABOUTME: A single-owner state machine (Starting -> Watching -> Stopping | Faulted) with cooperative shutdown.

use tagwatch_core::{StateStore, UpdateOutcome, parse_line};
use thiserror::Error;
use tokio::sync::watch;

use crate::publish::SnapshotSink;
use crate::tail::{TailError, TailReader};

/// Fatal ingestion failures. Parse and publish failures never appear
/// here; they are contained inside the loop and only logged.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("tail error: {0}")]
    Tail(#[from] TailError),
}

/// Lifecycle states of the loop, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Starting,
    Watching,
    Stopping,
    Faulted,
}

impl LoopState {
    fn as_str(self) -> &'static str {
        match self {
            LoopState::Starting => "starting",
            LoopState::Watching => "watching",
            LoopState::Stopping => "stopping",
            LoopState::Faulted => "faulted",
        }
    }
}

/// Owns the tail reader, the state store, and the snapshot sink, and is
/// the only component with a scheduling loop. One instance per feed:
/// concurrent instances would race on cursor advancement.
pub struct Reconciler<S: SnapshotSink> {
    reader: TailReader,
    store: StateStore,
    sink: S,
    shutdown: watch::Receiver<bool>,
}

impl<S: SnapshotSink> Reconciler<S> {
    /// Assemble the loop in its `Starting` state. The reader has already
    /// ensured the feed exists and resumed the cursor in `TailReader::open`.
    pub fn new(reader: TailReader, sink: S, shutdown: watch::Receiver<bool>) -> Self {
        tracing::info!(
            state = LoopState::Starting.as_str(),
            source = %reader.source().display(),
            "reconciliation loop assembled"
        );
        Self {
            reader,
            store: StateStore::new(),
            sink,
            shutdown,
        }
    }

    /// Run until cancelled or faulted.
    ///
    /// Each delivered line is parsed and upserted; `Created` and `Changed`
    /// outcomes publish the snapshot synchronously before the cursor is
    /// committed, so the external view is never more than one event behind
    /// and a crash after publish re-delivers an event the store absorbs as
    /// `Touched`. Cancellation lands only at the suspension point, never
    /// mid-upsert; the final forced publish therefore reflects a fully
    /// applied state, including trailing `Touched`-only updates.
    pub async fn run(mut self) -> Result<(), IngestError> {
        tracing::info!(state = LoopState::Watching.as_str(), "watching feed");

        loop {
            tokio::select! {
                line = self.reader.next_line() => {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::error!(
                                state = LoopState::Faulted.as_str(),
                                error = %e,
                                "feed source lost, ingestion cannot continue"
                            );
                            return Err(e.into());
                        }
                    };
                    self.handle_line(&line);
                    if let Err(e) = self.reader.commit() {
                        tracing::error!(
                            state = LoopState::Faulted.as_str(),
                            error = %e,
                            "cursor persistence failed, ingestion cannot continue"
                        );
                        return Err(e.into());
                    }
                }
                _ = self.shutdown.changed() => {
                    break;
                }
            }
        }

        tracing::info!(
            state = LoopState::Stopping.as_str(),
            tags = self.store.len(),
            "shutdown requested, publishing final snapshot"
        );
        if let Err(e) = self.sink.publish(&self.store.snapshot()) {
            // Never fatal: the operator still has the feed and cursor.
            tracing::error!(error = %e, "final snapshot publish failed");
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        let event = match parse_line(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(line, error = %e, "skipping unparseable feed line");
                return;
            }
        };

        match self.store.upsert(&event) {
            UpdateOutcome::Created => {
                tracing::info!(
                    tag_id = %event.tag_id,
                    cnt = event.cnt,
                    timestamp = %event.timestamp,
                    "new tag discovered"
                );
                self.publish_snapshot();
            }
            UpdateOutcome::Changed { previous_cnt } => {
                tracing::info!(
                    tag_id = %event.tag_id,
                    previous_cnt,
                    cnt = event.cnt,
                    timestamp = %event.timestamp,
                    "tag counter changed"
                );
                self.publish_snapshot();
            }
            UpdateOutcome::Touched => {
                tracing::debug!(tag_id = %event.tag_id, cnt = event.cnt, "tag re-sighted");
            }
        }
    }

    fn publish_snapshot(&mut self) {
        if let Err(e) = self.sink.publish(&self.store.snapshot()) {
            tracing::warn!(error = %e, "snapshot publish failed, will retry on next change");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::PublishError;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tagwatch_core::TagSnapshot;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const POLL: Duration = Duration::from_millis(5);
    const WAIT: Duration = Duration::from_secs(2);

    /// Captures every published snapshot in memory.
    #[derive(Clone, Default)]
    struct CollectSink {
        published: Arc<Mutex<Vec<TagSnapshot>>>,
    }

    impl SnapshotSink for CollectSink {
        fn publish(&mut self, snapshot: &TagSnapshot) -> Result<(), PublishError> {
            self.published.lock().unwrap().push(snapshot.clone());
            Ok(())
        }
    }

    impl CollectSink {
        fn count(&self) -> usize {
            self.published.lock().unwrap().len()
        }

        fn last(&self) -> TagSnapshot {
            self.published.lock().unwrap().last().cloned().unwrap()
        }
    }

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        write!(file, "{}", text).unwrap();
        file.flush().unwrap();
    }

    async fn wait_for_publishes(sink: &CollectSink, n: usize) {
        timeout(WAIT, async {
            while sink.count() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected publish count was not reached");
    }

    fn start_loop(
        dir: &TempDir,
        sink: CollectSink,
    ) -> (
        std::path::PathBuf,
        watch::Sender<bool>,
        tokio::task::JoinHandle<Result<(), IngestError>>,
    ) {
        let source = dir.path().join("feed.log");
        let cursor = dir.path().join("feed.log.cursor");
        let reader = TailReader::open(&source, &cursor, POLL).unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(Reconciler::new(reader, sink, rx).run());
        (source, tx, task)
    }

    #[tokio::test]
    async fn end_to_end_reconciliation() {
        let dir = TempDir::new().unwrap();
        let sink = CollectSink::default();
        let (source, tx, task) = start_loop(&dir, sink.clone());

        append(&source, "TAG,abc,1,20240101000000.000\n");
        append(&source, "TAG,abc,1,20240101000001.000\n");
        append(&source, "TAG,abc,2,20240101000002.000\n");
        append(&source, "TAG,xyz,5,20240101000003.000\n");

        // Created-abc, Changed-abc, Created-xyz. The repeat of counter 1
        // is Touched and publishes nothing.
        wait_for_publishes(&sink, 3).await;

        tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        // Plus the final forced publish on shutdown.
        assert_eq!(sink.count(), 4);

        let snap = sink.last();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["abc"].last_cnt, 2);
        assert_eq!(snap["abc"].last_seen, "20240101000002.000");
        assert_eq!(snap["xyz"].last_cnt, 5);
        assert_eq!(snap["xyz"].last_seen, "20240101000003.000");
    }

    #[tokio::test]
    async fn touched_update_is_visible_in_final_snapshot() {
        let dir = TempDir::new().unwrap();
        let sink = CollectSink::default();
        let (source, tx, task) = start_loop(&dir, sink.clone());

        append(&source, "TAG,abc,1,20240101000000.000\n");
        wait_for_publishes(&sink, 1).await;
        // Same counter, newer sighting: no publish, but last_seen moves.
        append(&source, "TAG,abc,1,20240101000009.000\n");

        // Give the loop a moment to absorb the touch before stopping.
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        let snap = sink.last();
        assert_eq!(snap["abc"].last_cnt, 1);
        assert_eq!(snap["abc"].last_seen, "20240101000009.000");
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped_without_stopping() {
        let dir = TempDir::new().unwrap();
        let sink = CollectSink::default();
        let (source, tx, task) = start_loop(&dir, sink.clone());

        append(&source, "garbage\n");
        append(&source, "TAG,,9,20240101000000.000\n");
        append(&source, "\n");
        append(&source, "TAG,abc,1,20240101000000.000\n");

        wait_for_publishes(&sink, 1).await;
        tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        let snap = sink.last();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["abc"].last_cnt, 1);
    }

    #[tokio::test]
    async fn deleted_source_faults_the_loop() {
        let dir = TempDir::new().unwrap();
        let sink = CollectSink::default();
        let (source, _tx, task) = start_loop(&dir, sink.clone());

        append(&source, "TAG,abc,1,20240101000000.000\n");
        wait_for_publishes(&sink, 1).await;
        std::fs::remove_file(&source).unwrap();

        let result = timeout(WAIT, task).await.unwrap().unwrap();
        assert!(matches!(result, Err(IngestError::Tail(_))));
    }

    #[tokio::test]
    async fn shutdown_with_no_traffic_still_publishes_final_snapshot() {
        let dir = TempDir::new().unwrap();
        let sink = CollectSink::default();
        let (_source, tx, task) = start_loop(&dir, sink.clone());

        tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(sink.count(), 1);
        assert!(sink.last().is_empty());
    }
}
