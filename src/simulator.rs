// ABOUTME: Synthetic feed generator standing in for the RTLS hardware during development.
// ABOUTME: Appends TAG,<id>,<cnt>,<timestamp> lines to the source file at a fixed interval.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;

/// Tag ids emitted when none are given on the command line.
const DEFAULT_TAG_IDS: [&str; 3] = ["fa451f0755d8", "ab123c4567d8", "de678f1234e9"];

/// Append one feed line per interval until cancelled, picking a random
/// tag each time and incrementing its counter. Lines are flushed
/// immediately so the tail reader sees them without delay.
pub async fn run(
    source: PathBuf,
    interval: Duration,
    tag_ids: Vec<String>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let tag_ids = if tag_ids.is_empty() {
        DEFAULT_TAG_IDS.iter().map(|s| s.to_string()).collect()
    } else {
        tag_ids
    };

    if let Some(parent) = source.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(&source)?;

    tracing::info!(
        source = %source.display(),
        tags = tag_ids.len(),
        interval_ms = interval.as_millis() as u64,
        "simulator started"
    );

    let mut counters: HashMap<String, i64> = HashMap::new();
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => break,
        }

        let idx = rand::thread_rng().gen_range(0..tag_ids.len());
        let tag_id = &tag_ids[idx];
        let cnt = counters.entry(tag_id.clone()).or_insert(0);
        *cnt += 1;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S%.3f");
        let line = format!("TAG,{},{},{}", tag_id, cnt, timestamp);
        writeln!(file, "{}", line)?;
        file.flush()?;
        tracing::debug!(%line, "emitted feed line");
    }

    tracing::info!("simulator stopped");
    Ok(())
}
