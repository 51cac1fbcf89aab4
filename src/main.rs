// ABOUTME: Entry point for the tagwatch binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and wires the ingestion loop, query API, and simulator.

mod config;
mod simulator;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tagwatch_ingest::{JsonSnapshotFile, Reconciler, TailReader};
use tagwatch_server::{AppState, Registry, create_router};
use tokio::sync::watch;

use crate::config::TagwatchConfig;

#[derive(Parser)]
#[command(name = "tagwatch", version, about = "RTLS tag-sighting ingestion pipeline and query API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion pipeline and the query API in one process.
    Run,
    /// Run only the ingestion pipeline.
    Ingest,
    /// Run only the query API server.
    Serve,
    /// Append synthetic feed lines to the source file (stands in for the hardware feed).
    Simulate {
        /// Milliseconds between generated sightings.
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
        /// Tag id to simulate; repeat for several tags. Defaults to three built-in ids.
        #[arg(long = "tag", value_name = "ID")]
        tags: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagwatch=debug,tower_http=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = TagwatchConfig::from_env()?;
    let shutdown = shutdown_on_ctrl_c();

    match cli.command {
        Command::Run => {
            let ingest_config = config.clone();
            let ingest_shutdown = shutdown.clone();
            let ingest =
                tokio::spawn(async move { run_ingest(&ingest_config, ingest_shutdown).await });

            run_server(&config, shutdown).await?;
            ingest.await??;
        }
        Command::Ingest => run_ingest(&config, shutdown).await?,
        Command::Serve => run_server(&config, shutdown).await?,
        Command::Simulate { interval_ms, tags } => {
            simulator::run(
                config.source.clone(),
                Duration::from_millis(interval_ms),
                tags,
                shutdown,
            )
            .await?;
        }
    }

    Ok(())
}

/// Flip a watch channel when Ctrl-C arrives. Every loop suspends on its
/// receiver, so cancellation lands only at suspension points.
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn run_ingest(
    config: &TagwatchConfig,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let reader = TailReader::open(&config.source, config.cursor_path(), config.poll)?;
    let sink = JsonSnapshotFile::new(config.snapshot_path());
    Reconciler::new(reader, sink, shutdown).run().await?;
    Ok(())
}

async fn run_server(
    config: &TagwatchConfig,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let registry = Registry::open(&config.registry_path())?;
    let state = Arc::new(AppState::new(registry, config.snapshot_path()));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(bind = %config.bind, "query API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}
