//! moodcast-ingest binary.
//!
//! Reads `moodcast.toml` (or the path given with `--config`), opens the SQLite
//! store, applies pending migrations and consumes telemetry from the broker
//! until interrupted.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use moodcast_core::store::TelemetryStore as _;
use moodcast_ingest::{
  Gateway, IngestConfig,
  bus::{self, MqttPublisher},
  retention,
};
use moodcast_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "MoodCast telemetry ingestion worker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "moodcast.toml")]
  config: PathBuf,

  /// Apply pending schema migrations and exit.
  #[arg(long)]
  migrate_only: bool,

  /// Prune data older than the retention window and exit.
  #[arg(long)]
  prune_now: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = IngestConfig::load(&cli.config).context("failed to read configuration")?;

  // Opening the store applies any pending migrations.
  let store_path = cfg.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if cli.migrate_only {
    let versions = store.schema_versions().await.context("failed to read schema versions")?;
    for v in &versions {
      tracing::info!(version = v.version, applied_at = %v.applied_at, "schema step");
    }
    return Ok(());
  }

  if cli.prune_now {
    retention::prune_once(&store, cfg.retention_days)
      .await
      .context("prune failed")?;
    return Ok(());
  }

  let store = Arc::new(store);
  let (client, eventloop) = bus::connect(&cfg);
  let gateway = Arc::new(Gateway::new(
    store.clone(),
    MqttPublisher::new(client.clone()),
    cfg.topic_prefix.clone(),
    cfg.dedup_capacity,
  ));

  tracing::info!(
    broker = %format!("{}:{}", cfg.mqtt_host, cfg.mqtt_port),
    prefix = %cfg.topic_prefix,
    "starting ingestion"
  );

  tokio::select! {
    () = bus::run(client.clone(), eventloop, gateway, cfg.queue_capacity) => {}
    () = retention::prune_periodically(store, cfg.retention_days, cfg.prune_interval()) => {}
    signal = tokio::signal::ctrl_c() => {
      signal.context("failed to listen for shutdown signal")?;
      tracing::info!("shutting down");
    }
  }

  if let Err(e) = client.disconnect().await {
    tracing::debug!(error = %e, "disconnect failed");
  }
  Ok(())
}
