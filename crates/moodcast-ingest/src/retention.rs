//! Background retention: prune old telemetry on a fixed interval.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use moodcast_core::store::{PruneReport, TelemetryStore};

use crate::{Error, Result};

/// Prune once as of now and log what was removed.
pub async fn prune_once<S: TelemetryStore>(
  store:          &S,
  retention_days: u32,
) -> Result<PruneReport> {
  let report = store
    .prune(retention_days, Utc::now())
    .await
    .map_err(Error::store)?;
  tracing::info!(
    readings = report.readings,
    metrics = report.metrics,
    alerts = report.alerts,
    retention_days,
    "pruned telemetry"
  );
  Ok(report)
}

/// Run [`prune_once`] every `interval`, starting immediately. Failures are
/// logged and the next tick tries again.
pub async fn prune_periodically<S: TelemetryStore>(
  store:          Arc<S>,
  retention_days: u32,
  interval:       Duration,
) {
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  loop {
    ticker.tick().await;
    if let Err(e) = prune_once(store.as_ref(), retention_days).await {
      tracing::error!(error = %e, "prune failed");
    }
  }
}
