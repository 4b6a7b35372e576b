//! The `TelemetryStore` trait and the values that cross it.
//!
//! The trait is implemented by storage backends (e.g. `moodcast-store-sqlite`).
//! The anomaly detector, the source arbiter and the intake gateway depend on
//! this abstraction, not on any concrete backend. The store exclusively owns
//! durable state; callers only ever hold values returned from it.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  alert::Alert, node::NodeRecord, quality::QualityMetric, reading::Reading,
  source::Source,
};

// ─── Values ──────────────────────────────────────────────────────────────────

/// Everything produced for one accepted reading. Written all-or-nothing.
#[derive(Debug, Clone)]
pub struct WriteBatch {
  pub reading: Reading,
  pub metric:  QualityMetric,
  pub alerts:  Vec<Alert>,
  pub node:    NodeRecord,
}

/// One applied migration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
  pub version:    u32,
  pub applied_at: DateTime<Utc>,
}

/// Rows removed by a retention prune.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
  pub readings: usize,
  pub metrics:  usize,
  pub alerts:   usize,
}

impl PruneReport {
  pub fn total(&self) -> usize { self.readings + self.metrics + self.alerts }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a MoodCast persistence backend.
///
/// Readings, quality metrics and alerts are append-only; node records are
/// upserted. All methods return `Send` futures so the trait can be used from
/// multi-threaded tokio workers.
pub trait TelemetryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Schema ────────────────────────────────────────────────────────────

  /// Apply every pending migration step in increasing version order and
  /// return the resulting schema version. A no-op once up to date.
  fn migrate(&self) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  /// Every recorded migration step, oldest first.
  fn schema_versions(
    &self,
  ) -> impl Future<Output = Result<Vec<SchemaVersion>, Self::Error>> + Send + '_;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a reading, its metric, its alerts and the node upsert as one
  /// atomic unit.
  fn write(
    &self,
    batch: WriteBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete readings, metrics and alerts strictly older than
  /// `now - retention_days`. Node records are never pruned.
  fn prune(
    &self,
    retention_days: u32,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<PruneReport, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The latest reading for `(city, source)` with a timestamp strictly
  /// earlier than `before`.
  fn previous_reading<'a>(
    &'a self,
    city: &'a str,
    source: Source,
    before: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Reading>, Self::Error>> + Send + 'a;

  /// Quality metrics for `city` with timestamps at or after `since`.
  fn quality_since<'a>(
    &'a self,
    city: &'a str,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<QualityMetric>, Self::Error>> + Send + 'a;

  /// All stored readings for `city`, oldest first.
  fn readings<'a>(
    &'a self,
    city: &'a str,
  ) -> impl Future<Output = Result<Vec<Reading>, Self::Error>> + Send + 'a;

  /// All stored alerts for `city`, oldest first.
  fn alerts<'a>(
    &'a self,
    city: &'a str,
  ) -> impl Future<Output = Result<Vec<Alert>, Self::Error>> + Send + 'a;

  /// The liveness record for `city`, if any reading was ever accepted.
  fn node<'a>(
    &'a self,
    city: &'a str,
  ) -> impl Future<Output = Result<Option<NodeRecord>, Self::Error>> + Send + 'a;
}
