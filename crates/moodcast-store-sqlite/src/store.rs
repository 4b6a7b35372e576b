//! [`SqliteStore`]: the SQLite implementation of [`TelemetryStore`].

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::OptionalExtension as _;

use moodcast_core::{
  alert::Alert,
  node::NodeRecord,
  quality::QualityMetric,
  reading::Reading,
  source::Source,
  store::{PruneReport, SchemaVersion, TelemetryStore, WriteBatch},
};

use crate::{
  Error, Result,
  encode::{
    METRIC_COLUMNS, READING_COLUMNS, RawAlert, RawMetric, RawNode, RawReading,
    RawSchemaVersion, encode_dt, encode_missing_fields,
  },
  schema::{BOOTSTRAP, MIGRATIONS, Migration, latest_version},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A MoodCast telemetry store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every call
/// is serialised onto the connection's thread, so each transaction below runs
/// without interleaving.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// What one `migrate` pass did inside the connection thread.
struct MigrationPass {
  start:   u32,
  applied: Vec<&'static Migration>,
  failure: Option<(u32, rusqlite::Error)>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring the schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.migrate().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.migrate().await?;
    Ok(store)
  }

  /// Open without migrating. Only the tests need a store in this state.
  #[cfg(test)]
  pub(crate) async fn open_unmigrated() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Ok(Self { conn })
  }

  /// Run one SQL batch directly. Test-only escape hatch for ageing rows.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn apply_step(
  conn: &mut rusqlite::Connection,
  step: &Migration,
  applied_at: &str,
) -> rusqlite::Result<()> {
  let tx = conn.transaction()?;
  tx.execute_batch(step.sql)?;
  tx.execute(
    "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
    rusqlite::params![step.version, applied_at],
  )?;
  tx.commit()
}

// ─── TelemetryStore impl ─────────────────────────────────────────────────────

impl TelemetryStore for SqliteStore {
  type Error = Error;

  // ── Schema ────────────────────────────────────────────────────────────────

  async fn migrate(&self) -> Result<u32> {
    let applied_at = encode_dt(Utc::now());

    // Read-then-apply happens in one closure so two callers can never both
    // decide the same step is pending.
    let pass = self
      .conn
      .call(move |conn| {
        conn.execute_batch(BOOTSTRAP)?;
        let start: u32 = conn.query_row(
          "SELECT COALESCE(MAX(version), 0) FROM schema_version",
          [],
          |r| r.get(0),
        )?;

        let mut applied = Vec::new();
        for step in MIGRATIONS.iter().filter(|m| m.version > start) {
          if let Err(e) = apply_step(conn, step, &applied_at) {
            return Ok(MigrationPass { start, applied, failure: Some((step.version, e)) });
          }
          applied.push(step);
        }
        Ok(MigrationPass { start, applied, failure: None })
      })
      .await?;

    for step in &pass.applied {
      tracing::info!(
        version = step.version,
        description = step.description,
        "applied schema migration"
      );
    }
    if let Some((version, source)) = pass.failure {
      return Err(Error::Migration { version, source });
    }

    let version = pass.applied.last().map_or(pass.start, |m| m.version);
    if version > latest_version() {
      tracing::warn!(
        version,
        known = latest_version(),
        "database schema is newer than this build"
      );
    }
    Ok(version)
  }

  async fn schema_versions(&self) -> Result<Vec<SchemaVersion>> {
    let raws: Vec<RawSchemaVersion> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT version, applied_at FROM schema_version ORDER BY version",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSchemaVersion {
              version:    row.get(0)?,
              applied_at: row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSchemaVersion::into_version).collect()
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn write(&self, batch: WriteBatch) -> Result<()> {
    let WriteBatch { reading, metric, alerts, node } = batch;

    let reading_ts    = encode_dt(reading.timestamp);
    let metric_ts     = encode_dt(metric.timestamp);
    let missing       = encode_missing_fields(&metric.missing_fields);
    let last_seen     = encode_dt(node.last_seen);
    let alert_rows: Vec<(String, String, String, String, String)> = alerts
      .iter()
      .map(|a| {
        (
          a.city.clone(),
          a.kind.as_ref().to_owned(),
          a.message.clone(),
          encode_dt(a.timestamp),
          a.severity.as_ref().to_owned(),
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          &format!(
            "INSERT INTO reading ({READING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
          ),
          rusqlite::params![
            reading.city,
            reading.lat,
            reading.lon,
            reading.temperature,
            reading.humidity,
            reading.pressure,
            reading.wind_speed,
            reading.clouds,
            reading.rain,
            reading.feels_like,
            reading_ts,
            reading.source.as_ref(),
            reading.mood_score,
          ],
        )?;

        tx.execute(
          &format!(
            "INSERT INTO quality_metric ({METRIC_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
          ),
          rusqlite::params![
            metric.city,
            metric_ts,
            metric.completeness,
            metric.freshness,
            missing,
            metric.error,
            metric.source.as_ref(),
          ],
        )?;

        for (city, kind, message, at, severity) in &alert_rows {
          tx.execute(
            "INSERT INTO alert (city, type, message, timestamp, severity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![city, kind, message, at, severity],
          )?;
        }

        tx.execute(
          "INSERT INTO node_record (city, node_id, sensor_id, last_seen, lat, lon)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(city) DO UPDATE SET
             node_id   = excluded.node_id,
             sensor_id = excluded.sensor_id,
             last_seen = excluded.last_seen,
             lat       = excluded.lat,
             lon       = excluded.lon",
          rusqlite::params![node.city, node.node_id, node.sensor_id, last_seen, node.lat, node.lon],
        )?;

        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn prune(&self, retention_days: u32, now: DateTime<Utc>) -> Result<PruneReport> {
    // A window reaching past the earliest representable instant covers
    // everything ever stored, so there is nothing to remove.
    let Some(cutoff) = TimeDelta::try_days(i64::from(retention_days))
      .and_then(|window| now.checked_sub_signed(window))
    else {
      tracing::debug!(retention_days, "retention window exceeds calendar range");
      return Ok(PruneReport::default());
    };
    let cutoff = encode_dt(cutoff);

    let report = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let readings =
          tx.execute("DELETE FROM reading WHERE timestamp < ?1", [&cutoff])?;
        let metrics =
          tx.execute("DELETE FROM quality_metric WHERE timestamp < ?1", [&cutoff])?;
        let alerts =
          tx.execute("DELETE FROM alert WHERE timestamp < ?1", [&cutoff])?;
        tx.commit()?;
        Ok(PruneReport { readings, metrics, alerts })
      })
      .await?;

    tracing::info!(
      retention_days,
      readings = report.readings,
      metrics = report.metrics,
      alerts = report.alerts,
      "pruned expired telemetry"
    );
    Ok(report)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn previous_reading(
    &self,
    city:   &str,
    source: Source,
    before: DateTime<Utc>,
  ) -> Result<Option<Reading>> {
    let city       = city.to_owned();
    let source_str = source.as_ref().to_owned();
    let before_str = encode_dt(before);

    let raw: Option<RawReading> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {READING_COLUMNS} FROM reading
                 WHERE city = ?1 AND source = ?2 AND timestamp < ?3
                 ORDER BY timestamp DESC
                 LIMIT 1"
              ),
              rusqlite::params![city, source_str, before_str],
              RawReading::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReading::into_reading).transpose()
  }

  async fn quality_since(
    &self,
    city:  &str,
    since: DateTime<Utc>,
  ) -> Result<Vec<QualityMetric>> {
    let city      = city.to_owned();
    let since_str = encode_dt(since);

    let raws: Vec<RawMetric> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {METRIC_COLUMNS} FROM quality_metric
           WHERE city = ?1 AND timestamp >= ?2
           ORDER BY timestamp"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![city, since_str], RawMetric::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMetric::into_metric).collect()
  }

  async fn readings(&self, city: &str) -> Result<Vec<Reading>> {
    let city = city.to_owned();

    let raws: Vec<RawReading> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {READING_COLUMNS} FROM reading WHERE city = ?1 ORDER BY timestamp"
        ))?;
        let rows = stmt
          .query_map([city], RawReading::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReading::into_reading).collect()
  }

  async fn alerts(&self, city: &str) -> Result<Vec<Alert>> {
    let city = city.to_owned();

    let raws: Vec<RawAlert> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT city, type, message, timestamp, severity FROM alert
           WHERE city = ?1 ORDER BY timestamp, rowid",
        )?;
        let rows = stmt
          .query_map([city], RawAlert::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAlert::into_alert).collect()
  }

  async fn node(&self, city: &str) -> Result<Option<NodeRecord>> {
    let city = city.to_owned();

    let raw: Option<RawNode> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT city, node_id, sensor_id, last_seen, lat, lon
               FROM node_record WHERE city = ?1",
              [city],
              |row| {
                Ok(RawNode {
                  city:      row.get(0)?,
                  node_id:   row.get(1)?,
                  sensor_id: row.get(2)?,
                  last_seen: row.get(3)?,
                  lat:       row.get(4)?,
                  lon:       row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawNode::into_node).transpose()
  }
}
