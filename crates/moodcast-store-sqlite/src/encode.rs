//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical order in SQL matches chronological order. Enums
//! are stored by their wire tag. Missing-field lists are comma-separated.

use chrono::{DateTime, SecondsFormat, Utc};
use moodcast_core::{
  alert::{Alert, AlertKind, Severity},
  node::NodeRecord,
  quality::QualityMetric,
  reading::{Reading, WeatherField},
  source::Source,
  store::SchemaVersion,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Missing fields ──────────────────────────────────────────────────────────

pub fn encode_missing_fields(fields: &[WeatherField]) -> String {
  fields
    .iter()
    .map(AsRef::<str>::as_ref)
    .collect::<Vec<_>>()
    .join(",")
}

pub fn decode_missing_fields(s: &str) -> Result<Vec<WeatherField>> {
  s.split(',')
    .filter(|part| !part.is_empty())
    .map(|part| WeatherField::parse(part).map_err(Error::from))
    .collect()
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `reading` row as read from SQLite, before decoding.
pub struct RawReading {
  pub city:        String,
  pub lat:         f64,
  pub lon:         f64,
  pub temp:        f64,
  pub humidity:    Option<f64>,
  pub pressure:    Option<f64>,
  pub wind_speed:  Option<f64>,
  pub clouds:      Option<f64>,
  pub rain:        Option<f64>,
  pub feels_like:  Option<f64>,
  pub timestamp:   String,
  pub source:      String,
  pub mood_score:  f64,
}

pub const READING_COLUMNS: &str = "city, lat, lon, temp, humidity, pressure, \
  wind_speed, clouds, rain, feels_like, timestamp, source, mood_score";

impl RawReading {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      city:       row.get(0)?,
      lat:        row.get(1)?,
      lon:        row.get(2)?,
      temp:       row.get(3)?,
      humidity:   row.get(4)?,
      pressure:   row.get(5)?,
      wind_speed: row.get(6)?,
      clouds:     row.get(7)?,
      rain:       row.get(8)?,
      feels_like: row.get(9)?,
      timestamp:  row.get(10)?,
      source:     row.get(11)?,
      mood_score: row.get(12)?,
    })
  }

  pub fn into_reading(self) -> Result<Reading> {
    Ok(Reading {
      city:        self.city,
      lat:         self.lat,
      lon:         self.lon,
      temperature: self.temp,
      humidity:    self.humidity,
      pressure:    self.pressure,
      wind_speed:  self.wind_speed,
      clouds:      self.clouds,
      rain:        self.rain,
      feels_like:  self.feels_like,
      timestamp:   decode_dt(&self.timestamp)?,
      source:      Source::parse(&self.source)?,
      mood_score:  self.mood_score,
    })
  }
}

/// A `quality_metric` row.
pub struct RawMetric {
  pub city:           String,
  pub timestamp:      String,
  pub completeness:   f64,
  pub freshness:      i64,
  pub missing_fields: String,
  pub error:          Option<String>,
  pub source:         String,
}

pub const METRIC_COLUMNS: &str =
  "city, timestamp, completeness, freshness, missing_fields, error, source";

impl RawMetric {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      city:           row.get(0)?,
      timestamp:      row.get(1)?,
      completeness:   row.get(2)?,
      freshness:      row.get(3)?,
      missing_fields: row.get(4)?,
      error:          row.get(5)?,
      source:         row.get(6)?,
    })
  }

  pub fn into_metric(self) -> Result<QualityMetric> {
    Ok(QualityMetric {
      city:           self.city,
      source:         Source::parse(&self.source)?,
      timestamp:      decode_dt(&self.timestamp)?,
      completeness:   self.completeness,
      freshness:      self.freshness,
      missing_fields: decode_missing_fields(&self.missing_fields)?,
      error:          self.error,
    })
  }
}

/// An `alert` row.
pub struct RawAlert {
  pub city:      String,
  pub kind:      String,
  pub message:   String,
  pub timestamp: String,
  pub severity:  String,
}

impl RawAlert {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      city:      row.get(0)?,
      kind:      row.get(1)?,
      message:   row.get(2)?,
      timestamp: row.get(3)?,
      severity:  row.get(4)?,
    })
  }

  pub fn into_alert(self) -> Result<Alert> {
    Ok(Alert {
      city:      self.city,
      kind:      AlertKind::parse(&self.kind)?,
      message:   self.message,
      severity:  Severity::parse(&self.severity)?,
      timestamp: decode_dt(&self.timestamp)?,
    })
  }
}

/// A `node_record` row.
pub struct RawNode {
  pub city:      String,
  pub node_id:   String,
  pub sensor_id: String,
  pub last_seen: String,
  pub lat:       f64,
  pub lon:       f64,
}

impl RawNode {
  pub fn into_node(self) -> Result<NodeRecord> {
    Ok(NodeRecord {
      city:      self.city,
      node_id:   self.node_id,
      sensor_id: self.sensor_id,
      last_seen: decode_dt(&self.last_seen)?,
      lat:       self.lat,
      lon:       self.lon,
    })
  }
}

/// A `schema_version` row.
pub struct RawSchemaVersion {
  pub version:    u32,
  pub applied_at: String,
}

impl RawSchemaVersion {
  pub fn into_version(self) -> Result<SchemaVersion> {
    Ok(SchemaVersion {
      version:    self.version,
      applied_at: decode_dt(&self.applied_at)?,
    })
  }
}
