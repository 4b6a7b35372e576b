//! Quality scoring: how complete and how fresh a reading is.
//!
//! [`score`] is pure. The caller supplies `now`, which keeps the scorer
//! deterministic under test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;

use crate::{
  reading::{Reading, WeatherField},
  source::Source,
};

/// Below this completeness (%) a metric carries an error.
pub const COMPLETENESS_FLOOR: f64 = 80.0;

/// Readings older than this many seconds are stale.
pub const STALE_AFTER_SECS: i64 = 300;

/// One quality record per accepted reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetric {
  pub city:           String,
  pub source:         Source,
  /// Timestamp of the reading this metric describes.
  pub timestamp:      DateTime<Utc>,
  /// Share of the six optional fields present, 0–100. Unrounded; consumers
  /// round for display.
  pub completeness:   f64,
  /// Age of the reading at scoring time, whole seconds, never negative.
  pub freshness:      i64,
  pub missing_fields: Vec<WeatherField>,
  pub error:          Option<String>,
}

/// Score `reading` as seen at `now`.
pub fn score(reading: &Reading, now: DateTime<Utc>) -> QualityMetric {
  let missing_fields: Vec<WeatherField> = WeatherField::iter()
    .filter(|f| reading.field(*f).is_none())
    .collect();

  let present = WeatherField::COUNT - missing_fields.len();
  let completeness = present as f64 / WeatherField::COUNT as f64 * 100.0;
  let freshness = (now - reading.timestamp).num_seconds().max(0);

  let mut problems = Vec::new();
  if completeness < COMPLETENESS_FLOOR {
    problems.push(format!("Low completeness: {completeness:.1}%"));
  }
  if freshness > STALE_AFTER_SECS {
    problems.push(format!("Stale data: {freshness}s"));
  }
  let error = (!problems.is_empty()).then(|| problems.join("; "));

  QualityMetric {
    city: reading.city.clone(),
    source: reading.source,
    timestamp: reading.timestamp,
    completeness,
    freshness,
    missing_fields,
    error,
  }
}
