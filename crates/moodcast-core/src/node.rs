//! NodeRecord: per-city liveness state.
//!
//! One row per city, overwritten on every accepted reading. This is not
//! history: retention pruning never touches it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reading::Reading;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
  pub city:      String,
  pub node_id:   String,
  pub sensor_id: String,
  /// When the pipeline last accepted a reading for this city.
  pub last_seen: DateTime<Utc>,
  pub lat:       f64,
  pub lon:       f64,
}

impl NodeRecord {
  /// Build the liveness record for an accepted reading.
  ///
  /// Producers may name their node and sensor; otherwise identifiers are
  /// derived from the city, matching the client ids the IoT feeds use.
  pub fn for_reading(
    reading:   &Reading,
    node_id:   Option<String>,
    sensor_id: Option<String>,
    seen_at:   DateTime<Utc>,
  ) -> Self {
    let slug = city_slug(&reading.city);
    Self {
      city:      reading.city.clone(),
      node_id:   node_id.unwrap_or_else(|| format!("moodcast_node_{slug}")),
      sensor_id: sensor_id.unwrap_or_else(|| format!("moodcast_sensor_{slug}")),
      last_seen: seen_at,
      lat:       reading.lat,
      lon:       reading.lon,
    }
  }
}

/// Lowercase, whitespace collapsed to underscores: "New York" → "new_york".
pub fn city_slug(city: &str) -> String {
  city
    .split_whitespace()
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join("_")
}
