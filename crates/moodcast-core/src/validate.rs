//! Validation: raw bus payload → [`Observation`].
//!
//! Producers publish two shapes. The IoT feeds send weather fields at the top
//! level; the forecast producers nest them under `"weather"`. Both are read
//! into [`RawReading`], with nested values taking precedence over flat ones.

use chrono::{DateTime, Datelike as _, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::{reading::Observation, source::Source};

/// Inclusive bounds on an acceptable temperature, °C.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f64> = -50.0..=50.0;

/// Years that encode as four-digit RFC 3339, the form the store orders by.
pub const TIMESTAMP_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

// ─── Raw payload ─────────────────────────────────────────────────────────────

/// Weather measurements as they appear on the wire. Every field is optional
/// here; the validator decides what is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWeather {
  #[serde(alias = "temperature")]
  pub temp:       Option<f64>,
  pub humidity:   Option<f64>,
  pub pressure:   Option<f64>,
  pub wind_speed: Option<f64>,
  pub clouds:     Option<f64>,
  #[serde(alias = "rain_1h")]
  pub rain:       Option<f64>,
  pub feels_like: Option<f64>,
}

/// A timestamp as sent: either Unix seconds or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
  Unix(i64),
  Text(String),
}

impl RawTimestamp {
  /// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) and Unix seconds, for
  /// instants within [`TIMESTAMP_YEARS`].
  pub fn parse(&self) -> Option<DateTime<Utc>> {
    let parsed = match self {
      Self::Unix(secs) => DateTime::from_timestamp(*secs, 0),
      Self::Text(text) => DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| naive_utc(text, "%Y-%m-%d %H:%M:%S"))
        .or_else(|| naive_utc(text, "%Y-%m-%dT%H:%M:%S%.f")),
    };
    parsed.filter(|dt| TIMESTAMP_YEARS.contains(&dt.year()))
  }
}

impl std::fmt::Display for RawTimestamp {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Unix(secs) => write!(f, "{secs}"),
      Self::Text(text) => f.write_str(text),
    }
  }
}

fn naive_utc(text: &str, format: &str) -> Option<DateTime<Utc>> {
  NaiveDateTime::parse_from_str(text, format)
    .ok()
    .map(|naive| naive.and_utc())
}

/// An inbound message body, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReading {
  pub city:      Option<String>,
  #[serde(alias = "latitude")]
  pub lat:       Option<f64>,
  #[serde(alias = "longitude")]
  pub lon:       Option<f64>,
  pub timestamp: Option<RawTimestamp>,
  pub source:    Option<String>,
  pub node_id:   Option<String>,
  pub sensor_id: Option<String>,
  /// Nested shape used by the forecast producers.
  pub weather:    Option<RawWeather>,
  // Flat shape used by the IoT feeds.
  #[serde(alias = "temperature")]
  pub temp:       Option<f64>,
  pub humidity:   Option<f64>,
  pub pressure:   Option<f64>,
  pub wind_speed: Option<f64>,
  pub clouds:     Option<f64>,
  #[serde(alias = "rain_1h")]
  pub rain:       Option<f64>,
  pub feels_like: Option<f64>,
}

impl RawReading {
  pub fn from_json(payload: &[u8]) -> serde_json::Result<Self> {
    serde_json::from_slice(payload)
  }

  /// `city|source|timestamp` exactly as received, or `None` if any part is
  /// missing (such a message is rejected by validation anyway).
  pub fn dedup_key(&self) -> Option<String> {
    let city = self.city.as_deref()?;
    let source = self.source.as_deref()?;
    let timestamp = self.timestamp.as_ref()?;
    Some(format!("{city}|{source}|{timestamp}"))
  }

  /// Nested value if present, otherwise the flat one.
  fn weather_field(
    &self,
    nested: fn(&RawWeather) -> Option<f64>,
    flat:   Option<f64>,
  ) -> Option<f64> {
    self.weather.as_ref().and_then(nested).or(flat)
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Why a payload was refused before persistence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectionReason {
  #[error("missing required field `{0}`")]
  MissingField(&'static str),

  #[error("temperature {0}°C is outside [-50, 50]")]
  OutOfRange(f64),

  #[error("unknown source {0:?}")]
  UnknownSource(String),

  #[error("unparsable timestamp {0:?}")]
  InvalidTimestamp(String),

  #[error("live source {0} published on a forecast topic")]
  SourceTopicMismatch(Source),
}

/// Check required fields and ranges, normalising into an [`Observation`].
pub fn validate(raw: &RawReading) -> Result<Observation, RejectionReason> {
  use RejectionReason::*;

  let city = raw.city.clone().ok_or(MissingField("city"))?;
  let lat = raw.lat.ok_or(MissingField("lat"))?;
  let lon = raw.lon.ok_or(MissingField("lon"))?;
  let temperature = raw
    .weather_field(|w| w.temp, raw.temp)
    .ok_or(MissingField("temp"))?;
  let raw_timestamp = raw.timestamp.as_ref().ok_or(MissingField("timestamp"))?;
  let source_tag = raw.source.as_deref().ok_or(MissingField("source"))?;

  if !TEMPERATURE_RANGE.contains(&temperature) {
    return Err(OutOfRange(temperature));
  }

  let timestamp = raw_timestamp
    .parse()
    .ok_or_else(|| InvalidTimestamp(raw_timestamp.to_string()))?;
  let source =
    Source::parse(source_tag).map_err(|_| UnknownSource(source_tag.to_owned()))?;

  Ok(Observation {
    city,
    lat,
    lon,
    temperature,
    humidity: raw.weather_field(|w| w.humidity, raw.humidity),
    pressure: raw.weather_field(|w| w.pressure, raw.pressure),
    wind_speed: raw.weather_field(|w| w.wind_speed, raw.wind_speed),
    clouds: raw.weather_field(|w| w.clouds, raw.clouds),
    rain: raw.weather_field(|w| w.rain, raw.rain),
    feels_like: raw.weather_field(|w| w.feels_like, raw.feels_like),
    timestamp,
    source,
  })
}
