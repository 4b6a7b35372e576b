//! Reading: one timestamped weather observation from one source.
//!
//! An [`Observation`] is what the validator accepts; a [`Reading`] is an
//! observation with its mood score attached and is what gets persisted.
//! Neither is ever updated after it has been written.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result, source::Source};

// ─── Optional weather fields ─────────────────────────────────────────────────

/// The six weather measurements a reading may lack.
///
/// Declaration order is the order used in missing-field lists.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WeatherField {
  Humidity,
  Pressure,
  WindSpeed,
  Clouds,
  Rain,
  FeelsLike,
}

impl WeatherField {
  pub const COUNT: usize = 6;

  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name).map_err(|_| Error::UnknownField(name.to_owned()))
  }
}

// ─── Observation ─────────────────────────────────────────────────────────────

/// A validated observation, not yet scored.
///
/// Optional measurements are `None` when the producer did not report them.
/// `Some(0.0)` is a real measurement and is never used as a stand-in for
/// "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
  pub city:        String,
  pub lat:         f64,
  pub lon:         f64,
  /// Degrees Celsius, within [-50, 50].
  pub temperature: f64,
  /// Relative humidity, %.
  pub humidity:    Option<f64>,
  /// Sea-level pressure, hPa.
  pub pressure:    Option<f64>,
  /// m/s.
  pub wind_speed:  Option<f64>,
  /// Cloud cover, %.
  pub clouds:      Option<f64>,
  /// Precipitation rate, mm/h.
  pub rain:        Option<f64>,
  /// Apparent temperature, °C.
  pub feels_like:  Option<f64>,
  pub timestamp:   DateTime<Utc>,
  pub source:      Source,
}

impl Observation {
  /// Attach a mood score, producing the persistable [`Reading`].
  pub fn into_reading(self, mood_score: f64) -> Reading {
    Reading {
      city: self.city,
      lat: self.lat,
      lon: self.lon,
      temperature: self.temperature,
      humidity: self.humidity,
      pressure: self.pressure,
      wind_speed: self.wind_speed,
      clouds: self.clouds,
      rain: self.rain,
      feels_like: self.feels_like,
      timestamp: self.timestamp,
      source: self.source,
      mood_score,
    }
  }
}

// ─── Reading ─────────────────────────────────────────────────────────────────

/// A scored observation, as persisted in the `reading` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
  pub city:        String,
  pub lat:         f64,
  pub lon:         f64,
  pub temperature: f64,
  pub humidity:    Option<f64>,
  pub pressure:    Option<f64>,
  pub wind_speed:  Option<f64>,
  pub clouds:      Option<f64>,
  pub rain:        Option<f64>,
  pub feels_like:  Option<f64>,
  pub timestamp:   DateTime<Utc>,
  pub source:      Source,
  /// 0–100, one decimal place.
  pub mood_score:  f64,
}

impl Reading {
  /// Value of one optional measurement.
  pub fn field(&self, field: WeatherField) -> Option<f64> {
    match field {
      WeatherField::Humidity => self.humidity,
      WeatherField::Pressure => self.pressure,
      WeatherField::WindSpeed => self.wind_speed,
      WeatherField::Clouds => self.clouds,
      WeatherField::Rain => self.rain,
      WeatherField::FeelsLike => self.feels_like,
    }
  }
}
