//! Source: where a reading came from.
//!
//! Live readings come from the weather provider's current-conditions feed.
//! Forecast and model readings describe the future and never form a
//! continuous series with live observations.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

/// The enumerated origin tag carried by every reading.
///
/// Variant order is the arbitration priority: when two sources tie on quality,
/// the one declared first wins.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
pub enum Source {
  /// Current conditions from the provider, relayed by the per-city IoT feeds.
  #[serde(rename = "openweathermap")]
  #[strum(serialize = "openweathermap")]
  OpenWeatherMap,
  /// The provider's own 3-hourly forecast.
  #[serde(rename = "openweathermap_forecast")]
  #[strum(serialize = "openweathermap_forecast")]
  OpenWeatherMapForecast,
  /// Output of the in-house regression model.
  #[serde(rename = "model_prediction")]
  #[strum(serialize = "model_prediction")]
  ModelPrediction,
}

impl Source {
  /// Parse a wire tag, mapping failures onto the crate error.
  pub fn parse(tag: &str) -> Result<Self> {
    Self::from_str(tag).map_err(|_| Error::UnknownSource(tag.to_owned()))
  }

  /// Whether readings from this source are real observations with temporal
  /// continuity. Anomaly detection only runs for live sources.
  pub fn is_live(self) -> bool { matches!(self, Self::OpenWeatherMap) }

  /// Tie-break rank for source arbitration; lower wins.
  pub fn priority(self) -> u8 {
    match self {
      Self::OpenWeatherMap => 0,
      Self::OpenWeatherMapForecast => 1,
      Self::ModelPrediction => 2,
    }
  }
}
