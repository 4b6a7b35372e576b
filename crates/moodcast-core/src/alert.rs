//! Alerts raised by the anomaly detector. Append-only; never mutated.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

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
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertKind {
  TemperatureChange,
  PressureDrop,
  HighWind,
  HeavyRain,
  SuddenClouds,
}

impl AlertKind {
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownAlertKind(s.to_owned()))
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
  Warning,
  Critical,
}

impl Severity {
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownSeverity(s.to_owned()))
  }
}

/// One threshold crossing. Serialises to the `alert/<city>` wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
  pub city:      String,
  #[serde(rename = "type")]
  pub kind:      AlertKind,
  pub message:   String,
  pub severity:  Severity,
  pub timestamp: DateTime<Utc>,
}
