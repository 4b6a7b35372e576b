//! Event republisher: derived artifacts back onto the bus.
//!
//! Publication is fire-and-forget. A failure is logged and dropped; it never
//! undoes the store write that preceded it.

use moodcast_core::{
  alert::Alert, mood::round_tenth, quality::QualityMetric, reading::WeatherField,
  source::Source,
};
use serde::Serialize;

use crate::{
  Error, Result,
  topic::{self, Artifact},
};

/// Transport seam for outbound messages. Implementations must not block.
pub trait Publisher: Send + Sync {
  fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

// ─── Wire shapes ─────────────────────────────────────────────────────────────

/// Body of `quality/<city>`.
#[derive(Debug, Serialize)]
pub struct QualityEvent<'a> {
  pub city:           &'a str,
  pub source:         Source,
  /// Percent, one decimal place.
  pub completeness:   f64,
  pub freshness:      i64,
  pub missing_fields: &'a [WeatherField],
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:          Option<&'a str>,
}

impl<'a> From<&'a QualityMetric> for QualityEvent<'a> {
  fn from(m: &'a QualityMetric) -> Self {
    Self {
      city:           &m.city,
      source:         m.source,
      completeness:   round_tenth(m.completeness),
      freshness:      m.freshness,
      missing_fields: &m.missing_fields,
      error:          m.error.as_deref(),
    }
  }
}

/// Body of `source/<city>`.
#[derive(Debug, Serialize)]
pub struct SourceEvent<'a> {
  pub city:   &'a str,
  pub source: Source,
}

// ─── Republisher ─────────────────────────────────────────────────────────────

pub struct Republisher<P> {
  publisher: P,
  prefix:    String,
}

impl<P: Publisher> Republisher<P> {
  pub fn new(publisher: P, prefix: impl Into<String>) -> Self {
    Self { publisher, prefix: prefix.into() }
  }

  pub fn publish_quality(&self, metric: &QualityMetric) {
    self.emit(Artifact::Quality, &metric.city, &QualityEvent::from(metric));
  }

  pub fn publish_alert(&self, alert: &Alert) {
    self.emit(Artifact::Alert, &alert.city, alert);
  }

  pub fn publish_source(&self, city: &str, source: Source) {
    self.emit(Artifact::Source, city, &SourceEvent { city, source });
  }

  /// Serialise `body` and emit it on the artifact's topic for `city`.
  pub fn emit<T: Serialize + ?Sized>(&self, artifact: Artifact, city: &str, body: &T) {
    let topic = topic::outbound(&self.prefix, artifact, city);
    let sent = serde_json::to_vec(body)
      .map_err(Error::from)
      .and_then(|payload| self.publisher.publish(&topic, payload));
    match sent {
      Ok(()) => tracing::debug!(%topic, "republished"),
      Err(e) => tracing::warn!(%topic, error = %e, "republish failed"),
    }
  }
}
