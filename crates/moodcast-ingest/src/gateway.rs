//! Intake gateway: one bus message in, one [`Outcome`] out.
//!
//! Stages run strictly in order for a message: dedup → validate → mood score →
//! quality → anomaly → persist → republish → source selection. Two pieces of
//! state are shared between concurrent messages and each sits behind its own
//! lock: the dedup cache, and the arbiter's read-then-publish sequence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use moodcast_core::{
  anomaly, arbiter,
  mood::{CanonicalMoodScorer, MoodScorer},
  node::NodeRecord,
  quality,
  source::Source,
  store::{TelemetryStore, WriteBatch},
  validate::{RawReading, RejectionReason, validate},
};
use tokio::sync::Mutex;

use crate::{
  Error, Result,
  dedup::DedupCache,
  republish::{Publisher, Republisher},
  topic::{Channel, InboundTopic},
};

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  Accepted(Accepted),
  /// Same `(city, source, timestamp)` seen recently.
  Duplicate,
  /// Not JSON, or not the expected shape.
  Malformed,
  Rejected(RejectionReason),
  /// Not a topic this worker consumes.
  UnknownTopic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
  pub city:       String,
  pub source:     Source,
  pub mood_score: f64,
  pub alerts:     usize,
  /// Best source for the city after this reading, if one could be chosen.
  pub selected:   Option<Source>,
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

pub struct Gateway<S, P> {
  store:       Arc<S>,
  republisher: Republisher<P>,
  scorer:      Box<dyn MoodScorer>,
  prefix:      String,
  dedup:       Mutex<DedupCache>,
  selection:   Mutex<()>,
}

impl<S, P> Gateway<S, P>
where
  S: TelemetryStore,
  P: Publisher,
{
  pub fn new(
    store:          Arc<S>,
    publisher:      P,
    prefix:         impl Into<String>,
    dedup_capacity: usize,
  ) -> Self {
    let prefix = prefix.into();
    Self {
      store,
      republisher: Republisher::new(publisher, prefix.clone()),
      scorer: Box::new(CanonicalMoodScorer),
      prefix,
      dedup: Mutex::new(DedupCache::new(dedup_capacity)),
      selection: Mutex::new(()),
    }
  }

  /// Replace the mood scoring rule.
  pub fn with_scorer(mut self, scorer: impl MoodScorer + 'static) -> Self {
    self.scorer = Box::new(scorer);
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn prefix(&self) -> &str { &self.prefix }

  /// Process one message as of the current time.
  pub async fn handle(&self, topic: &str, payload: &[u8]) -> Result<Outcome> {
    self.handle_at(topic, payload, Utc::now()).await
  }

  /// Process one message as of `now`.
  ///
  /// Drops (duplicate, malformed, rejected) are `Ok`; only a store failure is
  /// an `Err`, and the message is not retried.
  pub async fn handle_at(
    &self,
    topic:   &str,
    payload: &[u8],
    now:     DateTime<Utc>,
  ) -> Result<Outcome> {
    let Some(inbound) = InboundTopic::parse(&self.prefix, topic) else {
      tracing::debug!(topic, "ignoring message on unknown topic");
      return Ok(Outcome::UnknownTopic);
    };

    let raw = match RawReading::from_json(payload) {
      Ok(raw) => raw,
      Err(e) => {
        tracing::warn!(topic, error = %e, "dropping malformed payload");
        return Ok(Outcome::Malformed);
      }
    };

    if let Some(key) = raw.dedup_key()
      && !self.dedup.lock().await.insert(key)
    {
      tracing::debug!(topic, "dropping duplicate message");
      return Ok(Outcome::Duplicate);
    }

    let observation = match validate(&raw).and_then(|obs| {
      if inbound.channel == Channel::Forecast && obs.source.is_live() {
        Err(RejectionReason::SourceTopicMismatch(obs.source))
      } else {
        Ok(obs)
      }
    }) {
      Ok(obs) => obs,
      Err(reason) => {
        tracing::warn!(topic, %reason, "rejecting reading");
        return Ok(Outcome::Rejected(reason));
      }
    };

    let mood_score = self.scorer.score(observation.temperature, observation.clouds);
    let reading = observation.into_reading(mood_score);
    let metric = quality::score(&reading, now);

    let alerts = if reading.source.is_live() {
      anomaly::detect(self.store.as_ref(), &reading, now)
        .await
        .map_err(Error::store)?
    } else {
      Vec::new()
    };

    let node = NodeRecord::for_reading(
      &reading,
      raw.node_id.clone(),
      raw.sensor_id.clone(),
      now,
    );

    self
      .store
      .write(WriteBatch {
        reading: reading.clone(),
        metric:  metric.clone(),
        alerts:  alerts.clone(),
        node,
      })
      .await
      .map_err(Error::store)?;

    tracing::info!(
      city = %reading.city,
      source = %reading.source,
      mood_score,
      completeness = metric.completeness,
      alerts = alerts.len(),
      "stored reading"
    );

    self.republisher.publish_quality(&metric);
    for alert in &alerts {
      tracing::warn!(
        city = %alert.city,
        kind = %alert.kind,
        severity = %alert.severity,
        "{}",
        alert.message
      );
      self.republisher.publish_alert(alert);
    }

    let selected = match self.select_source(&reading.city, now).await {
      Ok(selected) => selected,
      Err(e) => {
        tracing::warn!(city = %reading.city, error = %e, "source selection failed");
        None
      }
    };

    Ok(Outcome::Accepted(Accepted {
      city: reading.city,
      source: reading.source,
      mood_score,
      alerts: alerts.len(),
      selected,
    }))
  }

  /// Pick the best source for `city` and announce it.
  ///
  /// The read and the publish happen under one lock so concurrent selections
  /// cannot announce results out of order.
  pub async fn select_source(
    &self,
    city: &str,
    now:  DateTime<Utc>,
  ) -> Result<Option<Source>> {
    let _guard = self.selection.lock().await;
    let best = arbiter::select_best_source(self.store.as_ref(), city, now)
      .await
      .map_err(Error::store)?;
    if let Some(source) = best {
      tracing::debug!(city, %source, "selected source");
      self.republisher.publish_source(city, source);
    }
    Ok(best)
  }
}
