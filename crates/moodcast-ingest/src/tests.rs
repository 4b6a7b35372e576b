//! Pipeline tests: the gateway against an in-memory `SqliteStore` and a
//! publisher that records what would have gone to the broker.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone as _, Utc};
use moodcast_core::{
  alert::{AlertKind, Severity},
  source::Source,
  store::TelemetryStore,
  validate::RejectionReason,
};
use moodcast_store_sqlite::SqliteStore;
use serde_json::{Value, json};

use crate::{Accepted, Error, Gateway, Outcome, Result, republish::Publisher};

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct RecordingPublisher {
  sent: Arc<Mutex<Vec<(String, Value)>>>,
  fail: bool,
}

impl RecordingPublisher {
  fn failing() -> Self { Self { fail: true, ..Default::default() } }

  fn sent(&self) -> Vec<(String, Value)> { self.sent.lock().unwrap().clone() }

  fn on(&self, topic: &str) -> Vec<Value> {
    self
      .sent()
      .into_iter()
      .filter(|(t, _)| t == topic)
      .map(|(_, body)| body)
      .collect()
  }
}

impl Publisher for RecordingPublisher {
  fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
    if self.fail {
      return Err(Error::Publish("broker unavailable".into()));
    }
    let body: Value = serde_json::from_slice(&payload)?;
    self.sent.lock().unwrap().push((topic.to_owned(), body));
    Ok(())
  }
}

type TestGateway = Gateway<SqliteStore, RecordingPublisher>;

async fn gateway_with(publisher: RecordingPublisher) -> TestGateway {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  Gateway::new(Arc::new(store), publisher, "moodcast", 1000)
}

async fn gateway() -> (TestGateway, RecordingPublisher) {
  let publisher = RecordingPublisher::default();
  (gateway_with(publisher.clone()).await, publisher)
}

fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() }

fn stamp(at: DateTime<Utc>) -> String { at.format("%Y-%m-%d %H:%M:%S").to_string() }

/// A complete live reading as an IoT feed relays it.
fn live(city: &str, at: DateTime<Utc>) -> Value {
  json!({
    "city": city, "lat": 51.5074, "lon": -0.1278,
    "temp": 18.0, "humidity": 70, "pressure": 1013, "wind_speed": 3.0,
    "clouds": 40, "rain": 0, "feels_like": 17.5,
    "timestamp": stamp(at), "source": "openweathermap"
  })
}

/// A provider forecast entry with its fields nested under `weather`.
fn forecast(city: &str, at: DateTime<Utc>) -> Value {
  json!({
    "city": city, "lat": 51.5074, "lon": -0.1278,
    "weather": {
      "temp": 16.0, "humidity": 80, "pressure": 1009, "wind_speed": 22.0,
      "clouds": 90, "rain": 7.5, "feels_like": 15.0
    },
    "timestamp": stamp(at), "source": "openweathermap_forecast"
  })
}

fn bytes(v: &Value) -> Vec<u8> { serde_json::to_vec(v).unwrap() }

fn accepted(outcome: Outcome) -> Accepted {
  match outcome {
    Outcome::Accepted(a) => a,
    other => panic!("expected Accepted, got {other:?}"),
  }
}

// ─── Acceptance ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn accepted_reading_is_stored_and_scored() {
  let (gw, _) = gateway().await;
  let outcome = gw
    .handle_at("moodcast/sensor/London", &bytes(&live("London", now())), now())
    .await
    .unwrap();

  let a = accepted(outcome);
  assert_eq!(a.city, "London");
  assert_eq!(a.source, Source::OpenWeatherMap);
  // (100 - 40) * (18 / 30)
  assert_eq!(a.mood_score, 36.0);
  assert_eq!(a.alerts, 0);

  let readings = gw.store().readings("London").await.unwrap();
  assert_eq!(readings.len(), 1);
  assert_eq!(readings[0].mood_score, 36.0);
  assert_eq!(readings[0].feels_like, Some(17.5));
}

#[tokio::test]
async fn node_record_tracks_last_accepted_reading() {
  let (gw, _) = gateway().await;
  gw.handle_at("moodcast/sensor/New York", &bytes(&live("New York", now())), now())
    .await
    .unwrap();

  let node = gw.store().node("New York").await.unwrap().unwrap();
  assert_eq!(node.node_id, "moodcast_node_new_york");
  assert_eq!(node.sensor_id, "moodcast_sensor_new_york");
  assert_eq!(node.last_seen, now());

  let later = now() + Duration::minutes(5);
  let mut payload = live("New York", later);
  payload["node_id"] = json!("rooftop-7");
  gw.handle_at("moodcast/sensor/New York", &bytes(&payload), later)
    .await
    .unwrap();

  let node = gw.store().node("New York").await.unwrap().unwrap();
  assert_eq!(node.node_id, "rooftop-7");
  assert_eq!(node.last_seen, later);
}

// ─── Drops ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_is_stored_once() {
  let (gw, publisher) = gateway().await;
  let payload = bytes(&live("London", now()));

  accepted(gw.handle_at("moodcast/sensor/London", &payload, now()).await.unwrap());
  let published = publisher.sent().len();

  let second = gw.handle_at("moodcast/sensor/London", &payload, now()).await.unwrap();
  assert_eq!(second, Outcome::Duplicate);
  assert_eq!(gw.store().readings("London").await.unwrap().len(), 1);
  assert_eq!(publisher.sent().len(), published);
}

#[tokio::test]
async fn malformed_payloads_are_dropped() {
  let (gw, publisher) = gateway().await;
  for payload in [&b"not json"[..], &b"{\"city\": 5}"[..], &b""[..]] {
    let outcome = gw.handle_at("moodcast/sensor/London", payload, now()).await.unwrap();
    assert_eq!(outcome, Outcome::Malformed);
  }
  assert!(gw.store().readings("London").await.unwrap().is_empty());
  assert!(publisher.sent().is_empty());
}

#[tokio::test]
async fn invalid_readings_are_rejected_before_persistence() {
  let (gw, publisher) = gateway().await;

  let mut no_temp = live("London", now());
  no_temp.as_object_mut().unwrap().remove("temp");
  let mut too_hot = live("London", now() + Duration::seconds(1));
  too_hot["temp"] = json!(60.0);
  let mut unknown = live("London", now() + Duration::seconds(2));
  unknown["source"] = json!("weatherstack");

  let cases = [
    (no_temp, RejectionReason::MissingField("temp")),
    (too_hot, RejectionReason::OutOfRange(60.0)),
    (unknown, RejectionReason::UnknownSource("weatherstack".into())),
  ];
  for (payload, reason) in cases {
    let outcome = gw
      .handle_at("moodcast/sensor/London", &bytes(&payload), now())
      .await
      .unwrap();
    assert_eq!(outcome, Outcome::Rejected(reason));
  }

  assert!(gw.store().readings("London").await.unwrap().is_empty());
  assert!(gw.store().node("London").await.unwrap().is_none());
  assert!(publisher.sent().is_empty());
}

#[tokio::test]
async fn live_source_on_forecast_topic_is_rejected() {
  let (gw, _) = gateway().await;
  let outcome = gw
    .handle_at("moodcast/forecast/London", &bytes(&live("London", now())), now())
    .await
    .unwrap();
  assert_eq!(
    outcome,
    Outcome::Rejected(RejectionReason::SourceTopicMismatch(Source::OpenWeatherMap))
  );
}

#[tokio::test]
async fn foreign_topics_are_ignored() {
  let (gw, _) = gateway().await;
  let payload = bytes(&live("London", now()));
  for topic in ["moodcast/quality/London", "other/sensor/London"] {
    assert_eq!(gw.handle_at(topic, &payload, now()).await.unwrap(), Outcome::UnknownTopic);
  }
}

// ─── Anomalies ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn pressure_drop_raises_critical_alert() {
  let (gw, publisher) = gateway().await;
  let earlier = now() - Duration::hours(2);
  gw.handle_at("moodcast/sensor/London", &bytes(&live("London", earlier)), earlier)
    .await
    .unwrap();

  let mut current = live("London", now());
  current["pressure"] = json!(1008);
  let a = accepted(
    gw.handle_at("moodcast/sensor/London", &bytes(&current), now())
      .await
      .unwrap(),
  );
  assert_eq!(a.alerts, 1);

  let alerts = gw.store().alerts("London").await.unwrap();
  assert_eq!(alerts.len(), 1);
  assert_eq!(alerts[0].kind, AlertKind::PressureDrop);
  assert_eq!(alerts[0].severity, Severity::Critical);
  assert_eq!(alerts[0].timestamp, now());

  let sent = publisher.on("moodcast/alert/London");
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0]["type"], "pressure_drop");
  assert_eq!(sent[0]["severity"], "critical");
  assert_eq!(sent[0]["city"], "London");
}

#[tokio::test]
async fn high_wind_needs_no_prior_reading() {
  let (gw, publisher) = gateway().await;
  let mut payload = live("Oslo", now());
  payload["wind_speed"] = json!(20.0);

  let a = accepted(
    gw.handle_at("moodcast/sensor/Oslo", &bytes(&payload), now())
      .await
      .unwrap(),
  );
  assert_eq!(a.alerts, 1);
  let alerts = gw.store().alerts("Oslo").await.unwrap();
  assert_eq!(alerts[0].kind, AlertKind::HighWind);
  assert_eq!(publisher.on("moodcast/alert/Oslo").len(), 1);
}

#[tokio::test]
async fn forecast_sources_skip_anomaly_detection() {
  let (gw, publisher) = gateway().await;
  let a = accepted(
    gw.handle_at("moodcast/forecast/London", &bytes(&forecast("London", now())), now())
      .await
      .unwrap(),
  );
  assert_eq!(a.source, Source::OpenWeatherMapForecast);
  assert_eq!(a.alerts, 0);
  assert!(gw.store().alerts("London").await.unwrap().is_empty());
  assert!(publisher.on("moodcast/alert/London").is_empty());

  // Nested fields were read.
  let readings = gw.store().readings("London").await.unwrap();
  assert_eq!(readings[0].wind_speed, Some(22.0));
  assert_eq!(readings[0].rain, Some(7.5));
}

// ─── Republishing & arbitration ──────────────────────────────────────────────

#[tokio::test]
async fn quality_event_describes_the_reading() {
  let (gw, publisher) = gateway().await;
  let mut payload = live("Paris", now() - Duration::minutes(10));
  payload.as_object_mut().unwrap().remove("rain");
  gw.handle_at("moodcast/sensor/Paris", &bytes(&payload), now())
    .await
    .unwrap();

  let sent = publisher.on("moodcast/quality/Paris");
  assert_eq!(sent.len(), 1);
  let q = &sent[0];
  assert_eq!(q["city"], "Paris");
  assert_eq!(q["source"], "openweathermap");
  assert_eq!(q["completeness"], 83.3);
  assert_eq!(q["freshness"], 600);
  assert_eq!(q["missing_fields"], json!(["rain"]));
  assert_eq!(q["error"], "Stale data: 600s");
}

#[tokio::test]
async fn complete_fresh_reading_has_no_quality_error() {
  let (gw, publisher) = gateway().await;
  gw.handle_at("moodcast/sensor/Paris", &bytes(&live("Paris", now())), now())
    .await
    .unwrap();
  let q = &publisher.on("moodcast/quality/Paris")[0];
  assert_eq!(q["completeness"], 100.0);
  assert!(q.get("error").is_none());
}

#[tokio::test]
async fn arbiter_prefers_more_complete_source() {
  let (gw, publisher) = gateway().await;

  let a = accepted(
    gw.handle_at("moodcast/sensor/Rome", &bytes(&live("Rome", now())), now())
      .await
      .unwrap(),
  );
  assert_eq!(a.selected, Some(Source::OpenWeatherMap));

  // Model output carries only three of the six optional fields.
  let model = json!({
    "city": "Rome", "lat": 41.9, "lon": 12.5,
    "temp": 24.0, "humidity": 50, "pressure": 1012, "clouds": 10,
    "timestamp": stamp(now()), "source": "model_prediction"
  });
  let later = now() + Duration::minutes(1);
  let a = accepted(
    gw.handle_at("moodcast/forecast/Rome", &bytes(&model), later)
      .await
      .unwrap(),
  );
  assert_eq!(a.source, Source::ModelPrediction);
  assert_eq!(a.selected, Some(Source::OpenWeatherMap));

  let sent = publisher.on("moodcast/source/Rome");
  assert_eq!(sent.len(), 2);
  assert_eq!(sent[1], json!({ "city": "Rome", "source": "openweathermap" }));
}

#[tokio::test]
async fn publish_failure_keeps_the_write() {
  let gw = gateway_with(RecordingPublisher::failing()).await;
  let mut payload = live("Berlin", now());
  payload["rain"] = json!(9.0);

  let a = accepted(
    gw.handle_at("moodcast/sensor/Berlin", &bytes(&payload), now())
      .await
      .unwrap(),
  );
  assert_eq!(a.alerts, 1);
  assert_eq!(gw.store().readings("Berlin").await.unwrap().len(), 1);
  assert_eq!(gw.store().alerts("Berlin").await.unwrap().len(), 1);
  assert!(gw.store().node("Berlin").await.unwrap().is_some());
}

#[tokio::test]
async fn empty_prefix_uses_bare_topics() {
  let publisher = RecordingPublisher::default();
  let store = SqliteStore::open_in_memory().await.unwrap();
  let gw = Gateway::new(Arc::new(store), publisher.clone(), "", 16);

  accepted(
    gw.handle_at("sensor/Lima", &bytes(&live("Lima", now())), now())
      .await
      .unwrap(),
  );
  let topics: Vec<String> = publisher.sent().into_iter().map(|(t, _)| t).collect();
  assert_eq!(topics, ["quality/Lima", "source/Lima"]);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_messages_store_one_reading() {
  let (gw, publisher) = gateway().await;
  let gw = Arc::new(gw);
  let payload = bytes(&live("Madrid", now()));

  let mut tasks = tokio::task::JoinSet::new();
  for i in 0..16 {
    let gw = gw.clone();
    let payload = payload.clone();
    // Distinct topics so no per-topic worker would serialise them.
    let topic = format!("moodcast/sensor/Madrid-{i}");
    tasks.spawn(async move { gw.handle_at(&topic, &payload, now()).await.unwrap() });
  }

  let mut accepted = 0;
  let mut duplicates = 0;
  while let Some(outcome) = tasks.join_next().await {
    match outcome.unwrap() {
      Outcome::Accepted(_) => accepted += 1,
      Outcome::Duplicate => duplicates += 1,
      other => panic!("unexpected outcome {other:?}"),
    }
  }
  assert_eq!(accepted, 1);
  assert_eq!(duplicates, 15);
  assert_eq!(gw.store().readings("Madrid").await.unwrap().len(), 1);
  assert_eq!(publisher.on("moodcast/source/Madrid").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_selections_all_publish() {
  let (gw, publisher) = gateway().await;
  let gw = Arc::new(gw);

  let mut tasks = tokio::task::JoinSet::new();
  for i in 0..8 {
    let gw = gw.clone();
    let at = now() - Duration::seconds(i);
    let payload = bytes(&live("Lisbon", at));
    tasks.spawn(async move {
      gw.handle_at("moodcast/sensor/Lisbon", &payload, now()).await.unwrap()
    });
  }
  while let Some(outcome) = tasks.join_next().await {
    let a = accepted(outcome.unwrap());
    assert_eq!(a.selected, Some(Source::OpenWeatherMap));
  }

  assert_eq!(gw.store().readings("Lisbon").await.unwrap().len(), 8);
  let sent = publisher.on("moodcast/source/Lisbon");
  assert_eq!(sent.len(), 8);
  assert!(sent.iter().all(|body| body["source"] == "openweathermap"));
}
