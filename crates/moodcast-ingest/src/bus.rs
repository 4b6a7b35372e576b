//! MQTT transport: the event loop, per-topic workers and the outbound
//! publisher.
//!
//! The event loop never processes a message itself. Each inbound topic gets a
//! dedicated worker fed through a bounded channel, so messages on one topic are
//! handled strictly in order while cities proceed independently.
//!
//! A full queue holds the event loop back, but only for [`QUEUE_WAIT`]. While
//! it waits the loop sends no keep-alive pings and drains no outbound
//! publishes, so the wait stays well under the keep-alive interval; a message
//! that still does not fit is dropped and logged.
//!
//! Workers stop after [`WORKER_IDLE`] without traffic and are forgotten, so a
//! stream of one-off city topics does not accumulate tasks.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use moodcast_core::store::TelemetryStore;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc::{self, error::SendTimeoutError};

use crate::{
  Error, Result,
  config::IngestConfig,
  gateway::Gateway,
  republish::Publisher,
  topic,
};

/// Requests buffered between the client handle and the event loop.
const CLIENT_CAPACITY: usize = 64;

/// Pause before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Longest the event loop waits on a full worker queue.
pub const QUEUE_WAIT: Duration = Duration::from_secs(5);

/// A worker with no message for this long shuts down.
pub const WORKER_IDLE: Duration = Duration::from_secs(600);

// ─── Publisher ───────────────────────────────────────────────────────────────

/// [`Publisher`] backed by the worker's own MQTT connection.
#[derive(Clone)]
pub struct MqttPublisher {
  client: AsyncClient,
}

impl MqttPublisher {
  pub fn new(client: AsyncClient) -> Self { Self { client } }
}

impl Publisher for MqttPublisher {
  fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
    self
      .client
      .try_publish(topic, QoS::AtLeastOnce, false, payload)
      .map_err(Error::from)
  }
}

// ─── Connection ──────────────────────────────────────────────────────────────

pub fn connect(cfg: &IngestConfig) -> (AsyncClient, EventLoop) {
  let mut options =
    MqttOptions::new(cfg.client_id.clone(), cfg.mqtt_host.clone(), cfg.mqtt_port);
  options.set_keep_alive(cfg.keep_alive());
  AsyncClient::new(options, CLIENT_CAPACITY)
}

/// Drive the event loop forever, dispatching publishes to per-topic workers.
///
/// Subscriptions are (re)issued on every `ConnAck`, so a broker restart does
/// not silently stop the feed.
pub async fn run<S, P>(
  client:         AsyncClient,
  mut eventloop:  EventLoop,
  gateway:        Arc<Gateway<S, P>>,
  queue_capacity: usize,
) where
  S: TelemetryStore + 'static,
  P: Publisher + 'static,
{
  let filters = topic::subscriptions(gateway.prefix());
  let mut workers = Workers::new(gateway, queue_capacity);

  loop {
    match eventloop.poll().await {
      Ok(Event::Incoming(Packet::ConnAck(_))) => {
        tracing::info!("connected to broker");
        for filter in &filters {
          match client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
            Ok(()) => tracing::info!(%filter, "subscribed"),
            Err(e) => tracing::error!(%filter, error = %e, "subscribe failed"),
          }
        }
      }
      Ok(Event::Incoming(Packet::Publish(publish))) => {
        workers.dispatch(publish.topic, publish.payload).await;
      }
      Ok(_) => {}
      Err(e) => {
        tracing::warn!(error = %e, "connection error; retrying");
        tokio::time::sleep(RECONNECT_DELAY).await;
      }
    }
  }
}

// ─── Workers ─────────────────────────────────────────────────────────────────

/// What became of a dispatched payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
  Queued,
  /// The topic's queue stayed full for the whole wait.
  Dropped,
}

/// Live topic workers, keyed by topic.
pub struct Workers<S, P> {
  gateway:        Arc<Gateway<S, P>>,
  queue_capacity: usize,
  queue_wait:     Duration,
  idle:           Duration,
  senders:        HashMap<String, mpsc::Sender<Bytes>>,
}

impl<S, P> Workers<S, P>
where
  S: TelemetryStore + 'static,
  P: Publisher + 'static,
{
  pub fn new(gateway: Arc<Gateway<S, P>>, queue_capacity: usize) -> Self {
    Self::with_timing(gateway, queue_capacity, QUEUE_WAIT, WORKER_IDLE)
  }

  pub fn with_timing(
    gateway:        Arc<Gateway<S, P>>,
    queue_capacity: usize,
    queue_wait:     Duration,
    idle:           Duration,
  ) -> Self {
    Self {
      gateway,
      queue_capacity: queue_capacity.max(1),
      queue_wait,
      idle,
      senders: HashMap::new(),
    }
  }

  /// Number of topics with a running worker.
  pub fn len(&self) -> usize { self.senders.len() }

  pub fn is_empty(&self) -> bool { self.senders.is_empty() }

  /// Hand one payload to the worker for `topic`, starting one if needed.
  pub async fn dispatch(&mut self, topic: String, payload: Bytes) -> Delivery {
    let sender = match self.senders.get(&topic) {
      Some(sender) if !sender.is_closed() => sender.clone(),
      _ => self.start(&topic),
    };

    let payload = match sender.send_timeout(payload, self.queue_wait).await {
      Ok(()) => return Delivery::Queued,
      Err(SendTimeoutError::Timeout(_)) => {
        tracing::error!(%topic, "dropping message: worker queue full");
        return Delivery::Dropped;
      }
      // The worker went idle between the check and the send.
      Err(SendTimeoutError::Closed(payload)) => payload,
    };

    let sender = self.start(&topic);
    match sender.send_timeout(payload, self.queue_wait).await {
      Ok(()) => Delivery::Queued,
      Err(_) => {
        tracing::error!(%topic, "dropping message: worker unavailable");
        Delivery::Dropped
      }
    }
  }

  /// Start a worker for `topic`, forgetting any that have stopped.
  fn start(&mut self, topic: &str) -> mpsc::Sender<Bytes> {
    self.senders.retain(|_, sender| !sender.is_closed());
    let sender = spawn_worker(
      topic.to_owned(),
      self.gateway.clone(),
      self.queue_capacity,
      self.idle,
    );
    self.senders.insert(topic.to_owned(), sender.clone());
    sender
  }
}

fn spawn_worker<S, P>(
  topic:          String,
  gateway:        Arc<Gateway<S, P>>,
  queue_capacity: usize,
  idle:           Duration,
) -> mpsc::Sender<Bytes>
where
  S: TelemetryStore + 'static,
  P: Publisher + 'static,
{
  let (tx, mut rx) = mpsc::channel::<Bytes>(queue_capacity);
  tracing::debug!(%topic, "starting topic worker");
  tokio::spawn(async move {
    loop {
      match tokio::time::timeout(idle, rx.recv()).await {
        Ok(Some(payload)) => process(&gateway, &topic, &payload).await,
        Ok(None) => break,
        Err(_) => {
          // Refuse new work, then finish anything already queued.
          rx.close();
          while let Some(payload) = rx.recv().await {
            process(&gateway, &topic, &payload).await;
          }
          tracing::debug!(%topic, "topic worker idle; stopping");
          break;
        }
      }
    }
  });
  tx
}

async fn process<S, P>(gateway: &Gateway<S, P>, topic: &str, payload: &[u8])
where
  S: TelemetryStore,
  P: Publisher,
{
  match gateway.handle(topic, payload).await {
    Ok(outcome) => tracing::trace!(topic, ?outcome, "message handled"),
    Err(e) => tracing::error!(topic, error = %e, "message dropped"),
  }
}
