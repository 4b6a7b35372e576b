//! Error types for the ingestion worker.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A store read or write failed; the message is not retried.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("mqtt client error: {0}")]
  Client(#[from] rumqttc::ClientError),
  #[error("publish rejected: {0}")]
  Publish(String),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
