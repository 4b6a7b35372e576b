//! Error types for `moodcast-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown source tag: {0:?}")]
  UnknownSource(String),

  #[error("unknown weather field: {0:?}")]
  UnknownField(String),

  #[error("unknown alert kind: {0:?}")]
  UnknownAlertKind(String),

  #[error("unknown alert severity: {0:?}")]
  UnknownSeverity(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
