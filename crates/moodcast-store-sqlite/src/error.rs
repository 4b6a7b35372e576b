//! Error type for `moodcast-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] moodcast_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A migration step failed; the step's transaction was rolled back.
  #[error("migration to schema version {version} failed: {source}")]
  Migration {
    version: u32,
    source:  rusqlite::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
