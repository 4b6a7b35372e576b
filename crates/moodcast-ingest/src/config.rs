//! Worker configuration: a TOML file layered with `MOODCAST_*` variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;

use crate::dedup;

/// Runtime configuration, deserialised from `moodcast.toml`.
///
/// Every field has a default, so an absent file yields a worker that talks to
/// a local broker and writes `moodcast.db` in the working directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  pub mqtt_host:           String,
  pub mqtt_port:           u16,
  pub client_id:           String,
  /// Leading topic segment; empty means no prefix.
  pub topic_prefix:        String,
  pub store_path:          PathBuf,
  pub retention_days:      u32,
  pub prune_interval_secs: u64,
  pub dedup_capacity:      usize,
  /// Per-topic worker queue depth before the event loop is held back.
  pub queue_capacity:      usize,
  pub keep_alive_secs:     u64,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      mqtt_host:           "localhost".to_owned(),
      mqtt_port:           1883,
      client_id:           "moodcast_ingest".to_owned(),
      topic_prefix:        "moodcast".to_owned(),
      store_path:          PathBuf::from("moodcast.db"),
      retention_days:      7,
      prune_interval_secs: 3600,
      dedup_capacity:      dedup::DEFAULT_CAPACITY,
      queue_capacity:      64,
      keep_alive_secs:     60,
    }
  }
}

impl IngestConfig {
  /// Read `path` (if it exists), then apply `MOODCAST_*` overrides.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("MOODCAST"))
      .build()?
      .try_deserialize()
  }

  /// `store_path` with a leading `~` expanded.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn prune_interval(&self) -> Duration {
    Duration::from_secs(self.prune_interval_secs.max(1))
  }

  pub fn keep_alive(&self) -> Duration { Duration::from_secs(self.keep_alive_secs) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
