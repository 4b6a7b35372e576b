//! MoodCast ingestion worker.
//!
//! Consumes weather readings from MQTT, runs them through the
//! validation/scoring/anomaly pipeline in [`gateway`], persists them through a
//! [`TelemetryStore`](moodcast_core::store::TelemetryStore) and republishes
//! derived artifacts.

pub mod bus;
pub mod config;
pub mod dedup;
pub mod error;
pub mod gateway;
pub mod republish;
pub mod retention;
pub mod topic;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use gateway::{Accepted, Gateway, Outcome};

#[cfg(test)]
mod tests;
