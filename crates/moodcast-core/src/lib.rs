//! Core types and pipeline stages for MoodCast telemetry ingestion.
//!
//! This crate is deliberately free of bus and database dependencies. Every
//! stage here is either a pure function or generic over [`store::TelemetryStore`];
//! the storage backend and the MQTT adapter live in their own crates.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod alert;
pub mod anomaly;
pub mod arbiter;
pub mod error;
pub mod mood;
pub mod node;
pub mod quality;
pub mod reading;
pub mod source;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
