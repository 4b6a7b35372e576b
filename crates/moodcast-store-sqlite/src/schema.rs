//! Versioned SQL schema for the MoodCast SQLite store.
//!
//! Steps are additive and applied in increasing version order, each inside
//! its own transaction together with its `schema_version` row. A step is
//! never edited once released; changes go in a new step.

/// Run before any step; creates the version ledger itself.
pub const BOOTSTRAP: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TEXT NOT NULL        -- ISO 8601 UTC
);
";

pub struct Migration {
  pub version:     u32,
  pub description: &'static str,
  pub sql:         &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
  Migration {
    version:     1,
    description: "base tables",
    sql:         "
-- Readings, metrics and alerts are append-only history; rows only ever
-- leave through retention pruning.
CREATE TABLE IF NOT EXISTS reading (
    city        TEXT NOT NULL,
    lat         REAL NOT NULL,
    lon         REAL NOT NULL,
    temp        REAL NOT NULL,
    humidity    REAL,
    pressure    REAL,
    wind_speed  REAL,
    clouds      REAL,
    rain        REAL,
    timestamp   TEXT NOT NULL,
    source      TEXT NOT NULL,
    mood_score  REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS quality_metric (
    city            TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    completeness    REAL NOT NULL,
    freshness       INTEGER NOT NULL,
    missing_fields  TEXT NOT NULL DEFAULT '',   -- comma-separated
    error           TEXT,
    source          TEXT NOT NULL
);

-- Liveness, one row per city. Never pruned.
CREATE TABLE IF NOT EXISTS node_record (
    city       TEXT PRIMARY KEY,
    node_id    TEXT NOT NULL,
    sensor_id  TEXT NOT NULL,
    last_seen  TEXT NOT NULL,
    lat        REAL NOT NULL,
    lon        REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS alert (
    city       TEXT NOT NULL,
    type       TEXT NOT NULL,   -- 'temperature_change' | 'pressure_drop' | ...
    message    TEXT NOT NULL,
    timestamp  TEXT NOT NULL,
    severity   TEXT NOT NULL    -- 'warning' | 'critical'
);
",
  },
  Migration {
    version:     2,
    description: "apparent temperature",
    sql:         "ALTER TABLE reading ADD COLUMN feels_like REAL;",
  },
  Migration {
    version:     3,
    description: "lookup indexes",
    sql:         "
CREATE INDEX IF NOT EXISTS reading_city_source_ts_idx ON reading(city, source, timestamp);
CREATE INDEX IF NOT EXISTS quality_city_ts_idx        ON quality_metric(city, timestamp);
CREATE INDEX IF NOT EXISTS alert_city_ts_idx          ON alert(city, timestamp);
",
  },
];

/// Highest version this build knows how to reach.
pub fn latest_version() -> u32 {
  MIGRATIONS.last().map_or(0, |m| m.version)
}
