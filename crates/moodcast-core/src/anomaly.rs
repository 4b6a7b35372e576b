//! Rate-of-change anomaly detection.
//!
//! A new reading is compared against the immediately preceding reading from
//! the same `(city, source)`. Relative rules (temperature change, pressure
//! drop, sudden clouds) need that prior reading and a positive gap between
//! the two; absolute rules (high wind, heavy rain) look at the new reading
//! alone. Every rule fires independently.
//!
//! Forecast and model readings have no temporal continuity with each other,
//! so the pipeline only calls [`detect`] for live sources.

use chrono::{DateTime, Utc};

use crate::{
  alert::{Alert, AlertKind, Severity},
  reading::Reading,
  store::TelemetryStore,
};

/// °C per hour.
pub const TEMPERATURE_RATE_LIMIT: f64 = 5.0;
/// hPa, evaluated over at most [`PRESSURE_WINDOW_HOURS`].
pub const PRESSURE_DROP_LIMIT: f64 = 4.0;
pub const PRESSURE_WINDOW_HOURS: f64 = 3.0;
/// m/s.
pub const HIGH_WIND_LIMIT: f64 = 15.0;
/// mm/h.
pub const HEAVY_RAIN_LIMIT: f64 = 5.0;
/// Percentage points, evaluated over at most [`CLOUD_WINDOW_HOURS`].
pub const CLOUD_JUMP_LIMIT: f64 = 50.0;
/// Cloud cover (%) the new reading must reach for a jump to count.
pub const OVERCAST_LEVEL: f64 = 80.0;
pub const CLOUD_WINDOW_HOURS: f64 = 1.0;

/// Look up the prior reading for `reading`'s `(city, source)` and evaluate
/// every rule against it.
pub async fn detect<S: TelemetryStore>(
  store:   &S,
  reading: &Reading,
  now:     DateTime<Utc>,
) -> Result<Vec<Alert>, S::Error> {
  let prior = store
    .previous_reading(&reading.city, reading.source, reading.timestamp)
    .await?;
  Ok(evaluate(prior.as_ref(), reading, now))
}

/// Pure rule evaluation. Alerts are stamped with `now`.
pub fn evaluate(
  prior:   Option<&Reading>,
  reading: &Reading,
  now:     DateTime<Utc>,
) -> Vec<Alert> {
  let mut alerts = Vec::new();
  let mut raise = |kind, severity, message: String| {
    alerts.push(Alert {
      city: reading.city.clone(),
      kind,
      message,
      severity,
      timestamp: now,
    });
  };

  if let Some((prior, hours)) = prior.and_then(|p| elapsed_hours(p, reading).map(|h| (p, h))) {
    let delta = reading.temperature - prior.temperature;
    let rate = delta.abs() / hours;
    if rate >= TEMPERATURE_RATE_LIMIT {
      raise(
        AlertKind::TemperatureChange,
        Severity::Warning,
        format!(
          "Temperature changed {delta:+.1}°C in {hours:.1}h ({rate:.1}°C/h) in {}",
          reading.city
        ),
      );
    }

    if let (Some(before), Some(after)) = (prior.pressure, reading.pressure) {
      let drop = before - after;
      if drop >= PRESSURE_DROP_LIMIT && hours <= PRESSURE_WINDOW_HOURS {
        raise(
          AlertKind::PressureDrop,
          Severity::Critical,
          format!(
            "Pressure dropped {drop:.1} hPa in {hours:.1}h in {} ({before:.0} → {after:.0} hPa)",
            reading.city
          ),
        );
      }
    }

    if let (Some(before), Some(after)) = (prior.clouds, reading.clouds) {
      let jump = after - before;
      if jump >= CLOUD_JUMP_LIMIT
        && after >= OVERCAST_LEVEL
        && hours <= CLOUD_WINDOW_HOURS
      {
        raise(
          AlertKind::SuddenClouds,
          Severity::Warning,
          format!(
            "Cloud cover jumped from {before:.0}% to {after:.0}% in {:.0} min in {}",
            hours * 60.0,
            reading.city
          ),
        );
      }
    }
  }

  if let Some(wind) = reading.wind_speed
    && wind >= HIGH_WIND_LIMIT
  {
    raise(
      AlertKind::HighWind,
      Severity::Warning,
      format!("High wind of {wind:.1} m/s in {}", reading.city),
    );
  }

  if let Some(rain) = reading.rain
    && rain >= HEAVY_RAIN_LIMIT
  {
    raise(
      AlertKind::HeavyRain,
      Severity::Warning,
      format!("Heavy rain of {rain:.1} mm/h in {}", reading.city),
    );
  }

  alerts
}

/// Hours from `prior` to `reading`, or `None` when the gap is not positive.
fn elapsed_hours(prior: &Reading, reading: &Reading) -> Option<f64> {
  let millis = (reading.timestamp - prior.timestamp).num_milliseconds();
  (millis > 0).then(|| millis as f64 / 3_600_000.0)
}
