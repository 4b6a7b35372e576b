//! Mood score: a 0–100 "how nice is it outside" number.
//!
//! Only the canonical rule ships. It sits behind [`MoodScorer`] so an
//! alternative heuristic can be swapped in without touching the pipeline.

/// Score returned when the inputs cannot produce a meaningful value.
pub const NEUTRAL_MOOD: f64 = 50.0;

/// Temperature (°C) at which clear skies score a full 100.
const IDEAL_TEMPERATURE: f64 = 30.0;

pub trait MoodScorer: Send + Sync {
  /// Score a validated temperature (°C) and cloud cover (%).
  fn score(&self, temperature: f64, cloud_cover: Option<f64>) -> f64;
}

/// `clamp(0, 100, round((100 − clouds) × (temp / 30), 1))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalMoodScorer;

impl MoodScorer for CanonicalMoodScorer {
  fn score(&self, temperature: f64, cloud_cover: Option<f64>) -> f64 {
    let Some(clouds) = cloud_cover else {
      return NEUTRAL_MOOD;
    };
    let raw = (100.0 - clouds) * (temperature / IDEAL_TEMPERATURE);
    if !raw.is_finite() {
      return NEUTRAL_MOOD;
    }
    round_tenth(raw).clamp(0.0, 100.0)
  }
}

/// Round half away from zero to one decimal place.
pub fn round_tenth(value: f64) -> f64 { (value * 10.0).round() / 10.0 }

#[cfg(test)]
mod tests {
  use super::*;

  fn score(temp: f64, clouds: Option<f64>) -> f64 {
    CanonicalMoodScorer.score(temp, clouds)
  }

  #[test]
  fn mild_partly_cloudy_day() {
    // (100 - 40) * (20 / 30) = 40
    assert_eq!(score(20.0, Some(40.0)), 40.0);
  }

  #[test]
  fn rounds_to_one_decimal() {
    // (100 - 33) * (17 / 30) = 37.966..
    assert_eq!(score(17.0, Some(33.0)), 38.0);
    // (100 - 10) * (11 / 30) = 33.0
    assert_eq!(score(11.0, Some(10.0)), 33.0);
    // (100 - 5) * (7 / 30) = 22.166..
    assert_eq!(score(7.0, Some(5.0)), 22.2);
  }

  #[test]
  fn clamps_to_range() {
    assert_eq!(score(45.0, Some(0.0)), 100.0);
    assert_eq!(score(-10.0, Some(20.0)), 0.0);
    assert_eq!(score(0.0, Some(100.0)), 0.0);
  }

  #[test]
  fn missing_clouds_is_neutral() {
    assert_eq!(score(25.0, None), NEUTRAL_MOOD);
  }

  #[test]
  fn non_finite_input_is_neutral() {
    assert_eq!(score(f64::NAN, Some(10.0)), NEUTRAL_MOOD);
    assert_eq!(score(20.0, Some(f64::INFINITY)), NEUTRAL_MOOD);
  }

  #[test]
  fn always_within_bounds() {
    for temp in (-50..=50).step_by(5) {
      for clouds in (0..=100).step_by(10) {
        let s = score(temp as f64, Some(clouds as f64));
        assert!((0.0..=100.0).contains(&s), "temp={temp} clouds={clouds} -> {s}");
      }
    }
  }
}
