//! Source arbitration: which producer to trust for a city right now.
//!
//! The best source is the one with the highest mean completeness over the
//! trailing hour. Equal means are broken by [`Source::priority`], never by
//! map iteration order. Nothing is cached; every call re-reads the store.

use std::{cmp::Ordering, collections::HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::{quality::QualityMetric, source::Source, store::TelemetryStore};

/// How far back quality metrics are considered.
pub const ARBITRATION_WINDOW_SECS: i64 = 3600;

/// Means closer than this are equal; float noise must not outrank priority.
const TIE_TOLERANCE: f64 = 1e-9;

/// Pick the best source for `city` as of `now`. `None` when no metric falls
/// inside the window.
pub async fn select_best_source<S: TelemetryStore>(
  store: &S,
  city:  &str,
  now:   DateTime<Utc>,
) -> Result<Option<Source>, S::Error> {
  let since = now - Duration::seconds(ARBITRATION_WINDOW_SECS);
  let metrics = store.quality_since(city, since).await?;
  Ok(best_source(&metrics))
}

/// Mean completeness per source, then the maximum.
pub fn best_source(metrics: &[QualityMetric]) -> Option<Source> {
  let mut totals: HashMap<Source, (f64, usize)> = HashMap::new();
  for metric in metrics {
    let entry = totals.entry(metric.source).or_default();
    entry.0 += metric.completeness;
    entry.1 += 1;
  }

  totals
    .into_iter()
    .map(|(source, (sum, count))| (source, sum / count as f64))
    .max_by(|(a, a_mean), (b, b_mean)| {
      let by_mean = if (a_mean - b_mean).abs() < TIE_TOLERANCE {
        Ordering::Equal
      } else {
        a_mean.total_cmp(b_mean)
      };
      by_mean.then_with(|| b.priority().cmp(&a.priority()))
    })
    .map(|(source, _)| source)
}
