//! Percentile boundaries and bucketing.

/// Percentile `p` (0..=100) of ascending `sorted`, using the `p·(n+1)/100`
/// position estimator with linear interpolation, clamped to the extremes.
pub(crate) fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
  let n = sorted.len();
  let (first, last) = (*sorted.first()?, *sorted.last()?);
  let pos = p * (n as f64 + 1.0) / 100.0;
  if pos < 1.0 {
    return Some(first);
  }
  if pos >= n as f64 {
    return Some(last);
  }
  let lower = pos.floor();
  let frac = pos - lower;
  let i = lower as usize;
  Some(sorted[i - 1] + frac * (sorted[i] - sorted[i - 1]))
}

/// The `count` upper boundaries at `100·i/count`, `i = 1..=count`.
pub(crate) fn boundaries(sorted: &[f64], count: usize) -> Vec<f64> {
  (1..=count)
    .filter_map(|i| percentile(sorted, 100.0 * i as f64 / count as f64))
    .collect()
}

/// 1-based index of the first boundary not below `value`; values above every
/// boundary land in the top bucket. `inverse` flips the scale.
pub(crate) fn bucket(boundaries: &[f64], value: f64, inverse: bool) -> usize {
  let count = boundaries.len();
  let bucket = boundaries.iter().position(|b| value <= *b).map_or(count, |i| i + 1);
  if inverse { count + 1 - bucket } else { bucket }
}
