//! The exact percentile reference used by both the ingest pipeline's batch
//! recomputation and the summary service: sort, then linear-interpolate
//! between the two nearest ranks.

/// Compute the `p`th percentile (0..=100) of `samples` by linear
/// interpolation on the sorted data.
///
/// Returns `None` for an empty input; the result is otherwise always one of
/// the input values or a value between two adjacent ones.
#[must_use]
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("latency samples must not be NaN"));

    let n = sorted.len();
    if n == 1 {
        return Some(sorted[0]);
    }

    let rank = (p / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}
