//! Window alignment: mapping a measurement timestamp to its one-minute
//! aggregate bucket.

/// Width of an aggregate window, in milliseconds.
pub const WINDOW_WIDTH_MS: i64 = 60_000;

/// Align `ts_ms` down to its enclosing one-minute window start.
///
/// `window_start_ts = ts_ms - (ts_ms mod 60_000)`.
#[must_use]
pub const fn window_start_ts(ts_ms: i64) -> i64 {
    ts_ms - ts_ms.rem_euclid(WINDOW_WIDTH_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_to_minute_boundary() {
        assert_eq!(window_start_ts(1_703_297_100_000), 1_703_297_100_000);
        assert_eq!(window_start_ts(1_703_297_130_500), 1_703_297_100_000);
        assert_eq!(window_start_ts(1_703_297_159_999), 1_703_297_100_000);
        assert_eq!(window_start_ts(1_703_297_160_000), 1_703_297_160_000);
    }

    #[test]
    fn zero_is_its_own_window() {
        assert_eq!(window_start_ts(0), 0);
    }
}
