use std::time::{SystemTime, UNIX_EPOCH};

/// Local wall clock in fractional milliseconds since the Unix epoch.
pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
        .unwrap_or_default()
}

/// Whole-millisecond wall clock, as stamped into `clientTimeMs`.
pub fn unix_ms() -> i64 {
    now_ms() as i64
}
