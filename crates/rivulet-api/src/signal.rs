//! Reference signal served on `/data`.
//!
//! A noisy circle: the radius wobbles around 3 and the angle follows wall
//! clock time, so consecutive samples trace a ring when plotted as x/y.

use chrono::Utc;
use uuid::Uuid;

pub const FIELDS: [&str; 2] = ["x", "y"];

/// One `[x, y]` sample at time `t` (seconds) with `noise` in `[0, 1)`
pub fn sample(t: f64, noise: f64) -> [f64; 2] {
    let v = (t * 5.0).sin() + 0.2 * noise + 3.0;
    [v * t.sin(), v * t.cos()]
}

/// Uniform value in `[0, 1)` taken from the random bits of a v4 uuid
pub fn noise() -> f64 {
    let (hi, _) = Uuid::new_v4().as_u64_pair();
    // bytes 0..6 are fully random; the version nibble sits in byte 6
    (hi >> 16) as f64 / (1u64 << 48) as f64
}

/// Current Unix timestamp in fractional seconds
pub fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
