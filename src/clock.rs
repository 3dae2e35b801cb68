//! Monotonic time in fractional seconds, and the EWMA smoothing helper
//! used for both the input inter-frame interval and each client's.

use std::sync::OnceLock;
use std::time::Instant;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Seconds since the first call to any clock function in this process,
/// as an `f64`. Not wall-clock time — only differences are meaningful.
pub fn now_secs() -> f64 {
    epoch().elapsed().as_secs_f64()
}

/// `s <- old_weight * s + new_weight * delta`, the smoothing rule used
/// for the producer's input interval and for each client's own interval.
pub const EWMA_OLD_WEIGHT: f64 = 0.7;
pub const EWMA_NEW_WEIGHT: f64 = 0.3;

/// An exponentially-weighted moving average of a `f64`-valued sample
/// stream, seeded at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ewma {
    value: f64,
}

impl Ewma {
    pub fn new() -> Self {
        Self { value: 0.0 }
    }

    /// Folds `delta` into the average and returns the new value.
    pub fn update(&mut self, delta: f64) -> f64 {
        self.value = self.value * EWMA_OLD_WEIGHT + delta * EWMA_NEW_WEIGHT;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}
