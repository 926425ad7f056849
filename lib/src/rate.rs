//! Aggregate throughput accounting for a whole run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cumulative byte counter with a fixed start time.
///
/// Clones share the same counter, so every room and every file of one
/// invocation accumulate into a single figure.
#[derive(Debug, Clone)]
pub struct RateCounter {
    start: Instant,
    bytes: Arc<AtomicU64>,
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateCounter {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Adds transferred bytes.
    pub fn add(&self, delta: u64) {
        self.bytes.fetch_add(delta, Ordering::Relaxed);
    }

    /// Total bytes transferred so far.
    pub fn total(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Bytes per second since the counter was created.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.total() as f64 / secs
    }
}
