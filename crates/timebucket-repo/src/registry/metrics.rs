//! Metric primitives handed out by [`InMemoryRegistry`](super::InMemoryRegistry).
//!
//! Lock-free atomics only. Timer buckets are fixed in microseconds to avoid
//! floating point math on the record path.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic-ish signed counter; the only kind that gets backed up.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Increment by 1.
    pub fn inc(&self) {
        self.add(1);
    }

    /// Decrement by 1.
    pub fn dec(&self) {
        self.add(-1);
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, v: i64) {
        self.count.fetch_add(v, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Event counter with a mean rate since creation.
#[derive(Debug)]
pub struct Meter {
    count: AtomicU64,
    started: Instant,
}

impl Default for Meter {
    fn default() -> Self {
        Self { count: AtomicU64::new(0), started: Instant::now() }
    }
}

impl Meter {
    pub fn mark(&self) {
        self.mark_n(1);
    }

    pub fn mark_n(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Events per second since the meter was created.
    pub fn mean_rate(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.count() as f64 / elapsed
    }
}

// 100us, 500us, 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s
pub const TIMER_BUCKETS_MICROS: [u64; 9] =
    [100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000];

/// Duration recorder with cumulative microsecond buckets.
#[derive(Debug, Default)]
pub struct Timer {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: [AtomicU64; 9],
}

impl Timer {
    /// Record one duration and increment every bucket it fits in.
    pub fn update(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        for (i, &b) in TIMER_BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Start timing; the elapsed time is recorded when the guard drops.
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext { timer: self, started: Instant::now() }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> Duration {
        Duration::from_micros(self.sum_micros.load(Ordering::Relaxed))
    }

    /// `(upper bound in micros, cumulative count)` per bucket.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        TIMER_BUCKETS_MICROS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&le, c)| (le, c.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Guard returned by [`Timer::time`].
pub struct TimerContext<'a> {
    timer: &'a Timer,
    started: Instant,
}

impl TimerContext<'_> {
    /// Stop explicitly, record, and return the recorded duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.started.elapsed();
        self.timer.update(elapsed);
        std::mem::forget(self);
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        self.timer.update(self.started.elapsed());
    }
}

/// Value distribution summary (count, sum, min, max).
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    sum: AtomicI64,
    min: AtomicI64,
    max: AtomicI64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicI64::new(0),
            min: AtomicI64::new(i64::MAX),
            max: AtomicI64::new(i64::MIN),
        }
    }
}

impl Histogram {
    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.min.fetch_min(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> i64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// `None` until the first update.
    pub fn min(&self) -> Option<i64> {
        (self.count() > 0).then(|| self.min.load(Ordering::Relaxed))
    }

    pub fn max(&self) -> Option<i64> {
        (self.count() > 0).then(|| self.max.load(Ordering::Relaxed))
    }

    pub fn mean(&self) -> Option<f64> {
        let n = self.count();
        (n > 0).then(|| self.sum() as f64 / n as f64)
    }
}
