//! External metric registry seam.
//!
//! The repository never implements metrics itself; it asks a [`MetricRegistry`]
//! to register or look up a metric under an opaque string key. Any backend
//! can sit behind the trait; [`InMemoryRegistry`] is the bundled one.

mod memory;
pub mod metrics;

use std::sync::Arc;

use timebucket_core::error::{Result, TimebucketError};
use timebucket_core::MetricKind;

pub use memory::InMemoryRegistry;
pub use metrics::{Counter, Histogram, Meter, Timer, TimerContext};

/// Live handle to a registered metric.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
    Histogram(Arc<Histogram>),
}

impl Metric {
    /// Fresh, zeroed metric of the given kind.
    pub fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Metric::Counter(Arc::default()),
            MetricKind::Meter => Metric::Meter(Arc::default()),
            MetricKind::Timer => Metric::Timer(Arc::default()),
            MetricKind::Histogram => Metric::Histogram(Arc::default()),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Meter(_) => MetricKind::Meter,
            Metric::Timer(_) => MetricKind::Timer,
            Metric::Histogram(_) => MetricKind::Histogram,
        }
    }

    pub fn as_counter(&self) -> Option<&Arc<Counter>> {
        match self {
            Metric::Counter(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_meter(&self) -> Option<&Arc<Meter>> {
        match self {
            Metric::Meter(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_timer(&self) -> Option<&Arc<Timer>> {
        match self {
            Metric::Timer(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&Arc<Histogram>> {
        match self {
            Metric::Histogram(h) => Some(h),
            _ => None,
        }
    }

    /// True when both handles point at the same registered metric.
    pub fn same_as(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Counter(a), Metric::Counter(b)) => Arc::ptr_eq(a, b),
            (Metric::Meter(a), Metric::Meter(b)) => Arc::ptr_eq(a, b),
            (Metric::Timer(a), Metric::Timer(b)) => Arc::ptr_eq(a, b),
            (Metric::Histogram(a), Metric::Histogram(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Registry the repository delegates metric storage to.
///
/// Implementations must be thread-safe; `register_or_get` must return the
/// already registered metric when the key exists with the same kind.
pub trait MetricRegistry: Send + Sync {
    /// Register a metric of `kind` under `key`, or return the existing one.
    fn register_or_get(&self, kind: MetricKind, key: &str) -> Result<Metric>;

    /// Deregister `key`. Returns whether something was removed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Look up an existing metric without registering it.
    fn get(&self, key: &str) -> Option<Metric>;

    fn register_or_get_counter(&self, key: &str) -> Result<Arc<Counter>> {
        let m = self.register_or_get(MetricKind::Counter, key)?;
        m.as_counter().cloned().ok_or_else(|| mismatch(key, MetricKind::Counter, &m))
    }

    fn register_or_get_meter(&self, key: &str) -> Result<Arc<Meter>> {
        let m = self.register_or_get(MetricKind::Meter, key)?;
        m.as_meter().cloned().ok_or_else(|| mismatch(key, MetricKind::Meter, &m))
    }

    fn register_or_get_timer(&self, key: &str) -> Result<Arc<Timer>> {
        let m = self.register_or_get(MetricKind::Timer, key)?;
        m.as_timer().cloned().ok_or_else(|| mismatch(key, MetricKind::Timer, &m))
    }

    fn register_or_get_histogram(&self, key: &str) -> Result<Arc<Histogram>> {
        let m = self.register_or_get(MetricKind::Histogram, key)?;
        m.as_histogram().cloned().ok_or_else(|| mismatch(key, MetricKind::Histogram, &m))
    }

    /// Current integral value of the counter under `key`, if registered.
    fn counter_value(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Metric::Counter(c)) => Ok(Some(c.count())),
            Some(other) => Err(mismatch(key, MetricKind::Counter, &other)),
        }
    }
}

pub(crate) fn mismatch(key: &str, expected: MetricKind, actual: &Metric) -> TimebucketError {
    TimebucketError::KindMismatch {
        key: key.to_string(),
        expected,
        actual: actual.kind(),
    }
}
