use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use timebucket_core::error::Result;
use timebucket_core::MetricKind;

use super::{mismatch, Metric, MetricRegistry};

/// DashMap-backed registry: `key -> Metric`.
#[derive(Default)]
pub struct InMemoryRegistry {
    metrics: DashMap<String, Metric>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self { metrics: DashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.metrics.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl MetricRegistry for InMemoryRegistry {
    fn register_or_get(&self, kind: MetricKind, key: &str) -> Result<Metric> {
        match self.metrics.entry(key.to_string()) {
            Entry::Occupied(o) => {
                let existing = o.get();
                if existing.kind() != kind {
                    return Err(mismatch(key, kind, existing));
                }
                Ok(existing.clone())
            }
            Entry::Vacant(v) => Ok(v.insert(Metric::new(kind)).value().clone()),
        }
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.metrics.remove(key).is_some())
    }

    fn get(&self, key: &str) -> Option<Metric> {
        self.metrics.get(key).map(|r| r.value().clone())
    }
}
