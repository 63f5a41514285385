use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use timebucket_core::error::Result;
use timebucket_core::TemporalMetricId;

use crate::registry::Metric;

/// Map key: an id pinned to one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub id: TemporalMetricId,
    pub bucket: i64,
}

/// `(id, bucket)` as seen by the map, owned or borrowed.
///
/// Lets lookups hash a borrowed `(&TemporalMetricId, i64)` without building
/// an owned [`EntryKey`].
pub trait EntryKeyView {
    fn id(&self) -> &TemporalMetricId;
    fn bucket(&self) -> i64;
}

impl EntryKeyView for EntryKey {
    fn id(&self) -> &TemporalMetricId {
        &self.id
    }

    fn bucket(&self) -> i64 {
        self.bucket
    }
}

impl EntryKeyView for (&TemporalMetricId, i64) {
    fn id(&self) -> &TemporalMetricId {
        self.0
    }

    fn bucket(&self) -> i64 {
        self.1
    }
}

// Owned and borrowed keys must hash identically; both go through here.
impl Hash for dyn EntryKeyView + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
        self.bucket().hash(state);
    }
}

impl PartialEq for dyn EntryKeyView + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.bucket() == other.bucket() && self.id() == other.id()
    }
}

impl Eq for dyn EntryKeyView + '_ {}

impl Hash for EntryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as &dyn EntryKeyView).hash(state)
    }
}

impl<'a> Borrow<dyn EntryKeyView + 'a> for EntryKey {
    fn borrow(&self) -> &(dyn EntryKeyView + 'a) {
        self
    }
}

/// One live registration: id at a bucket, its registry key and handle.
#[derive(Debug)]
pub struct MetricEntry {
    id: TemporalMetricId,
    reference_timestamp: i64,
    registry_key: String,
    metric: Metric,
}

impl MetricEntry {
    pub fn id(&self) -> &TemporalMetricId {
        &self.id
    }

    /// Start of the bucket this entry was created for.
    pub fn reference_timestamp(&self) -> i64 {
        self.reference_timestamp
    }

    /// Key the metric is registered under; also the backup name for counters.
    pub fn registry_key(&self) -> &str {
        &self.registry_key
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    /// Milliseconds since the bucket started.
    pub fn age_millis(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.reference_timestamp)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        let expiration = self.id.expiration().as_millis().min(i64::MAX as u128) as i64;
        self.age_millis(now_ms) > expiration
    }

    fn key(&self) -> EntryKey {
        EntryKey { id: self.id.clone(), bucket: self.reference_timestamp }
    }
}

/// Live entries: `(id, bucket) -> MetricEntry`.
///
/// Reads of an existing entry only take a shard read lock. Creation and
/// removal go through the shard write lock, so a key has at most one winner
/// and a removal never interleaves with a creation of the same key.
#[derive(Default)]
pub struct MetricEntries {
    map: DashMap<EntryKey, Arc<MetricEntry>>,
}

impl MetricEntries {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }

    /// Look up `(id, bucket)` without cloning the id.
    pub fn get(&self, id: &TemporalMetricId, bucket: i64) -> Option<Arc<MetricEntry>> {
        let key = (id, bucket);
        self.map
            .get(&key as &dyn EntryKeyView)
            .map(|r| Arc::clone(r.value()))
    }

    /// Return the entry for `key`, registering it via `register` if absent.
    ///
    /// `register` runs under the shard lock and only for the winning caller;
    /// its error leaves the map untouched.
    pub fn get_or_try_insert<F>(&self, key: EntryKey, register: F) -> Result<Arc<MetricEntry>>
    where
        F: FnOnce(&TemporalMetricId, i64) -> Result<(String, Metric)>,
    {
        match self.map.entry(key) {
            Entry::Occupied(o) => Ok(Arc::clone(o.get())),
            Entry::Vacant(v) => {
                let (registry_key, metric) = register(&v.key().id, v.key().bucket)?;
                let entry = Arc::new(MetricEntry {
                    id: v.key().id.clone(),
                    reference_timestamp: v.key().bucket,
                    registry_key,
                    metric,
                });
                v.insert(Arc::clone(&entry));
                Ok(entry)
            }
        }
    }

    /// Point-in-time copy of all entries; holds each shard only briefly.
    pub fn snapshot(&self) -> Vec<Arc<MetricEntry>> {
        self.map.iter().map(|r| Arc::clone(r.value())).collect()
    }

    /// Remove exactly this entry instance.
    ///
    /// `deregister` runs under the shard lock before the map removal; if it
    /// fails the entry stays. Returns `Ok(false)` when the entry is already gone.
    pub fn remove_with<F>(&self, entry: &Arc<MetricEntry>, deregister: F) -> Result<bool>
    where
        F: FnOnce(&MetricEntry) -> Result<()>,
    {
        self.remove_if(entry, |_| true, deregister)
    }

    /// Like [`remove_with`](Self::remove_with), but only when `condition`
    /// still holds once the shard lock is taken.
    pub fn remove_if<P, F>(&self, entry: &Arc<MetricEntry>, condition: P, deregister: F) -> Result<bool>
    where
        P: FnOnce(&MetricEntry) -> bool,
        F: FnOnce(&MetricEntry) -> Result<()>,
    {
        match self.map.entry(entry.key()) {
            Entry::Occupied(o) if Arc::ptr_eq(o.get(), entry) => {
                if !condition(o.get()) {
                    return Ok(false);
                }
                deregister(o.get())?;
                o.remove();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
