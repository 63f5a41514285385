//! Metric lifecycle repository.
//!
//! Owns the live `(id, bucket) -> metric` map, creates metrics on first use,
//! evicts buckets past their expiration, and periodically backs counters up.
//!
//! Lifecycle: `build()` -> `start()` (spawns the sweep and backup tasks) ->
//! `shutdown().await` (stops them, runs one final sweep then one final
//! backup). The host registers `shutdown` with its own termination sequence.

mod builder;
mod entries;
mod tasks;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use timebucket_core::error::{Result, TimebucketError};
use timebucket_core::{Clock, MetricKind, TemporalMetricId};

use crate::backup::CounterBackup;
use crate::registry::{Counter, Histogram, Meter, Metric, MetricRegistry, Timer};

pub use builder::MetricRepositoryBuilder;
pub use entries::{EntryKey, EntryKeyView, MetricEntries, MetricEntry};

/// Intervals and limits for the background tasks.
#[derive(Debug, Clone)]
pub struct RepositorySettings {
    pub cleanup_interval: Duration,
    pub backup_interval: Duration,
    pub retention_days: u32,
    pub shutdown_timeout: Duration,
    pub locale: String,
}

/// Handle to the repository. Cheap to clone; clones share state and lifecycle.
#[derive(Clone)]
pub struct MetricRepository {
    inner: Arc<RepositoryInner>,
    lifecycle: Arc<Lifecycle>,
}

pub(crate) struct RepositoryInner {
    registry: Arc<dyn MetricRegistry>,
    backup: Arc<dyn CounterBackup>,
    entries: MetricEntries,
    clock: Arc<dyn Clock>,
    settings: RepositorySettings,
}

struct Lifecycle {
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    shut_down: AtomicBool,
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl MetricRepository {
    pub fn builder(registry: Arc<dyn MetricRegistry>) -> MetricRepositoryBuilder {
        MetricRepositoryBuilder::new(registry)
    }

    pub(crate) fn from_parts(
        registry: Arc<dyn MetricRegistry>,
        backup: Arc<dyn CounterBackup>,
        clock: Arc<dyn Clock>,
        settings: RepositorySettings,
    ) -> Self {
        Self {
            inner: Arc::new(RepositoryInner {
                registry,
                backup,
                entries: MetricEntries::new(),
                clock,
                settings,
            }),
            lifecycle: Arc::new(Lifecycle {
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the sweep and backup tasks on the current tokio runtime.
    ///
    /// Calling it again is a no-op. Fails when called outside a runtime or
    /// after shutdown.
    pub fn start(&self) -> Result<()> {
        if self.lifecycle.shut_down.load(Ordering::SeqCst) {
            return Err(TimebucketError::Configuration("repository already shut down".into()));
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            TimebucketError::Configuration(format!("start requires a tokio runtime: {e}"))
        })?;
        if self.lifecycle.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let s = &self.inner.settings;
        let sweep = tasks::spawn_periodic(
            &handle,
            "sweep",
            s.cleanup_interval,
            self.lifecycle.cancel.clone(),
            Arc::clone(&self.inner),
            |inner| {
                inner.sweep();
            },
        );
        let backup = tasks::spawn_periodic(
            &handle,
            "backup",
            s.backup_interval,
            self.lifecycle.cancel.clone(),
            Arc::clone(&self.inner),
            |inner| {
                inner.backup_counters();
            },
        );
        lock_tasks(&self.lifecycle.tasks).extend([sweep, backup]);

        tracing::info!(
            cleanup_interval_ms = s.cleanup_interval.as_millis() as u64,
            backup_interval_ms = s.backup_interval.as_millis() as u64,
            "metric repository started"
        );
        Ok(())
    }

    /// Stop background work, then run one final sweep and one final backup.
    ///
    /// Only the first call does anything; the whole sequence is bounded by
    /// the configured shutdown timeout.
    pub async fn shutdown(&self) {
        if self.lifecycle.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("metric repository shutting down");
        self.lifecycle.cancel.cancel();

        let handles = std::mem::take(&mut *lock_tasks(&self.lifecycle.tasks));
        let inner = Arc::clone(&self.inner);
        let sequence = async move {
            for h in handles {
                if let Err(e) = h.await {
                    tracing::warn!(error=%e, "maintenance task ended abnormally");
                }
            }
            tokio::task::spawn_blocking(move || {
                inner.sweep();
                inner.backup_counters();
            })
            .await
        };

        match tokio::time::timeout(self.inner.settings.shutdown_timeout, sequence).await {
            Ok(Ok(())) => tracing::info!("metric repository stopped"),
            Ok(Err(e)) => tracing::warn!(error=%e, "final sweep/backup failed"),
            Err(_) => tracing::warn!(
                timeout_ms = self.inner.settings.shutdown_timeout.as_millis() as u64,
                "final sweep/backup timed out"
            ),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.started.load(Ordering::SeqCst) && !self.lifecycle.shut_down.load(Ordering::SeqCst)
    }

    /// Metric for `id` in the current bucket, registering it on first use.
    ///
    /// Registry errors propagate; a returned handle is always usable.
    pub fn get_metric(&self, id: &TemporalMetricId) -> Result<Metric> {
        self.inner.get_metric(id).map(|e| e.metric().clone())
    }

    /// Like [`get_metric`](Self::get_metric) but returns the whole entry.
    pub fn get_entry(&self, id: &TemporalMetricId) -> Result<Arc<MetricEntry>> {
        self.inner.get_metric(id)
    }

    pub fn counter(&self, id: &TemporalMetricId) -> Result<Arc<Counter>> {
        let m = self.typed(id, MetricKind::Counter)?;
        m.as_counter().cloned().ok_or_else(|| kind_mismatch(id, MetricKind::Counter, &m))
    }

    pub fn meter(&self, id: &TemporalMetricId) -> Result<Arc<Meter>> {
        let m = self.typed(id, MetricKind::Meter)?;
        m.as_meter().cloned().ok_or_else(|| kind_mismatch(id, MetricKind::Meter, &m))
    }

    pub fn timer(&self, id: &TemporalMetricId) -> Result<Arc<Timer>> {
        let m = self.typed(id, MetricKind::Timer)?;
        m.as_timer().cloned().ok_or_else(|| kind_mismatch(id, MetricKind::Timer, &m))
    }

    pub fn histogram(&self, id: &TemporalMetricId) -> Result<Arc<Histogram>> {
        let m = self.typed(id, MetricKind::Histogram)?;
        m.as_histogram().cloned().ok_or_else(|| kind_mismatch(id, MetricKind::Histogram, &m))
    }

    pub fn daily_counter(&self, owner_scope: &str, name: &str) -> Result<Arc<Counter>> {
        self.counter(&daily_id(MetricKind::Counter, owner_scope, name)?)
    }

    pub fn daily_meter(&self, owner_scope: &str, name: &str) -> Result<Arc<Meter>> {
        self.meter(&daily_id(MetricKind::Meter, owner_scope, name)?)
    }

    pub fn daily_timer(&self, owner_scope: &str, name: &str) -> Result<Arc<Timer>> {
        self.timer(&daily_id(MetricKind::Timer, owner_scope, name)?)
    }

    pub fn daily_histogram(&self, owner_scope: &str, name: &str) -> Result<Arc<Histogram>> {
        self.histogram(&daily_id(MetricKind::Histogram, owner_scope, name)?)
    }

    /// Snapshot of live entries.
    pub fn list_entries(&self) -> Vec<Arc<MetricEntry>> {
        self.inner.entries.snapshot()
    }

    /// Deregister `entry` from the map and the registry. Removing an entry that
    /// is already gone is a no-op and returns `Ok(false)`.
    pub fn remove(&self, entry: &Arc<MetricEntry>) -> Result<bool> {
        self.inner.remove(entry)
    }

    /// Evict expired entries, then prune old backup files. Returns the number evicted.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Persist every live counter. Returns the number persisted.
    pub fn backup_counters(&self) -> usize {
        self.inner.backup_counters()
    }

    pub fn registry(&self) -> &Arc<dyn MetricRegistry> {
        &self.inner.registry
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.inner.settings
    }

    /// Locale handed through to formatting collaborators.
    pub fn locale(&self) -> &str {
        &self.inner.settings.locale
    }

    fn typed(&self, id: &TemporalMetricId, expected: MetricKind) -> Result<Metric> {
        if id.kind() != expected {
            return Err(TimebucketError::KindMismatch {
                key: id.name().to_string(),
                expected,
                actual: id.kind(),
            });
        }
        self.get_metric(id)
    }
}

impl RepositoryInner {
    fn get_metric(&self, id: &TemporalMetricId) -> Result<Arc<MetricEntry>> {
        let bucket = id.truncate(self.clock.now_millis());
        if let Some(entry) = self.entries.get(id, bucket) {
            return Ok(entry);
        }

        let key = EntryKey { id: id.clone(), bucket };
        self.entries.get_or_try_insert(key, |id, bucket| {
            let registry_key = id.registry_key(bucket);
            let metric = self.registry.register_or_get(id.kind(), &registry_key)?;
            if let Metric::Counter(c) = &metric {
                self.restore(&registry_key, c);
            }
            tracing::debug!(key=%registry_key, kind=%id.kind(), "registered metric");
            Ok((registry_key, metric))
        })
    }

    fn restore(&self, registry_key: &str, counter: &Counter) {
        if counter.count() != 0 {
            return;
        }
        let saved = self.backup.get(registry_key);
        if saved != 0 {
            counter.add(saved);
            tracing::debug!(key=%registry_key, value=saved, "restored counter from backup");
        }
    }

    fn remove(&self, entry: &Arc<MetricEntry>) -> Result<bool> {
        self.entries.remove_with(entry, |e| self.deregister(e))
    }

    fn deregister(&self, entry: &MetricEntry) -> Result<()> {
        self.registry.remove(entry.registry_key())?;
        Ok(())
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut evicted = 0;

        for entry in self.entries.snapshot() {
            if !entry.is_expired(now) {
                continue;
            }
            let removed = self
                .entries
                .remove_if(&entry, |e| e.is_expired(now), |e| self.deregister(e));
            match removed {
                Ok(true) => {
                    evicted += 1;
                    tracing::debug!(
                        key=%entry.registry_key(),
                        age_ms = entry.age_millis(now),
                        "evicted expired metric"
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(key=%entry.registry_key(), error=%e, "error while purging metric")
                }
            }
        }

        self.backup.cleanup(self.settings.retention_days);
        evicted
    }

    fn backup_counters(&self) -> usize {
        let mut persisted = 0;

        for entry in self.entries.snapshot() {
            if !entry.id().kind().is_countable() {
                continue;
            }
            let key = entry.registry_key();
            match self.registry.counter_value(key) {
                Ok(Some(value)) => {
                    self.backup.persist(key, value);
                    persisted += 1;
                }
                Ok(None) => tracing::debug!(key=%key, "counter no longer registered, skipping backup"),
                Err(e) => tracing::warn!(key=%key, error=%e, "error while reading counter for backup"),
            }
        }

        persisted
    }
}

fn lock_tasks(tasks: &Mutex<Vec<JoinHandle<()>>>) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
    tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn daily_id(kind: MetricKind, owner_scope: &str, name: &str) -> Result<TemporalMetricId> {
    TemporalMetricId::daily(kind).owner_scope(owner_scope).name(name).build()
}

fn kind_mismatch(id: &TemporalMetricId, expected: MetricKind, actual: &Metric) -> TimebucketError {
    TimebucketError::KindMismatch {
        key: id.name().to_string(),
        expected,
        actual: actual.kind(),
    }
}
