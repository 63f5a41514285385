//! Repository semantics driven by a manual clock.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use timebucket_core::{ManualClock, MetricKind, TemporalMetricId};
use timebucket_repo::backup::{CounterBackup, FileCounterBackup};
use timebucket_repo::{InMemoryRegistry, MetricRegistry, MetricRepository};

use registry_double::RegistryDouble;

// 2023-11-14T22:15:00Z, a minute boundary.
const T0: i64 = 1_700_000_100_000;
const MINUTE_MS: i64 = 60_000;

fn minutely(kind: MetricKind, name: &str) -> TemporalMetricId {
    TemporalMetricId::minutely(kind)
        .owner_scope("shop")
        .name(name)
        .expiration(Duration::from_secs(60))
        .build()
        .unwrap()
}

fn repo_with(registry: Arc<dyn MetricRegistry>, clock: Arc<ManualClock>) -> MetricRepository {
    MetricRepository::builder(registry).with_clock(clock).build().unwrap()
}

#[test]
fn same_bucket_returns_same_metric() {
    let clock = Arc::new(ManualClock::new(T0 + 1_234));
    let registry = Arc::new(RegistryDouble::new());
    let repo = repo_with(registry.clone(), clock.clone());
    let id = minutely(MetricKind::Counter, "orders");

    let a = repo.get_metric(&id).unwrap();
    clock.advance(30_000);
    let b = repo.get_metric(&id).unwrap();

    assert!(a.same_as(&b));
    assert_eq!(registry.registrations(), 1);

    let entries = repo.list_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reference_timestamp(), T0);
    assert_eq!(entries[0].registry_key(), format!("shop.orders.counter.minutely.{T0}"));
}

#[test]
fn new_bucket_creates_new_entry() {
    let clock = Arc::new(ManualClock::new(T0));
    let registry = Arc::new(InMemoryRegistry::new());
    let repo = repo_with(registry.clone(), clock.clone());
    let id = minutely(MetricKind::Counter, "orders");

    let first = repo.counter(&id).unwrap();
    first.add(5);
    clock.advance(MINUTE_MS);
    let second = repo.counter(&id).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.count(), 0);
    assert_eq!(repo.list_entries().len(), 2);
    assert_eq!(registry.len(), 2);
}

#[test]
fn concurrent_requests_have_one_winner() {
    let clock = Arc::new(ManualClock::new(T0 + 10));
    let registry = Arc::new(RegistryDouble::new());
    let repo = repo_with(registry.clone(), clock);
    let id = minutely(MetricKind::Meter, "hits");

    const N: usize = 16;
    let barrier = Barrier::new(N);
    let handles: Vec<_> = std::thread::scope(|s| {
        let spawned: Vec<_> = (0..N)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    repo.get_metric(&id).unwrap()
                })
            })
            .collect();
        spawned.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for h in &handles {
        assert!(h.same_as(&handles[0]));
    }
    assert_eq!(registry.registrations(), 1);
    assert_eq!(repo.list_entries().len(), 1);
}

#[test]
fn sweep_evicts_only_entries_past_expiration() {
    let clock = Arc::new(ManualClock::new(T0));
    let registry = Arc::new(InMemoryRegistry::new());
    let repo = repo_with(registry.clone(), clock.clone());

    let old = minutely(MetricKind::Counter, "old");
    let young = minutely(MetricKind::Counter, "young");

    repo.get_metric(&old).unwrap();
    clock.set(T0 + MINUTE_MS);
    repo.get_metric(&young).unwrap();

    // old is exactly at its expiration, young was just created
    assert_eq!(repo.sweep(), 0);
    assert_eq!(repo.list_entries().len(), 2);

    clock.advance(1);
    assert_eq!(repo.sweep(), 1);

    let left = repo.list_entries();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id().name(), "young");
    assert_eq!(registry.keys(), vec![format!("shop.young.counter.minutely.{}", T0 + MINUTE_MS)]);
}

#[test]
fn sweep_racing_with_lookups_never_evicts_the_live_bucket() {
    let clock = Arc::new(ManualClock::new(T0));
    let registry = Arc::new(InMemoryRegistry::new());
    let repo = repo_with(registry.clone(), clock.clone());

    const OLD: usize = 8;
    const LIVE: usize = 4;
    const WORKERS: usize = 8;
    const ROUNDS: usize = 200;

    for i in 0..OLD {
        repo.get_metric(&minutely(MetricKind::Counter, &format!("old-{i}"))).unwrap();
    }
    clock.set(T0 + MINUTE_MS + 1);
    let live_bucket = T0 + MINUTE_MS;
    let live: Vec<_> = (0..LIVE).map(|i| minutely(MetricKind::Counter, &format!("live-{i}"))).collect();

    let done = AtomicBool::new(false);
    let barrier = Barrier::new(WORKERS + 1);
    let (evicted, handles) = std::thread::scope(|s| {
        let sweeper = s.spawn(|| {
            barrier.wait();
            let mut evicted = 0;
            while !done.load(Ordering::Acquire) {
                evicted += repo.sweep();
            }
            evicted + repo.sweep()
        });
        let workers: Vec<_> = (0..WORKERS)
            .map(|w| {
                let (repo, live, barrier) = (&repo, &live, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    (0..ROUNDS)
                        .map(|r| {
                            let id = &live[(w + r) % LIVE];
                            (id.registry_key(live_bucket), repo.get_metric(id).unwrap())
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let handles: Vec<_> = workers.into_iter().flat_map(|h| h.join().unwrap()).collect();
        done.store(true, Ordering::Release);
        (sweeper.join().unwrap(), handles)
    });

    assert_eq!(evicted, OLD);
    let left = repo.list_entries();
    assert_eq!(left.len(), LIVE);
    assert!(left.iter().all(|e| e.id().name().starts_with("live-")));
    assert_eq!(registry.len(), LIVE);

    for (key, handle) in &handles {
        let registered = registry.get(key).unwrap();
        assert!(registered.same_as(handle), "handle for {key} is no longer registered");
    }
}

#[test]
fn sweep_keeps_going_when_a_removal_fails() {
    let clock = Arc::new(ManualClock::new(T0));
    let registry = Arc::new(RegistryDouble::new());
    let repo = repo_with(registry.clone(), clock.clone());

    repo.get_metric(&minutely(MetricKind::Counter, "a")).unwrap();
    repo.get_metric(&minutely(MetricKind::Timer, "b")).unwrap();
    clock.advance(10 * MINUTE_MS);

    registry.fail_remove.store(true, Ordering::SeqCst);
    assert_eq!(repo.sweep(), 0);
    assert_eq!(repo.list_entries().len(), 2);

    registry.fail_remove.store(false, Ordering::SeqCst);
    assert_eq!(repo.sweep(), 2);
    assert!(repo.list_entries().is_empty());
    assert!(registry.inner.is_empty());
}

#[test]
fn remove_is_idempotent() {
    let clock = Arc::new(ManualClock::new(T0));
    let registry = Arc::new(InMemoryRegistry::new());
    let repo = repo_with(registry.clone(), clock);

    let entry = repo.get_entry(&minutely(MetricKind::Histogram, "sizes")).unwrap();
    assert!(repo.remove(&entry).unwrap());
    assert!(!repo.remove(&entry).unwrap());
    assert!(repo.list_entries().is_empty());
    assert!(registry.is_empty());
}

#[test]
fn stale_entry_handle_does_not_remove_its_replacement() {
    let clock = Arc::new(ManualClock::new(T0));
    let registry = Arc::new(InMemoryRegistry::new());
    let repo = repo_with(registry, clock);
    let id = minutely(MetricKind::Counter, "orders");

    let stale = repo.get_entry(&id).unwrap();
    repo.remove(&stale).unwrap();
    let fresh = repo.get_entry(&id).unwrap();

    assert!(!repo.remove(&stale).unwrap());
    assert_eq!(repo.list_entries().len(), 1);
    assert!(repo.remove(&fresh).unwrap());
}

#[test]
fn registry_errors_propagate_to_caller() {
    let clock = Arc::new(ManualClock::new(T0));
    let registry = Arc::new(RegistryDouble::new());
    registry.fail_register.store(true, Ordering::SeqCst);
    let repo = repo_with(registry.clone(), clock);

    let err = repo.get_metric(&minutely(MetricKind::Counter, "orders")).expect_err("must fail");
    assert_eq!(err.class().as_str(), "REGISTRY");
    assert!(repo.list_entries().is_empty());

    registry.fail_register.store(false, Ordering::SeqCst);
    assert!(repo.get_metric(&minutely(MetricKind::Counter, "orders")).is_ok());
}

#[test]
fn typed_accessor_rejects_wrong_kind() {
    let repo = repo_with(Arc::new(InMemoryRegistry::new()), Arc::new(ManualClock::new(T0)));
    let err = repo.counter(&minutely(MetricKind::Meter, "hits")).expect_err("must fail");
    assert_eq!(err.class().as_str(), "REGISTRY");
    assert!(repo.list_entries().is_empty());
}

#[test]
fn key_collision_with_other_kind_is_registry_error() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register_or_get_meter(&format!("shop.orders.counter.minutely.{T0}")).unwrap();
    let repo = repo_with(registry, Arc::new(ManualClock::new(T0)));

    let err = repo.get_metric(&minutely(MetricKind::Counter, "orders")).expect_err("must fail");
    assert_eq!(err.class().as_str(), "REGISTRY");
}

#[test]
fn backup_persists_live_counters_only() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let repo = MetricRepository::builder(Arc::new(InMemoryRegistry::new()))
        .with_clock(clock)
        .with_backup(dir.path())
        .build()
        .unwrap();

    repo.counter(&minutely(MetricKind::Counter, "orders")).unwrap().add(42);
    repo.meter(&minutely(MetricKind::Meter, "hits")).unwrap().mark();

    assert_eq!(repo.backup_counters(), 1);

    let store = FileCounterBackup::new(dir.path()).unwrap();
    assert_eq!(store.get(&format!("shop.orders.counter.minutely.{T0}")), 42);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn backup_skips_unreadable_counter_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(RegistryDouble::with_broken("broken"));
    let repo = MetricRepository::builder(registry)
        .with_clock(Arc::new(ManualClock::new(T0)))
        .with_backup(dir.path())
        .build()
        .unwrap();

    repo.counter(&minutely(MetricKind::Counter, "broken")).unwrap().add(1);
    repo.counter(&minutely(MetricKind::Counter, "fine")).unwrap().add(2);

    assert_eq!(repo.backup_counters(), 1);
    let store = FileCounterBackup::new(dir.path()).unwrap();
    assert_eq!(store.get(&format!("shop.fine.counter.minutely.{T0}")), 2);
    assert_eq!(store.get(&format!("shop.broken.counter.minutely.{T0}")), 0);
}

#[test]
fn counter_is_restored_from_backup_on_first_use() {
    let dir = tempfile::tempdir().unwrap();
    let id = TemporalMetricId::daily(MetricKind::Counter).owner_scope("shop").name("orders").build().unwrap();
    let bucket = id.truncate(T0);
    FileCounterBackup::new(dir.path()).unwrap().persist(&id.registry_key(bucket), 41);

    let repo = MetricRepository::builder(Arc::new(InMemoryRegistry::new()))
        .with_clock(Arc::new(ManualClock::new(T0)))
        .with_backup(dir.path())
        .build()
        .unwrap();

    let counter = repo.daily_counter("shop", "orders").unwrap();
    assert_eq!(counter.count(), 41);
    counter.inc();
    assert_eq!(repo.daily_counter("shop", "orders").unwrap().count(), 42);
}

#[test]
fn without_backup_directory_counters_start_at_zero() {
    let repo = MetricRepository::builder(Arc::new(InMemoryRegistry::new()))
        .with_clock(Arc::new(ManualClock::new(T0)))
        .with_backup("")
        .build()
        .unwrap();

    let counter = repo.counter(&minutely(MetricKind::Counter, "orders")).unwrap();
    counter.add(3);
    assert_eq!(repo.backup_counters(), 1);
    assert_eq!(repo.sweep(), 0);
}

#[test]
fn sweep_prunes_old_backup_files() {
    let dir = tempfile::tempdir().unwrap();
    let stale = dir.path().join("stale.value");
    std::fs::write(&stale, "3\n").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&stale)
        .unwrap()
        .set_modified(std::time::SystemTime::now() - Duration::from_secs(30 * 86_400))
        .unwrap();

    let repo = MetricRepository::builder(Arc::new(InMemoryRegistry::new()))
        .with_backup(dir.path())
        .with_retention_days(7)
        .build()
        .unwrap();
    repo.sweep();

    assert!(!stale.exists());
}

#[test]
fn builder_rejects_zero_intervals() {
    let err = MetricRepository::builder(Arc::new(InMemoryRegistry::new()))
        .with_cleanup_interval(Duration::ZERO)
        .build()
        .err()
        .expect("must fail");
    assert_eq!(err.class().as_str(), "CONFIGURATION");
}

#[test]
fn blank_locale_keeps_default() {
    let repo = MetricRepository::builder(Arc::new(InMemoryRegistry::new()))
        .formatted_for(" ")
        .build()
        .unwrap();
    assert_eq!(repo.locale(), "en-US");

    let repo = MetricRepository::builder(Arc::new(InMemoryRegistry::new()))
        .formatted_for("fr-FR")
        .build()
        .unwrap();
    assert_eq!(repo.locale(), "fr-FR");
}

#[test]
fn daily_shortcuts_cover_every_kind() {
    let registry = Arc::new(InMemoryRegistry::new());
    let repo = repo_with(registry.clone(), Arc::new(ManualClock::new(T0)));

    repo.daily_counter("shop", "orders").unwrap().inc();
    repo.daily_meter("shop", "hits").unwrap().mark();
    repo.daily_timer("shop", "latency").unwrap().update(Duration::from_millis(3));
    repo.daily_histogram("shop", "basket").unwrap().update(12);

    assert_eq!(registry.len(), 4);
    assert!(repo.registry().get(&format!("shop.hits.meter.daily.{}", 1_699_920_000_000i64)).is_some());
}
