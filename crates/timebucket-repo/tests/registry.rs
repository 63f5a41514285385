//! In-memory registry and metric primitives.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use timebucket_core::MetricKind;
use timebucket_repo::registry::Histogram;
use timebucket_repo::{InMemoryRegistry, MetricRegistry};

#[test]
fn register_or_get_returns_existing_handle() {
    let registry = InMemoryRegistry::new();
    let a = registry.register_or_get_counter("orders").unwrap();
    let b = registry.register_or_get_counter("orders").unwrap();
    a.add(2);
    assert_eq!(b.count(), 2);
    assert_eq!(registry.counter_value("orders").unwrap(), Some(2));
    assert_eq!(registry.len(), 1);
}

#[test]
fn kind_conflict_is_registry_error() {
    let registry = InMemoryRegistry::new();
    registry.register_or_get(MetricKind::Timer, "latency").unwrap();

    let err = registry.register_or_get_histogram("latency").expect_err("must fail");
    assert_eq!(err.class().as_str(), "REGISTRY");
    let err = registry.counter_value("latency").expect_err("must fail");
    assert_eq!(err.class().as_str(), "REGISTRY");
}

#[test]
fn remove_reports_whether_key_existed() {
    let registry = InMemoryRegistry::new();
    registry.register_or_get_meter("hits").unwrap();
    assert!(registry.remove("hits").unwrap());
    assert!(!registry.remove("hits").unwrap());
    assert_eq!(registry.counter_value("hits").unwrap(), None);
    assert!(registry.keys().is_empty());
}

#[test]
fn timer_buckets_are_cumulative() {
    let registry = InMemoryRegistry::new();
    let timer = registry.register_or_get_timer("latency").unwrap();
    timer.update(Duration::from_micros(50));
    timer.update(Duration::from_millis(2));
    timer.update(Duration::from_secs(3));

    assert_eq!(timer.count(), 3);
    assert_eq!(timer.sum(), Duration::from_micros(3_002_050));
    let buckets = timer.buckets();
    assert_eq!(buckets[0], (100, 1));
    assert_eq!(buckets[3], (5_000, 2));
    assert_eq!(buckets[8], (1_000_000, 2));

    {
        let _ctx = timer.time();
    }
    assert_eq!(timer.count(), 4);
}

#[test]
fn histogram_tracks_extremes() {
    let h = Histogram::default();
    assert_eq!(h.min(), None);
    assert_eq!(h.mean(), None);

    for v in [5, -3, 10] {
        h.update(v);
    }
    assert_eq!(h.count(), 3);
    assert_eq!(h.sum(), 12);
    assert_eq!(h.min(), Some(-3));
    assert_eq!(h.max(), Some(10));
    assert_eq!(h.mean(), Some(4.0));
}

#[test]
fn meter_counts_marks() {
    let registry = InMemoryRegistry::new();
    let meter = registry.register_or_get_meter("hits").unwrap();
    meter.mark();
    meter.mark_n(4);
    assert_eq!(meter.count(), 5);
    assert!(meter.mean_rate() >= 0.0);
}

#[test]
fn timer_stop_records_the_returned_duration() {
    let registry = InMemoryRegistry::new();
    let timer = registry.register_or_get_timer("latency").unwrap();

    let ctx = timer.time();
    std::thread::sleep(Duration::from_millis(2));
    let took = ctx.stop();

    assert_eq!(timer.count(), 1);
    assert_eq!(timer.sum(), Duration::from_micros(took.as_micros() as u64));
}
