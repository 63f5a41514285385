//! Identity builder validation.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashSet;
use std::time::Duration;

use timebucket_core::{Granularity, MetricKind, TemporalMetricId};

const MINUTE: Duration = Duration::from_secs(60);

#[test]
fn minutely_rejects_expiration_below_one_minute() {
    let err = TemporalMetricId::minutely(MetricKind::Counter)
        .name("orders")
        .expiration(MINUTE - Duration::from_millis(1))
        .build()
        .expect_err("must fail");
    assert_eq!(err.class().as_str(), "CONFIGURATION");
}

#[test]
fn expiration_at_floor_is_accepted() {
    for g in [Granularity::Minutely, Granularity::Hourly, Granularity::Daily] {
        let id = TemporalMetricId::builder(g, MetricKind::Timer)
            .name("latency")
            .expiration(g.min_expiration())
            .build()
            .expect("floor must be accepted");
        assert_eq!(id.expiration(), g.min_expiration());
    }
}

#[test]
fn daily_rejects_hour_expiration() {
    let err = TemporalMetricId::daily(MetricKind::Counter)
        .name("orders")
        .expiration(Duration::from_secs(3600))
        .build()
        .expect_err("must fail");
    assert_eq!(err.class().as_str(), "CONFIGURATION");
}

#[test]
fn defaults_apply_when_expiration_unset() {
    let id = TemporalMetricId::minutely(MetricKind::Counter).name("orders").build().unwrap();
    assert_eq!(id.expiration(), Duration::from_secs(3600));
    assert_eq!(id.owner_scope(), "");

    let id = TemporalMetricId::daily(MetricKind::Counter).name("orders").build().unwrap();
    assert_eq!(id.expiration(), Duration::from_secs(2 * 86_400));
}

#[test]
fn blank_name_is_rejected() {
    let err = TemporalMetricId::minutely(MetricKind::Meter).name("  ").build().expect_err("must fail");
    assert_eq!(err.class().as_str(), "CONFIGURATION");
    assert!(TemporalMetricId::minutely(MetricKind::Meter).build().is_err());
}

#[test]
fn equality_covers_kind_scope_name_and_expiration() {
    let base = || TemporalMetricId::minutely(MetricKind::Counter).owner_scope("shop").name("orders");

    let a = base().build().unwrap();
    let b = base().build().unwrap();
    assert_eq!(a, b);

    let other_kind = TemporalMetricId::minutely(MetricKind::Meter).owner_scope("shop").name("orders").build().unwrap();
    let other_scope = base().owner_scope("billing").build().unwrap();
    let other_name = base().name("refunds").build().unwrap();
    let other_exp = base().expiration(Duration::from_secs(7200)).build().unwrap();

    let set: HashSet<_> = [a, b, other_kind, other_scope, other_name, other_exp].into_iter().collect();
    assert_eq!(set.len(), 5);
}

#[test]
fn owner_type_uses_type_path() {
    struct Checkout;
    let id = TemporalMetricId::daily(MetricKind::Histogram).owner_type::<Checkout>().name("basket").build().unwrap();
    assert!(id.owner_scope().ends_with("Checkout"));
}

#[test]
fn registry_key_includes_bucket() {
    let id = TemporalMetricId::minutely(MetricKind::Counter).owner_scope("shop").name("orders").build().unwrap();
    assert_eq!(id.registry_key(120_000), "shop.orders.counter.minutely.120000");
}
