//! Temporal metric identity model.
//!
//! A [`TemporalMetricId`] names a metric (kind, owner scope, name) and carries
//! the rules that turn it into a bucketed registry key: a [`Granularity`] that
//! truncates timestamps, and an expiration after which the bucket is reclaimed.

mod granularity;
mod kind;
mod temporal;

pub use granularity::Granularity;
pub use kind::MetricKind;
pub use temporal::{TemporalMetricId, TemporalMetricIdBuilder};
