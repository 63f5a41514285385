//! timebucket core: temporal metric identities, error types and the clock seam.
//!
//! This crate defines the identity model shared by the repository runtime and
//! by callers that build ids up front. It carries no runtime or filesystem
//! dependencies so ids can be declared as plain values anywhere.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `TimebucketError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod error;
pub mod id;

/// Shared result type.
pub use error::{ErrorClass, Result, TimebucketError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use id::{Granularity, MetricKind, TemporalMetricId, TemporalMetricIdBuilder};
