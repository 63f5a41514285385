//! timebucket repository runtime.
//!
//! Wires the identity model to an external metric registry: bucketed
//! registration, expiration sweeps, counter backups and their retention.
//! Consumed by the demo binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod backup;
pub mod config;
pub mod registry;
pub mod repository;

pub use backup::{CounterBackup, FileCounterBackup, NoopCounterBackup};
pub use registry::{InMemoryRegistry, Metric, MetricRegistry};
pub use repository::{MetricEntry, MetricRepository, MetricRepositoryBuilder};
