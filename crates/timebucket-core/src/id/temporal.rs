use std::time::Duration;

use crate::error::{Result, TimebucketError};

use super::{Granularity, MetricKind};

/// Immutable identity of a time-bucketed metric.
///
/// Two ids are equal when kind, granularity, owner scope, name and expiration
/// all match. The bucket a measurement lands in is not part of the id; it is
/// derived at lookup time through [`TemporalMetricId::truncate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemporalMetricId {
    kind: MetricKind,
    granularity: Granularity,
    owner_scope: String,
    name: String,
    expiration: Duration,
}

impl TemporalMetricId {
    /// Start a builder for the given bucket width and metric kind.
    pub fn builder(granularity: Granularity, kind: MetricKind) -> TemporalMetricIdBuilder {
        TemporalMetricIdBuilder::new(granularity, kind)
    }

    pub fn minutely(kind: MetricKind) -> TemporalMetricIdBuilder {
        Self::builder(Granularity::Minutely, kind)
    }

    pub fn hourly(kind: MetricKind) -> TemporalMetricIdBuilder {
        Self::builder(Granularity::Hourly, kind)
    }

    pub fn daily(kind: MetricKind) -> TemporalMetricIdBuilder {
        Self::builder(Granularity::Daily, kind)
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn owner_scope(&self) -> &str {
        &self.owner_scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Floor `timestamp_ms` to the start of this id's bucket.
    pub fn truncate(&self, timestamp_ms: i64) -> i64 {
        self.granularity.truncate(timestamp_ms)
    }

    /// Registry key for this id in the bucket starting at `truncated_ms`.
    ///
    /// Format: `{owner_scope}.{name}.{kind}.{granularity}.{truncated_ms}`.
    /// The same string names the counter's backup file.
    pub fn registry_key(&self, truncated_ms: i64) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            self.owner_scope, self.name, self.kind, self.granularity, truncated_ms
        )
    }
}

/// Fluent builder; validation happens in [`TemporalMetricIdBuilder::build`].
#[derive(Debug, Clone)]
pub struct TemporalMetricIdBuilder {
    kind: MetricKind,
    granularity: Granularity,
    owner_scope: String,
    name: Option<String>,
    expiration: Duration,
}

impl TemporalMetricIdBuilder {
    fn new(granularity: Granularity, kind: MetricKind) -> Self {
        Self {
            kind,
            granularity,
            owner_scope: String::new(),
            name: None,
            expiration: granularity.default_expiration(),
        }
    }

    /// Namespace token, e.g. a module path.
    pub fn owner_scope(mut self, scope: impl Into<String>) -> Self {
        self.owner_scope = scope.into();
        self
    }

    /// Use the fully qualified name of `T` as owner scope.
    pub fn owner_type<T: ?Sized>(self) -> Self {
        self.owner_scope(std::any::type_name::<T>())
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Finalize the id.
    ///
    /// Fails with a configuration error when the name is missing or blank, or
    /// when the expiration is shorter than one bucket of the granularity.
    pub fn build(self) -> Result<TemporalMetricId> {
        let name = match self.name {
            Some(n) if !n.trim().is_empty() => n,
            _ => {
                return Err(TimebucketError::Configuration(
                    "metric id requires a non-blank name".into(),
                ))
            }
        };

        let floor = self.granularity.min_expiration();
        if self.expiration < floor {
            return Err(TimebucketError::Configuration(format!(
                "{} metric [{}] expiration {:?} is below the {:?} bucket",
                self.granularity, name, self.expiration, floor
            )));
        }

        Ok(TemporalMetricId {
            kind: self.kind,
            granularity: self.granularity,
            owner_scope: self.owner_scope,
            name,
            expiration: self.expiration,
        })
    }
}
