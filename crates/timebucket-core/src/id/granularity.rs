use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Width of the time window a metric is bucketed into.
///
/// Buckets are aligned on the Unix epoch (UTC); a daily bucket starts at UTC
/// midnight regardless of the host timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Minutely,
    Hourly,
    Daily,
}

impl Granularity {
    /// Bucket width in milliseconds.
    pub fn width_millis(self) -> i64 {
        match self {
            Granularity::Minutely => MINUTE_MS,
            Granularity::Hourly => HOUR_MS,
            Granularity::Daily => DAY_MS,
        }
    }

    /// Smallest expiration accepted by the builder (one bucket).
    pub fn min_expiration(self) -> Duration {
        Duration::from_millis(self.width_millis() as u64)
    }

    /// Expiration applied when the builder is not given one.
    pub fn default_expiration(self) -> Duration {
        let ms = match self {
            Granularity::Minutely => HOUR_MS,
            Granularity::Hourly => DAY_MS,
            Granularity::Daily => 2 * DAY_MS,
        };
        Duration::from_millis(ms as u64)
    }

    /// Floor `timestamp_ms` to the start of its bucket.
    ///
    /// Idempotent and never greater than the input; negative timestamps floor
    /// towards negative infinity. Timestamps whose bucket would start before
    /// `i64::MIN` saturate to `i64::MIN`.
    pub fn truncate(self, timestamp_ms: i64) -> i64 {
        let w = self.width_millis();
        timestamp_ms
            .checked_sub(timestamp_ms.rem_euclid(w))
            .unwrap_or(i64::MIN)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Minutely => "minutely",
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
