use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of metric an id resolves to in the external registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Meter,
    Timer,
    Histogram,
}

impl MetricKind {
    /// Segment used inside registry keys.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Meter => "meter",
            MetricKind::Timer => "timer",
            MetricKind::Histogram => "histogram",
        }
    }

    /// Only counters hold a value worth persisting across restarts.
    pub fn is_countable(self) -> bool {
        matches!(self, MetricKind::Counter)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
