//! Shared error type across timebucket crates.

use thiserror::Error;

use crate::id::MetricKind;

/// Coarse error classes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Invalid setup: bad backup directory, expiration below the bucket floor, bad config file.
    Configuration,
    /// Backup file could not be written, read or deleted.
    Persistence,
    /// The external metric registry refused a registration or removal.
    Registry,
}

impl ErrorClass {
    /// String representation used in logs and test assertions.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Configuration => "CONFIGURATION",
            ErrorClass::Persistence => "PERSISTENCE",
            ErrorClass::Registry => "REGISTRY",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TimebucketError>;

/// Unified error type used by core and repo.
#[derive(Debug, Error)]
pub enum TimebucketError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("persistence: {0}")]
    Persistence(String),
    #[error("registry: {0}")]
    Registry(String),
    #[error("registry: metric [{key}] is a {actual}, not a {expected}")]
    KindMismatch {
        key: String,
        expected: MetricKind,
        actual: MetricKind,
    },
}

impl TimebucketError {
    /// Map an error to its stable class.
    pub fn class(&self) -> ErrorClass {
        match self {
            TimebucketError::Configuration(_) => ErrorClass::Configuration,
            TimebucketError::Persistence(_) => ErrorClass::Persistence,
            TimebucketError::Registry(_) | TimebucketError::KindMismatch { .. } => {
                ErrorClass::Registry
            }
        }
    }
}

