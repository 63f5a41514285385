use std::path::PathBuf;

use serde::Deserialize;
use timebucket_core::error::{Result, TimebucketError};

const INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 1_000..=86_400_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    pub version: u32,

    /// Absent or blank => no-op backup store.
    #[serde(default)]
    pub backup_directory: Option<PathBuf>,

    #[serde(default = "default_interval_ms")]
    pub cleanup_interval_ms: u64,

    #[serde(default = "default_interval_ms")]
    pub backup_interval_ms: u64,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            version: 1,
            backup_directory: None,
            cleanup_interval_ms: default_interval_ms(),
            backup_interval_ms: default_interval_ms(),
            retention_days: default_retention_days(),
            locale: default_locale(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl RepositoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TimebucketError::Configuration(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if !INTERVAL_RANGE_MS.contains(&self.cleanup_interval_ms) {
            return Err(TimebucketError::Configuration(
                "cleanup_interval_ms must be between 1000 and 86400000".into(),
            ));
        }
        if !INTERVAL_RANGE_MS.contains(&self.backup_interval_ms) {
            return Err(TimebucketError::Configuration(
                "backup_interval_ms must be between 1000 and 86400000".into(),
            ));
        }
        if self.retention_days == 0 {
            return Err(TimebucketError::Configuration("retention_days must be at least 1".into()));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(TimebucketError::Configuration(
                "shutdown_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_interval_ms() -> u64 {
    60_000
}
fn default_retention_days() -> u32 {
    7
}
fn default_locale() -> String {
    "en-US".into()
}
fn default_shutdown_timeout_ms() -> u64 {
    5_000
}
