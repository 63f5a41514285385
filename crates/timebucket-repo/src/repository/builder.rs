use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use timebucket_core::error::{Result, TimebucketError};
use timebucket_core::{Clock, SystemClock};

use crate::backup;
use crate::config::RepositoryConfig;
use crate::registry::MetricRegistry;

use super::{MetricRepository, RepositorySettings};

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_LOCALE: &str = "en-US";

/// Fluent setup for [`MetricRepository`]. Nothing is touched on disk until
/// [`build`](Self::build).
pub struct MetricRepositoryBuilder {
    registry: Arc<dyn MetricRegistry>,
    backup_directory: Option<PathBuf>,
    settings: RepositorySettings,
    clock: Arc<dyn Clock>,
}

impl MetricRepositoryBuilder {
    pub(super) fn new(registry: Arc<dyn MetricRegistry>) -> Self {
        Self {
            registry,
            backup_directory: None,
            settings: RepositorySettings {
                cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
                backup_interval: DEFAULT_BACKUP_INTERVAL,
                retention_days: DEFAULT_RETENTION_DAYS,
                shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
                locale: DEFAULT_LOCALE.to_string(),
            },
            clock: Arc::new(SystemClock),
        }
    }

    /// Locale for collaborators that format names. Blank keeps the current one.
    pub fn formatted_for(mut self, locale: impl Into<String>) -> Self {
        let locale = locale.into();
        if !locale.trim().is_empty() {
            self.settings.locale = locale;
        }
        self
    }

    /// Directory for counter backups. Blank selects the no-op store.
    pub fn with_backup(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_directory = Some(dir.into());
        self
    }

    pub fn with_cleanup_interval(mut self, every: Duration) -> Self {
        self.settings.cleanup_interval = every;
        self
    }

    pub fn with_backup_interval(mut self, every: Duration) -> Self {
        self.settings.backup_interval = every;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.settings.retention_days = days;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.settings.shutdown_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate settings and open the backup store.
    ///
    /// An unreadable or unwritable backup directory fails here, not on first use.
    pub fn build(self) -> Result<MetricRepository> {
        let s = &self.settings;
        if s.cleanup_interval.is_zero() || s.backup_interval.is_zero() {
            return Err(TimebucketError::Configuration(
                "cleanup and backup intervals must be greater than zero".into(),
            ));
        }
        if s.shutdown_timeout.is_zero() {
            return Err(TimebucketError::Configuration(
                "shutdown timeout must be greater than zero".into(),
            ));
        }

        let backup = backup::for_directory_with_clock(
            self.backup_directory.as_deref(),
            Arc::clone(&self.clock),
        )?;
        Ok(MetricRepository::from_parts(self.registry, backup, self.clock, self.settings))
    }
}

impl MetricRepository {
    /// Build a repository from a loaded config file.
    pub fn from_config(registry: Arc<dyn MetricRegistry>, cfg: &RepositoryConfig) -> Result<Self> {
        let mut b = Self::builder(registry)
            .formatted_for(cfg.locale.clone())
            .with_cleanup_interval(Duration::from_millis(cfg.cleanup_interval_ms))
            .with_backup_interval(Duration::from_millis(cfg.backup_interval_ms))
            .with_retention_days(cfg.retention_days)
            .with_shutdown_timeout(Duration::from_millis(cfg.shutdown_timeout_ms));
        if let Some(dir) = &cfg.backup_directory {
            b = b.with_backup(dir);
        }
        b.build()
    }
}
