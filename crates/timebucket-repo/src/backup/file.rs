use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use timebucket_core::error::{Result, TimebucketError};
use timebucket_core::{Clock, SystemClock};

use super::{normalize, CounterBackup};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Directory-backed store: `<base>/<normalize(name)>` holds one decimal line.
///
/// Writes go to a unique temp file in the same directory and are renamed over
/// the target, so a concurrent `get` sees either the old or the new value.
pub struct FileCounterBackup {
    base: PathBuf,
    clock: Arc<dyn Clock>,
    tmp_seq: AtomicU64,
}

impl FileCounterBackup {
    /// Open a store on `base`; fails unless the directory is readable and writable.
    pub fn new(base: impl AsRef<Path>) -> Result<Self> {
        Self::with_clock(base, Arc::new(SystemClock))
    }

    pub fn with_clock(base: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        check_readable(&base)?;
        check_writable(&base)?;
        Ok(Self { base, clock, tmp_seq: AtomicU64::new(0) })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Full path of the backup file for `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.base.join(normalize(name))
    }

    fn write_atomic(&self, target: &Path, value: i64) -> std::io::Result<()> {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let file_name = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let tmp = self.base.join(format!(".{file_name}.{}.{seq}.tmp", std::process::id()));

        let written = (|| {
            let mut f = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
            writeln!(f, "{value}")?;
            f.sync_all()?;
            fs::rename(&tmp, target)
        })();

        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }

    fn read_value(path: &Path) -> std::io::Result<i64> {
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let Some(first) = raw.lines().next() else { return Ok(0); };
        if first.is_empty() || !first.chars().all(|c| c.is_ascii_digit()) {
            return Ok(0);
        }
        first
            .parse::<i64>()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn age_days(&self, path: &Path) -> std::io::Result<i64> {
        let modified = fs::metadata(path)?.modified()?;
        let modified_ms = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i64,
            Err(e) => -(e.duration().as_millis() as i64),
        };
        Ok(self.clock.now_millis().saturating_sub(modified_ms).div_euclid(DAY_MS))
    }
}

impl CounterBackup for FileCounterBackup {
    fn persist(&self, name: &str, value: i64) {
        let target = self.path_for(name);
        if let Err(e) = self.write_atomic(&target, value) {
            tracing::error!(path=%target.display(), error=%e, "error while writing counter backup");
        }
    }

    fn get(&self, name: &str) -> i64 {
        let path = self.path_for(name);
        match Self::read_value(&path) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(path=%path.display(), error=%e, "error while reading counter backup");
                0
            }
        }
    }

    fn cleanup(&self, days_to_keep: u32) {
        let dir = match fs::read_dir(&self.base) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(dir=%self.base.display(), error=%e, "error while listing counter backups");
                return;
            }
        };

        for entry in dir {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(dir=%self.base.display(), error=%e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            match self.age_days(&path) {
                Ok(age) if age > i64::from(days_to_keep) => {
                    match fs::remove_file(&path) {
                        Ok(()) => tracing::debug!(path=%path.display(), age_days=age, "deleted stale counter backup"),
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => tracing::error!(path=%path.display(), error=%e, "error while deleting counter backup"),
                    }
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path=%path.display(), error=%e, "cannot stat counter backup"),
            }
        }
    }
}

fn check_readable(base: &Path) -> Result<()> {
    let meta = fs::metadata(base).map_err(|e| {
        TimebucketError::Configuration(format!("unable to read from [{}]: {e}", base.display()))
    })?;
    if !meta.is_dir() {
        return Err(TimebucketError::Configuration(format!(
            "backup path [{}] is not a directory",
            base.display()
        )));
    }
    fs::read_dir(base).map_err(|e| {
        TimebucketError::Configuration(format!("unable to read from [{}]: {e}", base.display()))
    })?;
    Ok(())
}

fn check_writable(base: &Path) -> Result<()> {
    let marker = base.join(format!(".timebucket-write-check-{}", std::process::id()));
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&marker)
        .map_err(|e| {
            TimebucketError::Configuration(format!("unable to write to [{}]: {e}", base.display()))
        })?;
    let _ = fs::remove_file(&marker);
    Ok(())
}
