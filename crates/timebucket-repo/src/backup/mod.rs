//! Durable counter backups.
//!
//! One plain-text file per counter, holding the latest value on its first
//! line. Persistence is best-effort: I/O failures are logged and degrade to a
//! safe default, never surfaced to callers.

mod file;
mod noop;

use std::path::Path;
use std::sync::Arc;

use unicode_normalization::UnicodeNormalization;

use timebucket_core::error::Result;
use timebucket_core::{Clock, SystemClock};

pub use file::FileCounterBackup;
pub use noop::NoopCounterBackup;

/// Suffix appended to every normalized backup file name.
pub const BACKUP_SUFFIX: &str = ".value";

/// Backup store used by the repository.
pub trait CounterBackup: Send + Sync {
    /// Overwrite the stored value for `name`. Never fails the caller.
    fn persist(&self, name: &str, value: i64);

    /// Stored value for `name`, or 0 when missing or unreadable.
    fn get(&self, name: &str) -> i64;

    /// Delete backup files not modified for more than `days_to_keep` days.
    fn cleanup(&self, days_to_keep: u32);
}

/// Pick the store for an optional directory: none or blank means no-op.
pub fn for_directory(dir: Option<&Path>) -> Result<Arc<dyn CounterBackup>> {
    for_directory_with_clock(dir, Arc::new(SystemClock))
}

pub fn for_directory_with_clock(
    dir: Option<&Path>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn CounterBackup>> {
    match dir {
        Some(d) if !d.to_string_lossy().trim().is_empty() => {
            Ok(Arc::new(FileCounterBackup::with_clock(d, clock)?))
        }
        _ => Ok(Arc::new(NoopCounterBackup)),
    }
}

/// File name for a counter: drop ASCII punctuation and whitespace, decompose
/// (NFD), strip combining diacritical marks, append [`BACKUP_SUFFIX`].
///
/// `"Órders Count!"` becomes `"OrdersCount.value"`.
pub fn normalize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .filter(|c| !c.is_ascii_punctuation() && !is_posix_space(*c))
        .nfd()
        .filter(|c| !is_combining_diacritical(*c))
        .collect();
    out.push_str(BACKUP_SUFFIX);
    out
}

// [ \t\n\x0B\f\r]
fn is_posix_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r')
}

// Combining Diacritical Marks block.
fn is_combining_diacritical(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}
