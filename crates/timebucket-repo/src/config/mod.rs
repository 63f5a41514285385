//! Repository config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use timebucket_core::error::{Result, TimebucketError};

pub use schema::RepositoryConfig;

pub fn load_from_file(path: impl AsRef<Path>) -> Result<RepositoryConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        TimebucketError::Configuration(format!("read config [{}] failed: {e}", path.display()))
    })?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<RepositoryConfig> {
    let cfg: RepositoryConfig = serde_yaml::from_str(s)
        .map_err(|e| TimebucketError::Configuration(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
