//! File-based cache for registry lookups.
//!
//! Each entry is a JSON file named after its key. Entries older than the TTL
//! are treated as missing and removed on read.
//!
//! # Cache Location
//!
//! - Linux: `~/.cache/deprisk/`
//! - macOS: `~/Library/Caches/deprisk/`
//! - Windows: `%LOCALAPPDATA%\deprisk\`
//!
//! # Example
//!
//! ```
//! use deprisk::Cache;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let cache = Cache::in_dir(dir.path(), 1);
//!
//! cache.set("npm_lodash", &"4.17.21".to_string()).unwrap();
//! assert_eq!(cache.get::<String>("npm_lodash"), Some("4.17.21".to_string()));
//! ```

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Default cache TTL in hours.
pub const DEFAULT_TTL_HOURS: u64 = 24;

const APP_DIR: &str = "deprisk";

/// Platform cache directory for this tool, falling back to the system temp
/// directory when the platform has none.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
}

impl Cache {
    /// Cache in the platform directory with the default 24-hour TTL.
    pub fn new() -> Self {
        Self::with_ttl_hours(DEFAULT_TTL_HOURS)
    }

    pub fn with_ttl_hours(hours: u64) -> Self {
        Self::in_dir(default_cache_dir(), hours)
    }

    pub fn in_dir(dir: impl Into<PathBuf>, ttl_hours: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::from_secs(ttl_hours * 3600),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Characters outside `[A-Za-z0-9_-]` are replaced by `_`.
    fn cache_path(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe_key))
    }

    fn is_expired(&self, path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > self.ttl)
    }

    /// Returns the cached value, or `None` if it is missing, expired or no
    /// longer deserializes as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.cache_path(key);
        if !path.exists() {
            return None;
        }
        if self.is_expired(&path) {
            let _ = fs::remove_file(&path);
            return None;
        }

        let content = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;
        let path = self.cache_path(key);
        let content = serde_json::to_string(value)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write cache entry {}", path.display()))?;
        Ok(())
    }

    /// Removes every cached entry and returns how many were deleted.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
