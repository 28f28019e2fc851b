//! File-based cache for the parsed registry feed.
//!
//! The repository's `extensions.xml` is large and changes a few times a
//! day at most, so the parsed records are kept on disk as JSON and reused
//! until the TTL runs out.
//!
//! # Cache Location
//!
//! - Linux: `~/.cache/t3scan/`
//! - macOS: `~/Library/Caches/t3scan/`
//! - Windows: `%LOCALAPPDATA%\t3scan\`
//!
//! # Example
//!
//! ```no_run
//! use t3scan::Cache;
//!
//! let cache = Cache::new();
//! cache.set("feed", &vec!["news".to_string()]).unwrap();
//!
//! let value: Option<Vec<String>> = cache.get("feed");
//! assert_eq!(value, Some(vec!["news".to_string()]));
//! ```

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

use crate::platform::cache_dir;

/// Default cache TTL in hours.
pub const CACHE_TTL_HOURS: u64 = 24;

/// A directory of JSON files, each expiring `ttl` after it was written.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
}

impl Cache {
    /// Cache in the platform cache directory with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl_hours(CACHE_TTL_HOURS)
    }

    /// Cache in the platform cache directory with a custom TTL.
    pub fn with_ttl_hours(hours: u64) -> Self {
        Self::in_dir(cache_dir(), Duration::from_secs(hours * 3600))
    }

    /// Cache rooted at an explicit directory.
    pub fn in_dir(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
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
            .map(|age| age > self.ttl)
            .unwrap_or(false)
    }

    /// Returns the cached value, or `None` if absent, expired or unreadable.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.cache_path(key);
        if !path.exists() {
            return None;
        }

        if self.is_expired(&path) {
            debug!(key, "Cache entry expired");
            let _ = fs::remove_file(&path);
            return None;
        }

        let content = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string(value)?;
        fs::write(self.cache_path(key), content)?;
        Ok(())
    }

    /// Removes every cached entry.
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)?.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    let _ = fs::remove_file(path);
                }
            }
        }
        Ok(())
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip_and_clear() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::in_dir(dir.path().join("c"), Duration::from_secs(3600));

        assert_eq!(cache.get::<u32>("feed"), None);
        cache.set("feed", &42u32).unwrap();
        assert_eq!(cache.get::<u32>("feed"), Some(42));

        cache.clear().unwrap();
        assert_eq!(cache.get::<u32>("feed"), None);
    }

    #[test]
    fn test_key_is_sanitized() {
        let cache = Cache::in_dir("/tmp/x", Duration::from_secs(1));
        let path = cache.cache_path("feed_https://typo3.org/ext.xml.gz");

        assert_eq!(
            path.file_name().unwrap(),
            "feed_https___typo3_org_ext_xml_gz.json"
        );
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::in_dir(dir.path(), Duration::ZERO);

        cache.set("feed", &1u32).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get::<u32>("feed"), None);
        assert!(!cache.cache_path("feed").exists());
    }
}
