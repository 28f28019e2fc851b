//! In-memory view of the extension repository.
//!
//! The [`RegistryIndex`] is built once per run from the parsed feed and is
//! read-only afterwards. Insecure versions are collected eagerly while the
//! feed is indexed; the newest version of a key is resolved on first request
//! and memoized for the rest of the run.

mod feed;
mod source;

pub use feed::{decode_payload, parse_feed, FeedExtension, FeedVersion, INSECURE_REVIEW_STATE};
pub use source::{FeedSource, FileFeed, RemoteFeed, DEFAULT_FEED_URL};

use crate::error::Result;
use crate::version::RawVersion;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct RegistryIndex {
    versions: HashMap<String, Vec<FeedVersion>>,
    insecure: HashMap<String, Vec<RawVersion>>,
    newest: Mutex<HashMap<String, Option<RawVersion>>>,
}

impl RegistryIndex {
    /// Indexes a parsed feed. Records sharing a key are merged in feed order.
    pub fn from_feed(feed: Vec<FeedExtension>) -> Self {
        let mut versions: HashMap<String, Vec<FeedVersion>> = HashMap::new();
        let mut insecure: HashMap<String, Vec<RawVersion>> = HashMap::new();

        for ext in feed {
            for entry in &ext.versions {
                if !entry.is_insecure() {
                    continue;
                }
                match RawVersion::parse(entry.version.as_str()) {
                    Ok(v) => insecure.entry(ext.key.clone()).or_default().push(v),
                    Err(e) => debug!(extension = %ext.key, error = %e, "Ignoring insecure entry"),
                }
            }
            versions.entry(ext.key).or_default().extend(ext.versions);
        }

        Self {
            versions,
            insecure,
            newest: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches and indexes the feed from `source`.
    pub async fn load(source: &dyn FeedSource) -> Result<Self> {
        info!(source = %source.describe(), "Loading registry feed");
        let feed = source.load().await?;
        let index = Self::from_feed(feed);
        info!(
            extensions = index.len(),
            insecure = index.insecure.len(),
            "Registry index ready"
        );
        Ok(index)
    }

    /// Versions of `key` flagged insecure, in feed order.
    pub fn insecure_versions_of(&self, key: &str) -> &[RawVersion] {
        self.insecure.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The last version listed for `key`.
    ///
    /// The feed's own ordering decides what "newest" means. Returns `None`
    /// for unknown keys, and also when the last listed version cannot be
    /// parsed, since it cannot be compared against anything.
    pub fn newest_version_of(&self, key: &str) -> Option<RawVersion> {
        let mut newest = self.newest.lock().unwrap_or_else(|e| e.into_inner());
        newest
            .entry(key.to_string())
            .or_insert_with(|| {
                let last = self.versions.get(key)?.last()?;
                RawVersion::parse(last.version.as_str()).ok()
            })
            .clone()
    }

    /// True if the registry lists at least one version of `key`.
    pub fn exists_in_registry(&self, key: &str) -> bool {
        self.versions.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Number of distinct extension keys.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> RegistryIndex {
        RegistryIndex::from_feed(vec![
            FeedExtension::new(
                "ext_a",
                vec![
                    FeedVersion::new("1.0.0", -1),
                    FeedVersion::new("1.0.5", -1),
                    FeedVersion::new("1.0.6", 0),
                ],
            ),
            FeedExtension::new(
                "ext_b",
                vec![FeedVersion::new("2.0.0", 0), FeedVersion::new("1.9.9", 0)],
            ),
            FeedExtension::new("ext_c", vec![FeedVersion::new("bogus", -1)]),
            FeedExtension::new("ext_d", vec![]),
        ])
    }

    #[test]
    fn test_insecure_versions() {
        let index = index();
        let raw: Vec<_> = index
            .insecure_versions_of("ext_a")
            .iter()
            .map(|v| v.as_str())
            .collect();

        assert_eq!(raw, vec!["1.0.0", "1.0.5"]);
        assert!(index.insecure_versions_of("ext_b").is_empty());
        assert!(index.insecure_versions_of("ext_c").is_empty());
        assert!(index.insecure_versions_of("missing").is_empty());
    }

    #[test]
    fn test_newest_is_last_listed() {
        let index = index();

        // feed order wins, even though 2.0.0 is numerically larger
        assert_eq!(index.newest_version_of("ext_b").unwrap().as_str(), "1.9.9");
        assert_eq!(index.newest_version_of("ext_a").unwrap().as_str(), "1.0.6");
        assert!(index.newest_version_of("ext_c").is_none());
        assert!(index.newest_version_of("ext_d").is_none());
        assert!(index.newest_version_of("missing").is_none());
    }

    #[test]
    fn test_newest_is_memoized() {
        let index = index();
        let first = index.newest_version_of("ext_a");
        let second = index.newest_version_of("ext_a");

        assert_eq!(first, second);
        assert_eq!(index.newest.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_exists_in_registry() {
        let index = index();

        assert!(index.exists_in_registry("ext_a"));
        assert!(index.exists_in_registry("ext_c"));
        assert!(!index.exists_in_registry("ext_d"));
        assert!(!index.exists_in_registry("missing"));
    }

    #[test]
    fn test_duplicate_records_merge() {
        let index = RegistryIndex::from_feed(vec![
            FeedExtension::new("news", vec![FeedVersion::new("1.0.0", -1)]),
            FeedExtension::new("news", vec![FeedVersion::new("1.1.0", 0)]),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.insecure_versions_of("news").len(), 1);
        assert_eq!(index.newest_version_of("news").unwrap().as_str(), "1.1.0");
    }
}
