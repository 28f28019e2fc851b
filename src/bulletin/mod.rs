//! Security bulletin crawler.
//!
//! Walks the paginated bulletin index, visits every extension bulletin and
//! collects the highest affected version per extension key. The result is
//! written as a flat JSON object and is independent of the audit engine.

mod parse;

pub use parse::{
    article_links, normalize_version, page_links, parse_article, Advisory, VERSION_NOT_FOUND,
};

use crate::version::Version;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_PATH: &str = "https://typo3.org/teams/security/security-bulletins/";
pub const DEFAULT_BASE_URL: &str = "https://typo3.org";
pub const DEFAULT_OUTPUT: &str = "./insecure.json";

/// Extension key to highest affected version.
pub type InsecureList = BTreeMap<String, String>;

/// Keeps the higher of the stored and the new version for `extension`.
///
/// Versions that do not parse lose against any that do; between two
/// unparseable values the first one stays.
pub fn merge_advisory(list: &mut InsecureList, advisory: Advisory) {
    let Advisory { extension, version } = advisory;

    match list.get(&extension) {
        Some(current) if !is_newer(&version, current) => {}
        _ => {
            debug!(extension = %extension, version = %version, "Recorded affected version");
            list.insert(extension, version);
        }
    }
}

fn is_newer(candidate: &str, current: &str) -> bool {
    match (Version::parse(candidate), Version::parse(current)) {
        (Ok(c), Ok(cur)) => c > cur,
        (Ok(_), Err(_)) => true,
        _ => false,
    }
}

pub struct Crawler {
    client: reqwest::Client,
    base_path: String,
    base_url: String,
}

impl Crawler {
    pub fn new(base_path: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("t3scan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_path: base_path.into(),
            base_url: base_url.into(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let text = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch {}", url))?
            .text()
            .await
            .with_context(|| format!("Failed to read {}", url))?;
        Ok(text)
    }

    /// Crawls the index pages, then every extension bulletin found on them.
    pub async fn crawl(&self) -> Result<InsecureList> {
        let mut visited: HashSet<String> = HashSet::from([self.base_path.clone()]);
        let mut pages = vec![self.base_path.clone()];
        let mut articles = Vec::new();

        while let Some(page) = pages.pop() {
            debug!(url = %page, "Reading bulletin index");
            let html = self.fetch(&page).await?;

            for link in page_links(&html) {
                let url = format!("{}{}", self.base_url, link);
                if visited.insert(url.clone()) {
                    pages.push(url);
                }
            }
            for link in article_links(&html) {
                let url = format!("{}{}", self.base_url, link);
                if visited.insert(url.clone()) {
                    articles.push(url);
                }
            }
        }

        info!(count = articles.len(), "Found extension bulletins");

        let mut list = InsecureList::new();
        while let Some(article) = articles.pop() {
            let html = self.fetch(&article).await?;
            let advisories = parse_article(&html);
            if advisories.is_empty() {
                debug!(url = %article, "No extension found in bulletin");
            }
            for advisory in advisories {
                merge_advisory(&mut list, advisory);
            }
        }

        Ok(list)
    }
}

pub fn write_list(list: &InsecureList, path: &Path) -> Result<()> {
    let json = serde_json::to_string(list)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advisory(extension: &str, version: &str) -> Advisory {
        Advisory {
            extension: extension.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn test_merge_keeps_highest() {
        let mut list = InsecureList::new();
        merge_advisory(&mut list, advisory("news", "1.9.0"));
        merge_advisory(&mut list, advisory("news", "1.10.0"));
        merge_advisory(&mut list, advisory("news", "1.2.0"));

        assert_eq!(list["news"], "1.10.0");
    }

    #[test]
    fn test_merge_unparseable_loses() {
        let mut list = InsecureList::new();
        merge_advisory(&mut list, advisory("news", VERSION_NOT_FOUND));
        merge_advisory(&mut list, advisory("news", "0.1.0"));
        merge_advisory(&mut list, advisory("news", ""));
        merge_advisory(&mut list, advisory("seo", ""));

        assert_eq!(list["news"], "0.1.0");
        assert_eq!(list["seo"], "");
    }

    #[test]
    fn test_write_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insecure.json");
        let mut list = InsecureList::new();
        merge_advisory(&mut list, advisory("news", "2.3.0"));

        write_list(&list, &path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"news":"2.3.0"}"#
        );
    }
}
