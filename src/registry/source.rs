use super::feed::{parse_feed, FeedExtension};
use crate::cache::Cache;
use crate::error::{AuditError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Where the repository publishes its extension list.
pub const DEFAULT_FEED_URL: &str = "https://typo3.org/fileadmin/ter/extensions.xml.gz";

/// Produces the parsed registry feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable location, used in logs and progress output.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Vec<FeedExtension>>;
}

/// Downloads the feed over HTTP(S), optionally through the on-disk cache.
pub struct RemoteFeed {
    client: reqwest::Client,
    url: String,
    cache: Option<Cache>,
}

impl RemoteFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("t3scan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuditError::Fetch {
                url: url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url,
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn cache_key(&self) -> String {
        format!("feed_{}", self.url)
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let fetch_error = |e: reqwest::Error| AuditError::Fetch {
            url: self.url.clone(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_error)?;

        let bytes = response.bytes().await.map_err(fetch_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FeedSource for RemoteFeed {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn load(&self) -> Result<Vec<FeedExtension>> {
        if let Some(cache) = &self.cache {
            let cached = cache
                .get::<Vec<FeedExtension>>(&self.cache_key())
                .filter(|feed| !feed.is_empty());
            if let Some(feed) = cached {
                debug!(url = %self.url, "Using cached registry feed");
                return Ok(feed);
            }
        }

        let bytes = self.download().await?;
        let feed = parse_feed(&bytes)?;

        if feed.is_empty() {
            warn!(url = %self.url, "Registry feed lists no extensions, not caching it");
        } else if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&self.cache_key(), &feed) {
                warn!(error = %e, "Could not cache registry feed");
            }
        }

        Ok(feed)
    }
}

/// Reads a local copy of `extensions.xml` or `extensions.xml.gz`.
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for FileFeed {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<FeedExtension>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| AuditError::Fetch {
                url: self.describe(),
                message: e.to_string(),
            })?;
        parse_feed(&bytes)
    }
}
