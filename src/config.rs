//! Configuration file handling.
//!
//! Settings are loaded from a TOML file; command-line flags override them.
//!
//! # Configuration Location
//!
//! - Linux: `~/.config/t3scan/config.toml`
//! - macOS: `~/Library/Application Support/t3scan/config.toml`
//! - Windows: `%APPDATA%\t3scan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! root = "/var/www"
//! depth = 2
//! search_insecure = true
//! search_outdated = true
//! warn_modified = true
//! ignore_modified = false
//! modified_only_registered = false
//! ignore_extensions = "news,powermail=2.1.4"
//! feed_url = "https://typo3.org/fileadmin/ter/extensions.xml.gz"
//! fetch_timeout_secs = 60
//! cache_ttl_hours = 24
//! default_format = "text"
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::engine::{AuditOptions, IntegrityScope, ModifiedPolicy};
use crate::error::AuditError;
use crate::ignore::IgnoreRuleSet;
use crate::platform::config_dir;
use crate::registry::DEFAULT_FEED_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory below which installations are searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Number of wildcard directory levels between `root` and `typo3conf`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,

    /// Report extensions with a known insecure version at or above the
    /// installed one.
    pub search_insecure: bool,

    /// Report extensions older than the newest registry release.
    pub search_outdated: bool,

    /// Report extensions whose files no longer match their checksums.
    pub warn_modified: bool,

    /// Leave modified extensions out of the insecure and outdated reports.
    pub ignore_modified: bool,

    /// Only verify checksums of extensions the registry knows.
    pub modified_only_registered: bool,

    /// Comma separated `key` or `key=version` exceptions.
    pub ignore_extensions: String,

    pub feed_url: String,

    /// Timeout for the registry download, in seconds.
    pub fetch_timeout_secs: u64,

    /// How long a downloaded feed is reused, in hours.
    pub cache_ttl_hours: u64,

    /// Valid values: "text", "table", "json", "sarif"
    pub default_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            depth: None,
            search_insecure: false,
            search_outdated: false,
            warn_modified: false,
            ignore_modified: false,
            modified_only_registered: false,
            ignore_extensions: String::new(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            fetch_timeout_secs: 60,
            cache_ttl_hours: 24,
            default_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Loads the config file, or the defaults if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::from_toml(&fs::read_to_string(&path)?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Writes the config file, creating its directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    /// The root and depth to scan.
    ///
    /// # Errors
    ///
    /// [`AuditError::MissingParameter`] if either is unset.
    pub fn target(&self) -> std::result::Result<(PathBuf, usize), AuditError> {
        let root = self
            .root
            .clone()
            .ok_or(AuditError::MissingParameter("path"))?;
        let depth = self.depth.ok_or(AuditError::MissingParameter("depth"))?;
        Ok((root, depth))
    }

    pub fn audit_options(&self) -> AuditOptions {
        let scope = if self.modified_only_registered {
            IntegrityScope::RegisteredOnly
        } else {
            IntegrityScope::AllExtensions
        };

        AuditOptions {
            search_insecure: self.search_insecure,
            search_outdated: self.search_outdated,
            modified: ModifiedPolicy::from_flags(self.warn_modified, self.ignore_modified),
            integrity_scope: scope,
        }
    }

    pub fn ignore_rules(&self) -> IgnoreRuleSet {
        IgnoreRuleSet::parse(&self.ignore_extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.feed_url, DEFAULT_FEED_URL);
        assert_eq!(config.default_format, "text");
        assert_eq!(config.cache_ttl_hours, 24);
        assert!(config.audit_options().is_noop());
        assert!(config.ignore_rules().is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            root = "/var/www"
            depth = 2
            search_insecure = true
            warn_modified = true
            ignore_modified = true
            modified_only_registered = true
            ignore_extensions = "news,seo=1.0.0"
            "#,
        )
        .unwrap();

        assert_eq!(config.target().unwrap(), (PathBuf::from("/var/www"), 2));
        assert_eq!(config.fetch_timeout_secs, 60);

        let options = config.audit_options();
        assert!(options.search_insecure);
        assert!(!options.search_outdated);
        assert_eq!(options.modified, ModifiedPolicy::ReportAndExclude);
        assert_eq!(options.integrity_scope, IntegrityScope::RegisteredOnly);
        assert!(config.ignore_rules().is_ignored("seo", "1.0.0"));
    }

    #[test]
    fn test_missing_target_is_config_error() {
        let config = Config {
            root: Some(PathBuf::from("/var/www")),
            ..Config::default()
        };

        assert!(matches!(
            config.target(),
            Err(AuditError::MissingParameter("depth"))
        ));
        assert!(matches!(
            Config::default().target(),
            Err(AuditError::MissingParameter("path"))
        ));
    }

    #[test]
    fn test_default_config_roundtrips() {
        let text = Config::generate_default_config();
        let config = Config::from_toml(&text).unwrap();
        assert_eq!(config.feed_url, DEFAULT_FEED_URL);
    }
}
