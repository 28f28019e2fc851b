use crate::integrity::Baseline;
use crate::version::{RawVersion, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Result of the local modification check for one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modification {
    /// The check was not requested or not applicable.
    #[default]
    NotChecked,
    Unmodified,
    Modified,
}

impl Modification {
    pub fn is_modified(&self) -> bool {
        matches!(self, Modification::Modified)
    }
}

/// One extension as installed in one installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionInstance {
    pub key: String,
    pub version: RawVersion,
    pub modification: Modification,
    pub path: PathBuf,
    #[serde(skip)]
    pub baseline: Option<Baseline>,
}

impl ExtensionInstance {
    pub fn new(key: impl Into<String>, version: RawVersion, path: PathBuf) -> Self {
        Self {
            key: key.into(),
            version,
            modification: Modification::NotChecked,
            path,
            baseline: None,
        }
    }

    pub fn with_baseline(mut self, baseline: Option<Baseline>) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_modification(mut self, modification: Modification) -> Self {
        self.modification = modification;
        self
    }

    pub fn parsed_version(&self) -> Version {
        self.version.version()
    }

    pub fn raw_version(&self) -> &str {
        self.version.as_str()
    }
}

/// One deployment of the platform, identified by the directory that holds
/// its `typo3conf` folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    pub path: PathBuf,
    /// Keyed by extension key; ordered for reproducible output.
    pub extensions: BTreeMap<String, ExtensionInstance>,
}

impl Installation {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_extension(mut self, extension: ExtensionInstance) -> Self {
        self.extensions.insert(extension.key.clone(), extension);
        self
    }

    pub fn ext_dir(&self) -> PathBuf {
        self.path.join("typo3conf").join("ext")
    }
}
