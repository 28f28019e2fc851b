use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of audit result. Variant order is the report sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Insecure,
    Modified,
    Outdated,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Insecure => "insecure",
            FindingKind::Modified => "modified",
            FindingKind::Outdated => "outdated",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FindingKind::Insecure => "Insecure",
            FindingKind::Modified => "Modified",
            FindingKind::Outdated => "Outdated",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub installation: PathBuf,
    pub extension: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_version: Option<String>,
}

impl Finding {
    pub fn insecure(installation: PathBuf, extension: &str, version: &str) -> Self {
        Self {
            kind: FindingKind::Insecure,
            installation,
            extension: extension.to_string(),
            version: version.to_string(),
            newest_version: None,
        }
    }

    pub fn modified(installation: PathBuf, extension: &str, version: &str) -> Self {
        Self {
            kind: FindingKind::Modified,
            ..Self::insecure(installation, extension, version)
        }
    }

    pub fn outdated(installation: PathBuf, extension: &str, version: &str, newest: &str) -> Self {
        Self {
            kind: FindingKind::Outdated,
            newest_version: Some(newest.to_string()),
            ..Self::insecure(installation, extension, version)
        }
    }

    /// Sort key used for stable report output.
    fn order_key(&self) -> (&std::path::Path, &str, FindingKind) {
        (self.installation.as_path(), &self.extension, self.kind)
    }
}

/// Sorts findings by installation, extension, then kind.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| a.order_key().cmp(&b.order_key()).then_with(|| a.cmp(b)));
}
