//! Error types for the audit engine.
//!
//! Variants are grouped by how the engine reacts to them: the first group
//! aborts a run, the second only drops the affected extension record.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`AuditError`].
pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
    // === Fatal ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("No instances found below {} at depth {depth}", root.display())]
    NoInstancesFound { root: PathBuf, depth: usize },

    #[error("Failed to fetch registry feed from {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Registry feed is not valid XML: {0}")]
    FeedParse(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Per record ===
    #[error("Unreadable extension metadata in {}: {message}", path.display())]
    Metadata { path: PathBuf, message: String },

    #[error("Invalid checksum baseline for extension {extension}: {message}")]
    Baseline { extension: String, message: String },
}

impl AuditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AuditError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error must terminate the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AuditError::Metadata { .. } | AuditError::Baseline { .. }
        )
    }
}
