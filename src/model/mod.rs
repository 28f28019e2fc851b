//! Core data types for installations, extensions and audit findings.
//!
//! - [`Installation`] - One deployment discovered on disk
//! - [`ExtensionInstance`] - An extension installed in one installation
//! - [`Finding`] - A single reportable result
//! - [`AuditReport`] - Everything handed to the reporter
//!
//! # Example
//!
//! ```
//! use std::path::PathBuf;
//! use t3scan::model::{AuditReport, Finding};
//!
//! let finding = Finding::insecure(PathBuf::from("/var/www/site/"), "news", "3.0.1");
//! let report = AuditReport::new(Vec::new(), vec![finding]);
//!
//! println!("{} findings", report.findings.len());
//! ```

mod extension;
mod finding;

pub use extension::*;
pub use finding::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete result of one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub scan_time: DateTime<Utc>,
    pub installations: Vec<Installation>,
    pub findings: Vec<Finding>,
}

impl AuditReport {
    /// Builds a report; findings are put into stable order.
    pub fn new(installations: Vec<Installation>, mut findings: Vec<Finding>) -> Self {
        sort_findings(&mut findings);
        Self {
            scan_time: Utc::now(),
            installations,
            findings,
        }
    }

    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind == kind).count()
    }

    pub fn has(&self, kind: FindingKind) -> bool {
        self.findings.iter().any(|f| f.kind == kind)
    }

    pub fn extension_count(&self) -> usize {
        self.installations.iter().map(|i| i.extensions.len()).sum()
    }
}
