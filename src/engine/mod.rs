//! Audit orchestration.
//!
//! A run has three phases that never re-enter:
//!
//! 1. **Load** - the registry feed becomes a [`RegistryIndex`] (see
//!    [`RegistryIndex::load`]); the engine is constructed around it.
//! 2. **Scan** - installations are discovered and read into a
//!    [`ScanSnapshot`]. Modified findings are raised here.
//! 3. **Evaluate** - the insecure and outdated passes run over the snapshot.
//!    Both are read-only, so they can run in any order and any number of
//!    times with identical results.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use t3scan::engine::{AuditEngine, AuditOptions};
//! use t3scan::registry::{FileFeed, RegistryIndex};
//! use t3scan::IgnoreRuleSet;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = RegistryIndex::load(&FileFeed::new("extensions.xml.gz")).await?;
//!     let engine = AuditEngine::new(
//!         registry,
//!         IgnoreRuleSet::parse("news=3.0.1"),
//!         AuditOptions::new().insecure().outdated(),
//!     );
//!
//!     let report = engine.run(Path::new("/var/www"), 2)?;
//!     println!("{} findings", report.findings.len());
//!     Ok(())
//! }
//! ```

mod options;

pub use options::{AuditOptions, IntegrityScope, ModifiedPolicy};

use crate::error::{AuditError, Result};
use crate::ignore::IgnoreRuleSet;
use crate::model::{sort_findings, AuditReport, ExtensionInstance, Finding, Installation};
use crate::registry::RegistryIndex;
use crate::scanner::{discover_installations, scan_installation, ScanContext, ScanOutcome};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Installations read during the scan phase, plus the Modified findings
/// raised while reading them.
#[derive(Debug, Clone, Default)]
pub struct ScanSnapshot {
    pub installations: Vec<Installation>,
    pub findings: Vec<Finding>,
}

impl ScanSnapshot {
    fn from_outcomes(outcomes: impl IntoIterator<Item = ScanOutcome>) -> Self {
        let mut snapshot = Self::default();
        for outcome in outcomes {
            snapshot.installations.push(outcome.installation);
            snapshot.findings.extend(outcome.findings);
        }
        snapshot.installations.sort_by(|a, b| a.path.cmp(&b.path));
        sort_findings(&mut snapshot.findings);
        snapshot
    }

    fn instances(&self) -> impl Iterator<Item = (&Path, &ExtensionInstance)> {
        self.installations.iter().flat_map(|installation| {
            installation
                .extensions
                .values()
                .map(move |ext| (installation.path.as_path(), ext))
        })
    }
}

/// An installation whose extension directory cannot be listed is kept with
/// no extensions; only discovery failures end the scan.
fn readable_or_empty(path: &Path, result: Result<ScanOutcome>) -> ScanOutcome {
    result.unwrap_or_else(|e| {
        warn!(installation = %path.display(), error = %e, "Skipping unreadable installation");
        ScanOutcome {
            installation: Installation::new(path.to_path_buf()),
            findings: Vec::new(),
        }
    })
}

pub struct AuditEngine {
    registry: RegistryIndex,
    ignore: IgnoreRuleSet,
    options: AuditOptions,
}

impl AuditEngine {
    pub fn new(registry: RegistryIndex, ignore: IgnoreRuleSet, options: AuditOptions) -> Self {
        Self {
            registry,
            ignore,
            options,
        }
    }

    pub fn options(&self) -> &AuditOptions {
        &self.options
    }

    pub fn registry(&self) -> &RegistryIndex {
        &self.registry
    }

    fn context(&self) -> ScanContext<'_> {
        ScanContext {
            options: &self.options,
            registry: &self.registry,
            ignore: &self.ignore,
        }
    }

    /// Scan phase, one installation after another.
    pub fn scan(&self, root: &Path, depth: usize) -> Result<ScanSnapshot> {
        let paths = discover_installations(root, depth)?;
        let outcomes = paths
            .iter()
            .map(|path| readable_or_empty(path, scan_installation(path, self.context())));
        Ok(ScanSnapshot::from_outcomes(outcomes))
    }

    /// Scan phase with each installation read on the blocking thread pool.
    ///
    /// The snapshot is identical to [`scan`](Self::scan).
    pub async fn scan_concurrent(self: &Arc<Self>, root: &Path, depth: usize) -> Result<ScanSnapshot> {
        let paths = discover_installations(root, depth)?;

        let tasks = paths.into_iter().map(|path| {
            let engine = Arc::clone(self);
            tokio::task::spawn_blocking(move || {
                readable_or_empty(&path, scan_installation(&path, engine.context()))
            })
        });

        let mut outcomes = Vec::new();
        for joined in join_all(tasks).await {
            let outcome = joined.map_err(|e| AuditError::Io {
                path: PathBuf::from(root),
                source: std::io::Error::other(e),
            })?;
            outcomes.push(outcome);
        }
        Ok(ScanSnapshot::from_outcomes(outcomes))
    }

    /// Evaluate phase: runs the enabled passes and returns all findings,
    /// including those raised during the scan, in stable order.
    pub fn evaluate(&self, snapshot: &ScanSnapshot) -> Vec<Finding> {
        let mut findings = snapshot.findings.clone();
        if self.options.search_insecure {
            findings.extend(self.insecure_findings(snapshot));
        }
        if self.options.search_outdated {
            findings.extend(self.outdated_findings(snapshot));
        }
        sort_findings(&mut findings);
        findings
    }

    /// Scan and evaluate in one call.
    pub fn run(&self, root: &Path, depth: usize) -> Result<AuditReport> {
        let snapshot = self.scan(root, depth)?;
        Ok(self.report(snapshot))
    }

    /// Evaluates `snapshot` and wraps everything into a report.
    pub fn report(&self, snapshot: ScanSnapshot) -> AuditReport {
        let findings = self.evaluate(&snapshot);
        info!(
            installations = snapshot.installations.len(),
            findings = findings.len(),
            "Audit finished"
        );
        AuditReport::new(snapshot.installations, findings)
    }

    fn excluded(&self, ext: &ExtensionInstance) -> bool {
        self.options.modified.excludes() && ext.modification.is_modified()
    }

    /// Flags an instance if any registered insecure version is at or above
    /// the installed one. Only the first matching entry is reported.
    pub fn insecure_findings(&self, snapshot: &ScanSnapshot) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (path, ext) in snapshot.instances() {
            if self.excluded(ext) {
                continue;
            }

            let installed = ext.parsed_version();
            let hit = self
                .registry
                .insecure_versions_of(&ext.key)
                .iter()
                .any(|insecure| {
                    insecure.version() >= installed
                        && !self.ignore.is_ignored(&ext.key, ext.raw_version())
                });

            if hit {
                debug!(extension = %ext.key, version = ext.raw_version(), "Insecure");
                findings.push(Finding::insecure(path.to_path_buf(), &ext.key, ext.raw_version()));
            }
        }

        findings
    }

    /// Flags an instance whose version is below the newest one the registry
    /// lists. Extensions unknown to the registry are never outdated.
    pub fn outdated_findings(&self, snapshot: &ScanSnapshot) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (path, ext) in snapshot.instances() {
            if self.excluded(ext) {
                continue;
            }

            let Some(newest) = self.registry.newest_version_of(&ext.key) else {
                continue;
            };

            if ext.parsed_version() < newest.version()
                && !self.ignore.is_ignored(&ext.key, ext.raw_version())
            {
                findings.push(Finding::outdated(
                    path.to_path_buf(),
                    &ext.key,
                    ext.raw_version(),
                    newest.as_str(),
                ));
            }
        }

        findings
    }
}
