//! Installation discovery and per-installation extension scanning.
//!
//! Installations are found by looking for `typo3conf` directories exactly
//! `depth` levels below a root, where every intermediate level matches any
//! directory name (like the shell glob `root/*/*/typo3conf` for depth 2).
//! Each installation's `typo3conf/ext/<key>/ext_emconf.php` files describe
//! its extensions.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use t3scan::scanner::discover_installations;
//!
//! for path in discover_installations(Path::new("/var/www"), 2)? {
//!     println!("{}", path.display());
//! }
//! # Ok::<(), t3scan::AuditError>(())
//! ```

mod emconf;

pub use emconf::{parse_emconf, EmConf, EMCONF_FILE};

use crate::engine::{AuditOptions, IntegrityScope};
use crate::error::{AuditError, Result};
use crate::ignore::IgnoreRuleSet;
use crate::integrity::{self, Baseline};
use crate::model::{ExtensionInstance, Finding, Installation, Modification};
use crate::registry::RegistryIndex;
use crate::version::RawVersion;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Name of the directory marking an installation.
pub const INSTANCE_MARKER: &str = "typo3conf";

/// Read-only collaborators a scan consults.
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub options: &'a AuditOptions,
    pub registry: &'a RegistryIndex,
    pub ignore: &'a IgnoreRuleSet,
}

/// Extensions of one installation plus any Modified findings raised while
/// reading them.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub installation: Installation,
    pub findings: Vec<Finding>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Returns the installation directories (the parents of each matching
/// `typo3conf`), in lexical order.
///
/// # Errors
///
/// [`AuditError::NoInstancesFound`] if nothing matches.
pub fn discover_installations(root: &Path, depth: usize) -> Result<Vec<PathBuf>> {
    let marker_depth = depth + 1;
    let walker = WalkDir::new(root)
        .max_depth(marker_depth)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || (e.file_type().is_dir() && !is_hidden(e)));

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path during discovery");
                continue;
            }
        };
        if entry.depth() != marker_depth || entry.file_name() != INSTANCE_MARKER {
            continue;
        }
        if let Some(parent) = entry.path().parent() {
            found.push(parent.to_path_buf());
        }
    }

    if found.is_empty() {
        return Err(AuditError::NoInstancesFound {
            root: root.to_path_buf(),
            depth,
        });
    }

    info!(count = found.len(), root = %root.display(), "Discovered installations");
    Ok(found)
}

/// Reads every extension of the installation at `path`.
///
/// Extensions whose metadata is missing, unreadable or carries an
/// unparseable version are skipped with a warning.
pub fn scan_installation(path: &Path, ctx: ScanContext<'_>) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome {
        installation: Installation::new(path.to_path_buf()),
        findings: Vec::new(),
    };

    let ext_dir = outcome.installation.ext_dir();
    if !ext_dir.is_dir() {
        debug!(path = %path.display(), "Installation has no extension directory");
        return Ok(outcome);
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(&ext_dir)
        .map_err(|e| AuditError::io(&ext_dir, e))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.join(EMCONF_FILE).is_file())
        .collect();
    dirs.sort();

    for ext_path in dirs {
        let Some(key) = ext_path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };

        match scan_extension(&key, &ext_path, ctx) {
            Ok(instance) => {
                if instance.modification.is_modified()
                    && ctx.options.modified.reports()
                    && !ctx.ignore.is_ignored(&key, instance.raw_version())
                {
                    outcome
                        .findings
                        .push(Finding::modified(path.to_path_buf(), &key, instance.raw_version()));
                }
                outcome.installation.extensions.insert(key, instance);
            }
            Err(e) => warn!(extension = %key, installation = %path.display(), "{e}"),
        }
    }

    debug!(
        path = %path.display(),
        extensions = outcome.installation.extensions.len(),
        "Scanned installation"
    );
    Ok(outcome)
}

fn scan_extension(key: &str, ext_path: &Path, ctx: ScanContext<'_>) -> Result<ExtensionInstance> {
    let emconf_path = ext_path.join(EMCONF_FILE);
    let content = fs::read(&emconf_path).map_err(|e| AuditError::Metadata {
        path: emconf_path.clone(),
        message: e.to_string(),
    })?;
    let conf = parse_emconf(&String::from_utf8_lossy(&content));

    let raw = conf.version.ok_or_else(|| AuditError::Metadata {
        path: emconf_path.clone(),
        message: "no version field".to_string(),
    })?;
    let version = RawVersion::parse(raw).map_err(|e| AuditError::Metadata {
        path: emconf_path.clone(),
        message: e.to_string(),
    })?;

    let needs_check = ctx.options.modified.requires_check();
    let baseline = match conf.checksums {
        Some(blob) => match Baseline::from_serialized(&blob) {
            Ok(baseline) => Some(baseline),
            Err(e) if needs_check => {
                return Err(AuditError::Baseline {
                    extension: key.to_string(),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                debug!(extension = key, error = %e, "Ignoring unreadable checksum baseline");
                None
            }
        },
        None => None,
    };

    let modification = match &baseline {
        Some(baseline) if needs_check && in_integrity_scope(key, ctx) => {
            if integrity::is_modified(ext_path, baseline) {
                Modification::Modified
            } else {
                Modification::Unmodified
            }
        }
        _ => Modification::NotChecked,
    };

    Ok(ExtensionInstance::new(key, version, ext_path.to_path_buf())
        .with_baseline(baseline)
        .with_modification(modification))
}

fn in_integrity_scope(key: &str, ctx: ScanContext<'_>) -> bool {
    match ctx.options.integrity_scope {
        IntegrityScope::AllExtensions => true,
        IntegrityScope::RegisteredOnly => ctx.registry.exists_in_registry(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ModifiedPolicy;
    use crate::registry::{FeedExtension, FeedVersion};
    use tempfile::TempDir;

    fn write_ext(installation: &Path, key: &str, emconf: &str) -> PathBuf {
        let dir = installation.join("typo3conf/ext").join(key);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(EMCONF_FILE), emconf).unwrap();
        dir
    }

    fn emconf(version: &str, checksums: Option<&str>) -> String {
        let md5 = checksums
            .map(|c| format!("'_md5_values_when_last_written' => '{c}',"))
            .unwrap_or_default();
        format!("<?php $EM_CONF[$_EXTKEY] = array('version' => '{version}', {md5});")
    }

    #[test]
    fn test_discover_at_exact_depth() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("a/site1/typo3conf")).unwrap();
        fs::create_dir_all(root.path().join("b/site2/typo3conf")).unwrap();
        // wrong depth
        fs::create_dir_all(root.path().join("shallow/typo3conf")).unwrap();
        fs::create_dir_all(root.path().join("a/b/deep/typo3conf")).unwrap();
        // hidden levels do not match a wildcard
        fs::create_dir_all(root.path().join(".trash/site3/typo3conf")).unwrap();
        // a file, not a directory
        fs::create_dir_all(root.path().join("c/site4")).unwrap();
        fs::write(root.path().join("c/site4/typo3conf"), "").unwrap();

        let found = discover_installations(root.path(), 2).unwrap();
        assert_eq!(
            found,
            vec![root.path().join("a/site1"), root.path().join("b/site2")]
        );
    }

    #[test]
    fn test_discover_skips_hidden_levels() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("www/site/typo3conf")).unwrap();
        fs::create_dir_all(root.path().join(".snapshots/site/typo3conf")).unwrap();
        fs::create_dir_all(root.path().join("www/.old/typo3conf")).unwrap();

        let found = discover_installations(root.path(), 2).unwrap();
        assert_eq!(found, vec![root.path().join("www/site")]);

        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join(".hidden/typo3conf")).unwrap();
        assert!(matches!(
            discover_installations(root.path(), 1),
            Err(AuditError::NoInstancesFound { depth: 1, .. })
        ));
    }

    #[test]
    fn test_discover_depth_zero() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("typo3conf")).unwrap();

        let found = discover_installations(root.path(), 0).unwrap();
        assert_eq!(found, vec![root.path().to_path_buf()]);
    }

    #[test]
    fn test_discover_none_is_error() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("a/typo3conf")).unwrap();

        let err = discover_installations(root.path(), 2).unwrap_err();
        assert!(matches!(err, AuditError::NoInstancesFound { depth: 2, .. }));
    }

    #[test]
    fn test_scan_skips_bad_records() {
        let site = TempDir::new().unwrap();
        write_ext(site.path(), "news", &emconf("3.0.1", None));
        write_ext(site.path(), "dev_only", &emconf("dev-main", None));
        write_ext(site.path(), "no_version", "<?php $EM_CONF[$_EXTKEY] = array();");
        fs::create_dir_all(site.path().join("typo3conf/ext/not_an_ext")).unwrap();

        let options = AuditOptions::new();
        let registry = RegistryIndex::default();
        let ignore = IgnoreRuleSet::default();
        let ctx = ScanContext {
            options: &options,
            registry: &registry,
            ignore: &ignore,
        };

        let outcome = scan_installation(site.path(), ctx).unwrap();
        let keys: Vec<_> = outcome.installation.extensions.keys().cloned().collect();
        assert_eq!(keys, vec!["news"]);
        assert_eq!(
            outcome.installation.extensions["news"].modification,
            Modification::NotChecked
        );
    }

    #[test]
    fn test_scan_reports_modified() {
        let site = TempDir::new().unwrap();
        let dir = write_ext(
            site.path(),
            "news",
            &emconf("3.0.1", Some(r#"a:1:{s:5:"a.php";s:4:"abcd";}"#)),
        );
        fs::write(dir.join("a.php"), "tampered").unwrap();
        let dir = write_ext(
            site.path(),
            "seo",
            &emconf("1.0.0", Some(r#"a:1:{s:5:"a.php";s:4:"5d41";}"#)),
        );
        fs::write(dir.join("a.php"), "hello").unwrap();

        let options = AuditOptions::new().modified(ModifiedPolicy::Report);
        let registry = RegistryIndex::default();
        let ignore = IgnoreRuleSet::default();
        let ctx = ScanContext {
            options: &options,
            registry: &registry,
            ignore: &ignore,
        };

        let outcome = scan_installation(site.path(), ctx).unwrap();
        let exts = &outcome.installation.extensions;
        assert_eq!(exts["news"].modification, Modification::Modified);
        assert_eq!(exts["seo"].modification, Modification::Unmodified);
        assert_eq!(
            outcome.findings,
            vec![Finding::modified(site.path().to_path_buf(), "news", "3.0.1")]
        );

        let ignore = IgnoreRuleSet::parse("news=3.0.1");
        let ctx = ScanContext { ignore: &ignore, ..ctx };
        let outcome = scan_installation(site.path(), ctx).unwrap();
        assert!(outcome.findings.is_empty());
        assert!(outcome.installation.extensions["news"].modification.is_modified());
    }

    #[test]
    fn test_scan_registered_only_scope() {
        let site = TempDir::new().unwrap();
        let dir = write_ext(
            site.path(),
            "local_ext",
            &emconf("1.0.0", Some(r#"a:1:{s:5:"a.php";s:4:"abcd";}"#)),
        );
        fs::write(dir.join("a.php"), "changed").unwrap();

        let options = AuditOptions::new()
            .modified(ModifiedPolicy::Report)
            .integrity_scope(IntegrityScope::RegisteredOnly);
        let registry = RegistryIndex::from_feed(vec![FeedExtension::new(
            "news",
            vec![FeedVersion::new("1.0.0", 0)],
        )]);
        let ignore = IgnoreRuleSet::default();
        let ctx = ScanContext {
            options: &options,
            registry: &registry,
            ignore: &ignore,
        };

        let outcome = scan_installation(site.path(), ctx).unwrap();
        assert_eq!(
            outcome.installation.extensions["local_ext"].modification,
            Modification::NotChecked
        );
        assert!(outcome.findings.is_empty());
    }

    #[test]
    fn test_bad_baseline_skips_only_when_checked() {
        let site = TempDir::new().unwrap();
        write_ext(site.path(), "broken", &emconf("1.0.0", Some("a:9:{garbage")));
        write_ext(site.path(), "fine", &emconf("1.0.0", None));

        let registry = RegistryIndex::default();
        let ignore = IgnoreRuleSet::default();

        let checked = AuditOptions::new().modified(ModifiedPolicy::Exclude);
        let ctx = ScanContext {
            options: &checked,
            registry: &registry,
            ignore: &ignore,
        };
        let outcome = scan_installation(site.path(), ctx).unwrap();
        assert!(!outcome.installation.extensions.contains_key("broken"));
        assert!(outcome.installation.extensions.contains_key("fine"));

        let unchecked = AuditOptions::new();
        let ctx = ScanContext {
            options: &unchecked,
            ..ctx
        };
        let outcome = scan_installation(site.path(), ctx).unwrap();
        assert!(outcome.installation.extensions.contains_key("broken"));
    }
}
