//! Local modification detection.
//!
//! When an extension is installed, the platform records a short checksum of
//! every file in `ext_emconf.php` (`_md5_values_when_last_written`). Comparing
//! those against the files on disk reveals local edits, which may hide or
//! revert a security fix.
//!
//! The checksum is the first four hex characters of the file's MD5. It is a
//! change detector, not an integrity guarantee: collisions are expected.

mod phpser;

pub use phpser::{unserialize, PhpSerError, PhpValue};

use md5::{Digest, Md5};
use std::fs;
use std::path::{Component, Path};
use tracing::{debug, warn};

/// Number of hex characters kept from the digest.
pub const CHECKSUM_LEN: usize = 4;

/// Recorded per-file checksums, in the order they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    entries: Vec<(String, String)>,
}

impl Baseline {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Decodes the serialized array stored in extension metadata.
    pub fn from_serialized(blob: &str) -> Result<Self, PhpSerError> {
        let PhpValue::Array(pairs) = unserialize(blob)? else {
            return Err(PhpSerError::Unexpected {
                pos: 0,
                expected: "array",
            });
        };

        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let (Some(file), Some(sum)) = (key.as_scalar_string(), value.as_scalar_string()) else {
                return Err(PhpSerError::Unexpected {
                    pos: 0,
                    expected: "string checksum",
                });
            };
            entries.push((file, sum));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, s)| (f.as_str(), s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Truncated MD5 of `bytes`, lowercase hex.
pub fn checksum(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Md5::digest(bytes));
    digest[..CHECKSUM_LEN].to_string()
}

/// Returns true as soon as one listed file's checksum differs from the
/// baseline.
///
/// Files listed in the baseline that no longer exist are not counted as
/// modifications. Entries pointing outside `root` are skipped.
pub fn is_modified(root: &Path, baseline: &Baseline) -> bool {
    for (file, expected) in baseline.entries() {
        let relative = Path::new(file);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            warn!(file, root = %root.display(), "Skipping baseline entry outside extension");
            continue;
        }

        let path = root.join(relative);
        if !path.is_file() {
            continue;
        }

        let content = match fs::read(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read file for checksum");
                continue;
            }
        };

        let actual = checksum(&content);
        if !actual.eq_ignore_ascii_case(expected) {
            debug!(path = %path.display(), expected, actual = %actual, "Checksum mismatch");
            return true;
        }
    }

    false
}
