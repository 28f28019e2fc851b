//! Extension version numbers.
//!
//! TYPO3 extensions use plain `major.minor.patch` versions. Only the first
//! three dot-separated fields are read; anything after a third dot is
//! ignored. Every one of the three fields must be a non-negative integer,
//! otherwise the string is not a version at all.
//!
//! # Ordering
//!
//! The registry tooling historically compared versions through a single
//! integer, `major * 10_000_000 + minor * 1_000 + patch`. That key is still
//! available as [`Version::encode`], but it overlaps once `minor >= 10_000`
//! or `patch >= 1_000` (`1.0.1000` and `1.1.0` encode identically). The
//! [`Ord`] implementation compares the fields directly instead, which agrees
//! with `encode` everywhere inside those ranges and stays correct beyond.
//!
//! ```
//! use t3scan::version::Version;
//!
//! let a: Version = "1.2.3".parse().unwrap();
//! let b: Version = "1.10.0".parse().unwrap();
//! assert!(a < b);
//! assert_eq!(a.encode(), 10_002_003);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Unparseable version: {0:?}")]
    Unparseable(String),
}

/// A parsed `major.minor.patch` version.
///
/// Field order matters: the derived ordering is lexicographic over
/// `(major, minor, patch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses the first three dot-separated fields of `raw`.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let mut fields = raw.split('.');
        let mut next = || -> Option<u32> {
            let field = fields.next()?.trim();
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            field.parse().ok()
        };

        match (next(), next(), next()) {
            (Some(major), Some(minor), Some(patch)) => Ok(Self::new(major, minor, patch)),
            _ => Err(VersionError::Unparseable(raw.to_string())),
        }
    }

    /// Legacy single-integer comparison key.
    pub fn encode(&self) -> u64 {
        u64::from(self.major) * 10_000_000 + u64::from(self.minor) * 1_000 + u64::from(self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A version together with the exact string it was read from.
///
/// Reports and ignore rules work on the raw text (`4.5.00` is not the same
/// ignore entry as `4.5.0`), comparisons work on the parsed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RawVersion {
    version: Version,
    raw: String,
}

impl RawVersion {
    pub fn parse(raw: impl Into<String>) -> Result<Self, VersionError> {
        let raw = raw.into();
        let version = Version::parse(&raw)?;
        Ok(Self { version, raw })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for RawVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RawVersion> for String {
    fn from(value: RawVersion) -> Self {
        value.raw
    }
}

impl fmt::Display for RawVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_basic() {
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("0.0.0"), Version::new(0, 0, 0));
        assert_eq!(v(" 4.5.06 "), Version::new(4, 5, 6));
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        assert_eq!(v("1.2.3.4"), Version::new(1, 2, 3));
        assert_eq!(v("1.2.3.dev"), Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_unparseable() {
        for raw in ["", "1", "1.2", "1..3", "a.b.c", "1.2.x", "1.2.3-dev", "-1.2.3", "1.2.99999999999"] {
            assert_eq!(
                Version::parse(raw),
                Err(VersionError::Unparseable(raw.to_string())),
                "{raw:?} should not parse"
            );
        }
    }

    #[test]
    fn test_format_then_parse_matches_direct_encode() {
        for (maj, min, patch) in [(0, 0, 0), (1, 2, 3), (999, 999, 999), (12, 0, 450), (3, 101, 7)] {
            let parsed = v(&format!("{maj}.{min}.{patch}"));
            assert_eq!(
                parsed.encode(),
                maj as u64 * 10_000_000 + min as u64 * 1_000 + patch as u64
            );
        }
    }

    #[test]
    fn test_ordering_chain() {
        let chain = [v("1.2.3"), v("1.2.4"), v("1.3.0"), v("2.0.0")];
        for (i, a) in chain.iter().enumerate() {
            for (j, b) in chain.iter().enumerate() {
                assert_eq!(a.cmp(b), i.cmp(&j), "{a} vs {b}");
            }
        }
        assert_eq!(v("1.2.3").cmp(&v("1.2.03")), Ordering::Equal);
    }

    #[test]
    fn test_ordering_transitive() {
        let samples = [v("0.9.9"), v("1.0.0"), v("1.0.10"), v("1.1.0"), v("10.0.0")];
        for a in &samples {
            for b in &samples {
                for c in &samples {
                    if a <= b && b <= c {
                        assert!(a <= c, "{a} <= {b} <= {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_ordering_beyond_encoding_range() {
        // encode() collides here, field comparison does not
        assert_eq!(v("1.0.1000").encode(), v("1.1.0").encode());
        assert!(v("1.0.1000") < v("1.1.0"));
    }

    #[test]
    fn test_raw_version_keeps_text() {
        let raw = RawVersion::parse("4.5.00").unwrap();
        assert_eq!(raw.as_str(), "4.5.00");
        assert_eq!(raw.version(), Version::new(4, 5, 0));
        assert!(RawVersion::parse("dev-main").is_err());
    }
}
