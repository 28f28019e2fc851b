//! Operator-supplied exceptions.
//!
//! The rule list is a single comma separated string such as
//! `news,powermail=2.1.4,powermail=2.1.5`. A bare key exempts every version
//! of that extension; `key=version` exempts exactly that raw version string.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct IgnoreRule {
    all_versions: bool,
    versions: BTreeSet<String>,
}

/// Parsed set of ignore rules, keyed by extension key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct IgnoreRuleSet {
    rules: HashMap<String, IgnoreRule>,
    source: String,
}

impl IgnoreRuleSet {
    /// Parses a comma separated rule list. Empty tokens are skipped.
    pub fn parse(list: &str) -> Self {
        let mut rules: HashMap<String, IgnoreRule> = HashMap::new();

        for token in list.split(',') {
            let (key, version) = match token.split_once('=') {
                Some((key, version)) => (key.trim(), Some(version.trim())),
                None => (token.trim(), None),
            };
            if key.is_empty() {
                continue;
            }

            let rule = rules.entry(key.to_string()).or_default();
            match version {
                Some(version) => {
                    rule.versions.insert(version.to_string());
                }
                None => rule.all_versions = true,
            }
        }

        Self {
            rules,
            source: list.to_string(),
        }
    }

    /// Returns true if findings for `key` at `raw_version` are suppressed.
    ///
    /// Versions are compared as text, so `4.5.0` does not cover `4.5.00`.
    pub fn is_ignored(&self, key: &str, raw_version: &str) -> bool {
        self.rules
            .get(key)
            .map(|rule| rule.all_versions || rule.versions.contains(raw_version))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

impl FromStr for IgnoreRuleSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for IgnoreRuleSet {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<IgnoreRuleSet> for String {
    fn from(value: IgnoreRuleSet) -> Self {
        value.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_and_exact() {
        let rules = IgnoreRuleSet::parse("foo,bar=1.0.0");

        assert!(rules.is_ignored("foo", "9.9.9"));
        assert!(rules.is_ignored("bar", "1.0.0"));
        assert!(!rules.is_ignored("bar", "2.0.0"));
        assert!(!rules.is_ignored("baz", "1.0.0"));
    }

    #[test]
    fn test_tokens_accumulate() {
        let rules = IgnoreRuleSet::parse("bar=1.0.0, bar=1.0.1 ,bar");

        assert_eq!(rules.len(), 1);
        assert!(rules.is_ignored("bar", "1.0.1"));
        // wildcard wins over the explicit entries
        assert!(rules.is_ignored("bar", "7.0.0"));
    }

    #[test]
    fn test_raw_string_comparison() {
        let rules = IgnoreRuleSet::parse("news=4.5.0");

        assert!(rules.is_ignored("news", "4.5.0"));
        assert!(!rules.is_ignored("news", "4.5.00"));
    }

    #[test]
    fn test_splits_on_first_equals() {
        let rules = IgnoreRuleSet::parse("odd=1.0.0=x");

        assert!(rules.is_ignored("odd", "1.0.0=x"));
        assert!(!rules.is_ignored("odd", "1.0.0"));
    }

    #[test]
    fn test_empty_list() {
        let rules = IgnoreRuleSet::parse("");
        assert!(rules.is_empty());
        assert!(!rules.is_ignored("news", "1.0.0"));

        let rules = IgnoreRuleSet::parse(" , ,");
        assert!(rules.is_empty());
    }
}
