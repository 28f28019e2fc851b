use serde::{Deserialize, Serialize};

/// How locally modified extensions are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModifiedPolicy {
    /// Checksums are not computed at all.
    #[default]
    Disregard,
    /// Emit a Modified finding for each modified extension.
    Report,
    /// Leave modified extensions out of the insecure and outdated passes.
    Exclude,
    /// Both of the above.
    ReportAndExclude,
}

impl ModifiedPolicy {
    pub fn from_flags(report: bool, exclude: bool) -> Self {
        match (report, exclude) {
            (false, false) => ModifiedPolicy::Disregard,
            (true, false) => ModifiedPolicy::Report,
            (false, true) => ModifiedPolicy::Exclude,
            (true, true) => ModifiedPolicy::ReportAndExclude,
        }
    }

    pub fn reports(&self) -> bool {
        matches!(self, ModifiedPolicy::Report | ModifiedPolicy::ReportAndExclude)
    }

    pub fn excludes(&self) -> bool {
        matches!(self, ModifiedPolicy::Exclude | ModifiedPolicy::ReportAndExclude)
    }

    /// Checksums are only worth reading if the outcome is used.
    pub fn requires_check(&self) -> bool {
        *self != ModifiedPolicy::Disregard
    }
}

/// Which extensions get their checksums verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrityScope {
    #[default]
    AllExtensions,
    /// Only extensions the registry knows about.
    RegisteredOnly,
}

/// Everything that decides what an audit run looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuditOptions {
    pub search_insecure: bool,
    pub search_outdated: bool,
    pub modified: ModifiedPolicy,
    pub integrity_scope: IntegrityScope,
}

impl AuditOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insecure(mut self) -> Self {
        self.search_insecure = true;
        self
    }

    pub fn outdated(mut self) -> Self {
        self.search_outdated = true;
        self
    }

    pub fn modified(mut self, policy: ModifiedPolicy) -> Self {
        self.modified = policy;
        self
    }

    pub fn integrity_scope(mut self, scope: IntegrityScope) -> Self {
        self.integrity_scope = scope;
        self
    }

    /// True if the run would produce no findings at all.
    pub fn is_noop(&self) -> bool {
        !self.search_insecure && !self.search_outdated && !self.modified.reports()
    }
}
