use crate::model::{AuditReport, Finding, FindingKind};
use anyhow::Result;

/// Single-line description of a finding.
pub fn format_finding(finding: &Finding) -> String {
    let path = finding.installation.display();
    match finding.kind {
        FindingKind::Insecure => format!(
            "Insecure Extension: {} ({}) found in {}",
            finding.extension, finding.version, path
        ),
        FindingKind::Outdated => format!(
            "Old Extension: {} ({} / {}) found in {}",
            finding.extension,
            finding.version,
            finding.newest_version.as_deref().unwrap_or("?"),
            path
        ),
        FindingKind::Modified => format!(
            "Modified Extension: {} ({}) found in {}",
            finding.extension, finding.version, path
        ),
    }
}

pub fn generate_text_string(report: &AuditReport) -> String {
    report
        .findings
        .iter()
        .map(|f| format_finding(f) + "\n")
        .collect()
}

pub fn print_text(report: &AuditReport) -> Result<()> {
    print!("{}", generate_text_string(report));
    Ok(())
}
