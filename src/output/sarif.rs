//! SARIF (Static Analysis Results Interchange Format) output.
//!
//! Each finding kind becomes one rule; each finding one result located at
//! the extension's directory inside its installation.

use crate::model::{AuditReport, Finding, FindingKind};
use anyhow::Result;
use serde::Serialize;

const SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

/// SARIF v2.1.0 schema root
#[derive(Serialize)]
struct SarifReport {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: &'static str,
    version: &'static str,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
struct SarifRule {
    id: &'static str,
    name: &'static str,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "defaultConfiguration")]
    default_configuration: SarifRuleConfiguration,
}

#[derive(Serialize)]
struct SarifRuleConfiguration {
    level: &'static str,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: &'static str,
    level: &'static str,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifactLocation,
}

#[derive(Serialize)]
struct SarifArtifactLocation {
    uri: String,
}

const KINDS: [FindingKind; 3] = [
    FindingKind::Insecure,
    FindingKind::Modified,
    FindingKind::Outdated,
];

fn rule_id(kind: FindingKind) -> &'static str {
    match kind {
        FindingKind::Insecure => "T3S001",
        FindingKind::Modified => "T3S002",
        FindingKind::Outdated => "T3S003",
    }
}

fn level(kind: FindingKind) -> &'static str {
    match kind {
        FindingKind::Insecure => "error",
        FindingKind::Modified => "warning",
        FindingKind::Outdated => "note",
    }
}

fn description(kind: FindingKind) -> &'static str {
    match kind {
        FindingKind::Insecure => "Installed extension version is flagged insecure by the registry",
        FindingKind::Modified => "Extension files differ from their recorded checksums",
        FindingKind::Outdated => "A newer extension version is available",
    }
}

fn to_result(finding: &Finding) -> SarifResult {
    let text = match &finding.newest_version {
        Some(newest) => format!(
            "{} extension {} {} (latest {})",
            finding.kind, finding.extension, finding.version, newest
        ),
        None => format!(
            "{} extension {} {}",
            finding.kind, finding.extension, finding.version
        ),
    };

    let uri = finding
        .installation
        .join("typo3conf")
        .join("ext")
        .join(&finding.extension)
        .display()
        .to_string();

    SarifResult {
        rule_id: rule_id(finding.kind),
        level: level(finding.kind),
        message: SarifMessage { text },
        locations: vec![SarifLocation {
            physical_location: SarifPhysicalLocation {
                artifact_location: SarifArtifactLocation { uri },
            },
        }],
    }
}

/// Generate SARIF as a string
pub fn generate_sarif_string(report: &AuditReport) -> Result<String> {
    let rules = KINDS
        .iter()
        .map(|&kind| SarifRule {
            id: rule_id(kind),
            name: kind.display_name(),
            short_description: SarifMessage {
                text: description(kind).to_string(),
            },
            default_configuration: SarifRuleConfiguration { level: level(kind) },
        })
        .collect();

    let sarif = SarifReport {
        schema: SCHEMA,
        version: "2.1.0",
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "t3scan",
                    version: env!("CARGO_PKG_VERSION"),
                    rules,
                },
            },
            results: report.findings.iter().map(to_result).collect(),
        }],
    };

    Ok(serde_json::to_string_pretty(&sarif)?)
}

/// Generate and print SARIF output
pub fn print_sarif(report: &AuditReport) -> Result<()> {
    println!("{}", generate_sarif_string(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_sarif_results() {
        let report = AuditReport::new(
            Vec::new(),
            vec![
                Finding::outdated(PathBuf::from("/www/a"), "news", "1.0.0", "2.0.0"),
                Finding::insecure(PathBuf::from("/www/a"), "news", "1.0.0"),
            ],
        );

        let value: serde_json::Value =
            serde_json::from_str(&generate_sarif_string(&report).unwrap()).unwrap();
        let run = &value["runs"][0];

        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 3);
        let results = run["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["ruleId"], "T3S001");
        assert_eq!(results[0]["level"], "error");
        assert_eq!(
            results[1]["message"]["text"],
            "Outdated extension news 1.0.0 (latest 2.0.0)"
        );
        assert_eq!(
            results[1]["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "/www/a/typo3conf/ext/news"
        );
    }
}
