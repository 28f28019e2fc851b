use crate::model::{AuditReport, Finding, FindingKind};
use crate::version::Version;
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Extension")]
    extension: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Installation")]
    installation: String,
}

#[derive(Tabled)]
struct OutdatedRow {
    #[tabled(rename = "Extension")]
    extension: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Type")]
    update_type: String,
    #[tabled(rename = "Installation")]
    installation: String,
}

pub fn print_cli_table(report: &AuditReport) -> Result<()> {
    println!();
    println!(
        "Audit completed at: {}",
        report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Scanned {} extensions in {} installations.",
        report.extension_count(),
        report.installations.len()
    );

    print_kind(report, FindingKind::Insecure, "\x1b[31minsecure\x1b[0m");
    print_kind(report, FindingKind::Modified, "\x1b[33mmodified\x1b[0m");
    print_outdated(report);

    println!();
    print_summary(report);

    Ok(())
}

fn of_kind(report: &AuditReport, kind: FindingKind) -> impl Iterator<Item = &Finding> {
    report.findings.iter().filter(move |f| f.kind == kind)
}

fn print_kind(report: &AuditReport, kind: FindingKind, label: &str) {
    let rows: Vec<FindingRow> = of_kind(report, kind)
        .map(|f| FindingRow {
            extension: truncate(&f.extension, 40),
            version: f.version.clone(),
            installation: f.installation.display().to_string(),
        })
        .collect();

    if rows.is_empty() {
        return;
    }

    println!();
    println!("Found {} {} extensions:", rows.len(), label);
    println!();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn print_outdated(report: &AuditReport) {
    let rows: Vec<OutdatedRow> = of_kind(report, FindingKind::Outdated)
        .map(|f| {
            let latest = f.newest_version.clone().unwrap_or_default();
            OutdatedRow {
                extension: truncate(&f.extension, 40),
                update_type: classify_update(&f.version, &latest),
                current: f.version.clone(),
                latest,
                installation: f.installation.display().to_string(),
            }
        })
        .collect();

    if rows.is_empty() {
        return;
    }

    println!();
    println!("Found {} outdated extensions:", rows.len());
    println!();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn print_summary(report: &AuditReport) {
    let insecure = report.count(FindingKind::Insecure);
    let modified = report.count(FindingKind::Modified);
    let outdated = report.count(FindingKind::Outdated);

    if insecure + modified + outdated == 0 {
        println!("\x1b[32mNo findings.\x1b[0m");
        return;
    }

    println!(
        "Summary: {} insecure, {} modified, {} outdated",
        insecure, modified, outdated
    );
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

/// Classify version update as major, minor, or patch
fn classify_update(current: &str, latest: &str) -> String {
    match (Version::parse(current), Version::parse(latest)) {
        (Ok(c), Ok(l)) if l.major > c.major => "MAJOR".to_string(),
        (Ok(c), Ok(l)) if l.major == c.major && l.minor > c.minor => "minor".to_string(),
        (Ok(_), Ok(_)) => "patch".to_string(),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_update() {
        assert_eq!(classify_update("1.2.3", "2.0.0"), "MAJOR");
        assert_eq!(classify_update("1.2.3", "1.3.0"), "minor");
        assert_eq!(classify_update("1.2.3", "1.2.4"), "patch");
        assert_eq!(classify_update("1.2.3", ""), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("news", 10), "news");
        assert_eq!(truncate("a_very_long_extension_key", 10), "a_very_...");
    }
}
