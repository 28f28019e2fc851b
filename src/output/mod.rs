mod cli;
mod sarif;
mod text;

pub use cli::print_cli_table;
pub use sarif::{generate_sarif_string, print_sarif};
pub use text::{format_finding, generate_text_string, print_text};

use crate::model::AuditReport;
use anyhow::Result;

/// Output format for audit reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per finding
    Text,
    /// Human-readable tables with a summary
    Table,
    /// JSON format for programmatic use
    Json,
    /// SARIF format for code scanning uploads
    Sarif,
}

impl OutputFormat {
    /// Formats that draw progress spinners on the terminal.
    pub fn is_interactive(&self) -> bool {
        matches!(self, OutputFormat::Table)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(OutputFormat::Text),
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "sarif" => Ok(OutputFormat::Sarif),
            _ => Err(format!(
                "Unknown format: {}. Use 'text', 'table', 'json' or 'sarif'",
                s
            )),
        }
    }
}

pub fn print_result(report: &AuditReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print_text(report),
        OutputFormat::Table => print_cli_table(report),
        OutputFormat::Json => print_json(report),
        OutputFormat::Sarif => print_sarif(report),
    }
}

pub fn print_json(report: &AuditReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Format result to string for file output
pub fn format_result_to_string(report: &AuditReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(generate_text_string(report)),
        OutputFormat::Sarif => generate_sarif_string(report),
        // tables are for terminals; files get JSON
        OutputFormat::Json | OutputFormat::Table => Ok(serde_json::to_string_pretty(report)?),
    }
}
