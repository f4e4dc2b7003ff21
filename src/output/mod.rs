//! Output module for rendering audit reports
//!
//! This module handles:
//! - Rendering a report as pretty JSON (the wire format) or Markdown
//! - Writing the rendered report to a file or stdout

mod markdown;

pub use markdown::format_markdown_report;

use crate::audit::AuditReport;
use crate::config::ReportFormat;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Renders a report in the requested format
pub fn render_report(report: &AuditReport, format: ReportFormat) -> OutputResult<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::Markdown => Ok(format_markdown_report(report)),
    }
}

/// Writes a rendered report to `path`, or to stdout when `path` is `None`
///
/// # Arguments
///
/// * `report` - The assembled audit report
/// * `format` - JSON or Markdown
/// * `path` - Destination file; created or truncated
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Rendering or writing failed
pub fn write_report(
    report: &AuditReport,
    format: ReportFormat,
    path: Option<&Path>,
) -> OutputResult<()> {
    let mut rendered = render_report(report, format)?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    match path {
        Some(path) => {
            std::fs::write(path, rendered.as_bytes())?;
            tracing::info!("Report written to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(rendered.as_bytes())?;
            handle.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::assemble;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_write_json_report_to_file() {
        let report = assemble("example.com", Utc::now(), BTreeMap::new());
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_report(&report, ReportFormat::Json, Some(path.as_path())).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["domain"], "example.com");
        assert!(parsed["modules"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_render_markdown() {
        let report = assemble("example.com", Utc::now(), BTreeMap::new());
        let rendered = render_report(&report, ReportFormat::Markdown).unwrap();
        assert!(rendered.starts_with("# SEO Audit: example.com"));
    }
}
