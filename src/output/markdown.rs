//! Markdown report generation
//!
//! Produces a human-readable summary of an audit: run information, severity
//! totals, a per-module status table, then each module's issues and
//! recommendations ordered from most to least severe.

use crate::audit::AuditReport;
use crate::checks::{CheckResult, Severity};

/// Issues listed per module before the rest are summarized
const MAX_ISSUES_PER_MODULE: usize = 25;

/// Formats an audit report as markdown
pub fn format_markdown_report(report: &AuditReport) -> String {
    let mut md = String::new();

    md.push_str(&format!("# SEO Audit: {}\n\n", report.domain));

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Timestamp**: {}\n", report.timestamp.to_rfc3339()));
    md.push_str(&format!("- **Crawl Status**: {}\n", report.crawl.status));
    md.push_str(&format!("- **Pages Visited**: {}\n", report.crawl.pages_visited));
    md.push_str(&format!("- **Pages Skipped**: {}\n", report.crawl.pages_skipped));
    md.push_str(&format!(
        "- **Max Depth Reached**: {}\n",
        report.crawl.max_depth_reached
    ));
    md.push_str(&format!(
        "- **Crawl Duration**: {:.2} seconds\n",
        report.crawl.duration_ms as f64 / 1000.0
    ));
    if !report.config_hash.is_empty() {
        md.push_str(&format!("- **Config Hash**: {}\n", report.config_hash));
    }
    if let Some(error) = &report.error {
        md.push_str(&format!("- **Error**: {}\n", error));
    }
    md.push('\n');

    // Severity totals
    md.push_str("## Issue Summary\n\n");
    md.push_str("| Severity | Count |\n");
    md.push_str("|----------|-------|\n");
    for severity in Severity::ALL {
        md.push_str(&format!("| {} | {} |\n", severity, report.summary.get(severity)));
    }
    md.push_str(&format!("| **total** | {} |\n\n", report.summary.total()));

    // Module table
    if !report.modules.is_empty() {
        md.push_str("## Modules\n\n");
        md.push_str("| Module | Status | Issues |\n");
        md.push_str("|--------|--------|--------|\n");
        for (name, result) in &report.modules {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                name,
                result.status,
                result.issues.len()
            ));
        }
        md.push('\n');
    }

    if !report.skipped_checks.is_empty() {
        md.push_str("## Skipped Checks\n\n");
        for name in &report.skipped_checks {
            md.push_str(&format!("- {}\n", name));
        }
        md.push('\n');
    }

    for (name, result) in &report.modules {
        if result.issues.is_empty() && result.recommendations.is_empty() && result.error.is_none() {
            continue;
        }
        md.push_str(&format!("## {}\n\n", name));
        format_module(&mut md, result);
    }

    md
}

fn format_module(md: &mut String, result: &CheckResult) {
    if let Some(error) = &result.error {
        md.push_str(&format!("**Error**: {}\n\n", error));
    }

    if !result.issues.is_empty() {
        let mut issues: Vec<_> = result.issues.iter().collect();
        issues.sort_by_key(|i| i.severity);

        md.push_str("### Issues\n\n");
        for issue in issues.iter().take(MAX_ISSUES_PER_MODULE) {
            match &issue.url {
                Some(url) => md.push_str(&format!(
                    "- **{}** {} ({})\n",
                    issue.severity, issue.message, url
                )),
                None => md.push_str(&format!("- **{}** {}\n", issue.severity, issue.message)),
            }
        }
        if issues.len() > MAX_ISSUES_PER_MODULE {
            md.push_str(&format!(
                "\n... and {} more\n",
                issues.len() - MAX_ISSUES_PER_MODULE
            ));
        }
        md.push('\n');
    }

    if !result.recommendations.is_empty() {
        md.push_str("### Recommendations\n\n");
        for recommendation in &result.recommendations {
            md.push_str(&format!("- {}\n", recommendation));
        }
        md.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::assemble;
    use crate::checks::Findings;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn create_test_report() -> AuditReport {
        let mut security = Findings::new();
        security.issue(Severity::Low, "Missing Content-Security-Policy header");
        security.issue_at(
            Severity::Critical,
            "Site is not served over HTTPS",
            "http://example.com/",
        );
        security.recommend("Serve every page over HTTPS");

        let mut results = BTreeMap::new();
        results.insert("security".to_string(), security.into_result(json!({})));
        results.insert("mobile".to_string(), Findings::new().into_result(json!({})));
        results.insert("ga4".to_string(), CheckResult::failed("Crawl aborted: timeout"));

        let mut report = assemble(
            "example.com",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            results,
        );
        report.crawl.status = "completed".to_string();
        report.crawl.pages_visited = 12;
        report.skipped_checks = vec!["bogus".to_string()];
        report
    }

    #[test]
    fn test_format_markdown_report() {
        let markdown = format_markdown_report(&create_test_report());

        assert!(markdown.contains("# SEO Audit: example.com"));
        assert!(markdown.contains("- **Pages Visited**: 12"));
        assert!(markdown.contains("| critical | 1 |"));
        assert!(markdown.contains("| low | 1 |"));
        assert!(markdown.contains("| security | success | 2 |"));
        assert!(markdown.contains("## Skipped Checks\n\n- bogus"));
    }

    #[test]
    fn test_issues_sorted_by_severity() {
        let markdown = format_markdown_report(&create_test_report());
        let critical = markdown.find("**critical** Site is not served").unwrap();
        let low = markdown.find("**low** Missing Content-Security-Policy").unwrap();
        assert!(critical < low);
        assert!(markdown.contains("(http://example.com/)"));
    }

    #[test]
    fn test_modules_without_findings_have_no_section() {
        let markdown = format_markdown_report(&create_test_report());
        assert!(!markdown.contains("## mobile"));
        assert!(markdown.contains("## ga4\n\n**Error**: Crawl aborted: timeout"));
    }
}
