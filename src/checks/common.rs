//! Helpers shared by several checks

use super::{CheckResult, Findings, Severity};
use crate::snapshot::Heading;
use serde_json::{json, Value};

/// Result for a check whose API credential is not configured
pub(crate) fn missing_credential(service: &str, env_key: &str) -> CheckResult {
    let mut findings = Findings::new();
    findings.issue(
        Severity::Medium,
        format!("{} API key not configured ({})", service, env_key),
    );
    findings.recommend(format!(
        "Set {} to enable the {} analysis",
        env_key, service
    ));
    findings.into_warning(json!({ "configured": false }))
}

/// `@type` names declared by a JSON-LD value, including `@graph` members
pub(crate) fn schema_types(value: &Value) -> Vec<String> {
    let mut types = Vec::new();
    collect_types(value, &mut types);
    types
}

fn collect_types(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_types(item, out);
            }
        }
        Value::Object(map) => {
            match map.get("@type") {
                Some(Value::String(t)) => out.push(t.clone()),
                Some(Value::Array(ts)) => {
                    out.extend(ts.iter().filter_map(|t| t.as_str().map(str::to_string)))
                }
                _ => {}
            }
            if let Some(graph) = map.get("@graph") {
                collect_types(graph, out);
            }
        }
        _ => {}
    }
}

/// Heading level jumps of more than one (e.g. h1 followed by h3)
pub(crate) fn heading_skips(headings: &[Heading]) -> Vec<(u8, u8)> {
    headings
        .windows(2)
        .filter(|w| w[1].level > w[0].level + 1)
        .map(|w| (w[0].level, w[1].level))
        .collect()
}

pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckStatus;

    #[test]
    fn test_missing_credential_names_key() {
        let result = missing_credential("Backlink", "BACKLINK_API_KEY");
        assert_eq!(result.status, CheckStatus::Warning);
        assert!(result.issues[0].message.contains("BACKLINK_API_KEY"));
    }

    #[test]
    fn test_schema_types_walks_graph() {
        let value = json!({
            "@context": "https://schema.org",
            "@graph": [
                { "@type": "Organization" },
                { "@type": ["WebSite", "Thing"] }
            ]
        });
        assert_eq!(schema_types(&value), vec!["Organization", "WebSite", "Thing"]);
    }

    #[test]
    fn test_heading_skips() {
        let headings = vec![
            Heading { level: 1, text: "a".into() },
            Heading { level: 3, text: "b".into() },
            Heading { level: 2, text: "c".into() },
            Heading { level: 3, text: "d".into() },
        ];
        assert_eq!(heading_skips(&headings), vec![(1, 3)]);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(0, 0), 0.0);
    }
}
