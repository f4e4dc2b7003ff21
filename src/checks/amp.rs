//! AMP detection and validation

use super::*;
use serde_json::json;
use url::Url;

/// Required AMP markup absent from `doc`
fn missing_markup(doc: &crate::snapshot::PageDocument) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if doc.meta("charset").is_none() {
        missing.push("<meta charset>");
    }
    if doc.canonical.is_none() {
        missing.push("<link rel=\"canonical\">");
    }
    if doc.meta("viewport").is_none() {
        missing.push("<meta name=\"viewport\">");
    }
    if !doc.html.contains("cdn.ampproject.org/v0.js") {
        missing.push("AMP runtime script (cdn.ampproject.org/v0.js)");
    }
    if !doc.html.contains("amp-boilerplate") {
        missing.push("amp-boilerplate style");
    }
    missing
}

pub struct AmpCheck;

#[async_trait]
impl Check for AmpCheck {
    fn name(&self) -> &'static str {
        "amp"
    }

    fn description(&self) -> &'static str {
        "Detects AMP pages, validates required markup and canonical/amphtml pairing"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut amp_pages = 0;
        let mut linked = 0;
        let mut invalid = 0;
        let mut unpaired = 0;

        for (page, doc) in snapshot.documents() {
            let url = page.final_url.as_str();

            if let Some(amphtml) = doc.amphtml() {
                linked += 1;
                match snapshot.page(amphtml) {
                    Some(target) if target.is_broken() => {
                        findings.issue_at(
                            Severity::High,
                            format!("amphtml link points to a broken URL: {}", amphtml),
                            url,
                        );
                    }
                    Some(target) if target.document().is_some_and(|d| !d.is_amp) => {
                        findings.issue_at(
                            Severity::High,
                            format!("amphtml target is not an AMP document: {}", amphtml),
                            url,
                        );
                    }
                    _ => {}
                }
            }

            if !doc.is_amp {
                continue;
            }
            amp_pages += 1;

            let missing = missing_markup(doc);
            if !missing.is_empty() {
                invalid += 1;
            }
            for item in missing {
                findings.issue_at(Severity::Medium, format!("AMP page missing {}", item), url);
            }

            let Some(canonical) = doc.canonical.as_deref().and_then(|c| Url::parse(c).ok()) else {
                continue;
            };
            let page_key = snapshot.key_for(&page.final_url);
            if snapshot.key_for(&canonical) == page_key {
                continue;
            }
            let links_back = snapshot
                .page_for(&canonical)
                .and_then(|p| p.document())
                .map(|d| {
                    d.amphtml()
                        .and_then(|a| Url::parse(a).ok())
                        .is_some_and(|a| snapshot.key_for(&a) == page_key)
                });
            if links_back == Some(false) {
                unpaired += 1;
                findings.issue_at(
                    Severity::Medium,
                    format!("Canonical page {} does not link back with rel=\"amphtml\"", canonical),
                    url,
                );
            }
        }

        if invalid > 0 {
            findings.recommend("Fix required AMP markup so pages stay eligible for AMP features");
        }
        if unpaired > 0 {
            findings.recommend(
                "Pair each AMP page with its canonical via rel=\"amphtml\" and rel=\"canonical\"",
            );
        }

        let metrics = json!({
            "amp_pages": amp_pages,
            "pages_linking_amp": linked,
            "invalid_amp_pages": invalid,
            "unpaired_amp_pages": unpaired,
        });
        Ok(findings.into_result(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, snapshot};

    const VALID_AMP: &str = r#"<html amp><head><meta charset="utf-8">
<link rel="canonical" href="https://example.com/article">
<meta name="viewport" content="width=device-width">
<script async src="https://cdn.ampproject.org/v0.js"></script>
<style amp-boilerplate>body{}</style></head><body>amp</body></html>"#;

    #[tokio::test]
    async fn test_valid_pair() {
        let snap = snapshot(&[
            (
                "https://example.com/article",
                r#"<head><link rel="amphtml" href="/article/amp"></head><p>x</p>"#,
            ),
            ("https://example.com/article/amp", VALID_AMP),
        ]);
        let result = AmpCheck.run(&snap, &ctx()).await.unwrap();
        assert!(result.issues.is_empty(), "{:?}", result.issues);
        assert_eq!(result.metrics["amp_pages"], 1);
        assert_eq!(result.metrics["pages_linking_amp"], 1);
    }

    #[tokio::test]
    async fn test_broken_pairing_and_markup() {
        let snap = snapshot(&[
            (
                "https://example.com/article",
                r#"<head><link rel="amphtml" href="/plain"></head><p>x</p>"#,
            ),
            ("https://example.com/plain", "<p>not amp</p>"),
            (
                "https://example.com/lonely/amp",
                r#"<html amp><head><link rel="canonical" href="https://example.com/article"></head></html>"#,
            ),
        ]);
        let result = AmpCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.count(Severity::High), 1);
        assert_eq!(result.metrics["invalid_amp_pages"], 1);
        assert_eq!(result.metrics["unpaired_amp_pages"], 1);
        // charset, viewport, runtime, boilerplate, plus the pairing issue
        assert_eq!(result.count(Severity::Medium), 5);
    }
}
