//! Broken internal and external links

use super::*;
use serde_json::json;
use std::collections::BTreeMap;

/// Source pages listed per broken target
const MAX_SOURCES: usize = 5;

pub struct BrokenLinksCheck;

#[derive(Default)]
struct Target<'a> {
    status: String,
    internal: bool,
    sources: Vec<&'a str>,
}

#[async_trait]
impl Check for BrokenLinksCheck {
    fn name(&self) -> &'static str {
        "broken_links"
    }

    fn description(&self) -> &'static str {
        "Finds links to pages that fail or return 4xx/5xx"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut broken: BTreeMap<&str, Target> = BTreeMap::new();
        let mut checked = 0;
        let mut unchecked = 0;

        for (page, doc) in snapshot.documents() {
            for link in &doc.links {
                let internal = snapshot.is_internal(&link.url);
                let status = if internal {
                    snapshot.page(&link.url).map(|p| {
                        p.is_broken().then(|| describe(p.status, p.error().map(|e| e.to_string())))
                    })
                } else {
                    snapshot.external(&link.url).map(|probe| {
                        probe
                            .is_broken()
                            .then(|| describe(probe.status, probe.error.clone()))
                    })
                };

                match status {
                    None => unchecked += 1,
                    Some(None) => checked += 1,
                    Some(Some(status)) => {
                        checked += 1;
                        let target = broken.entry(link.url.as_str()).or_default();
                        target.status = status;
                        target.internal = internal;
                        if !target.sources.contains(&page.final_url.as_str()) {
                            target.sources.push(page.final_url.as_str());
                        }
                    }
                }
            }
        }

        let mut broken_internal = 0;
        let mut broken_external = 0;
        for (url, target) in &broken {
            let (severity, kind) = if target.internal {
                broken_internal += 1;
                (Severity::High, "internal")
            } else {
                broken_external += 1;
                (Severity::Medium, "external")
            };
            findings.issue_at(
                severity,
                format!(
                    "Broken {} link ({}) found on {} pages: {}",
                    kind,
                    target.status,
                    target.sources.len(),
                    target
                        .sources
                        .iter()
                        .take(MAX_SOURCES)
                        .copied()
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                *url,
            );
        }
        if broken_internal > 0 {
            findings.recommend(
                "Update or remove internal links to missing pages, or redirect them",
            );
        }
        if broken_external > 0 {
            findings.recommend("Replace or remove links to external pages that no longer resolve");
        }

        let statuses = histogram(
            snapshot
                .pages
                .iter()
                .map(|p| status_label(p.status))
                .chain(snapshot.external_links.values().map(|p| status_label(p.status))),
        );

        let metrics = json!({
            "links_checked": checked,
            "links_unchecked": unchecked,
            "broken_internal": broken_internal,
            "broken_external": broken_external,
            "status_histogram": statuses,
        });
        Ok(findings.into_result(metrics))
    }
}

fn describe(status: Option<u16>, error: Option<String>) -> String {
    match (status, error) {
        (_, Some(error)) => error,
        (Some(status), None) => format!("HTTP {}", status),
        (None, None) => "no response".to_string(),
    }
}

fn status_label(status: Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, record, response, snapshot};
    use crate::snapshot::LinkProbe;

    #[tokio::test]
    async fn test_internal_and_external_broken() {
        let html = r#"<a href="/gone">gone</a><a href="/ok">ok</a>
<a href="https://other.org/dead">dead</a><a href="https://other.org/never-probed">x</a>"#;
        let mut snap = snapshot(&[
            ("https://example.com/", html),
            ("https://example.com/ok", r#"<a href="/gone">again</a>"#),
        ]);
        snap.push_page(record(
            "https://example.com/gone",
            1,
            response("https://example.com/gone", 404, &[], "missing"),
        ));
        snap.external_links.insert(
            "https://other.org/dead".to_string(),
            LinkProbe {
                url: "https://other.org/dead".to_string(),
                status: Some(410),
                error: None,
                redirect_chain: Vec::new(),
            },
        );

        let result = BrokenLinksCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["broken_internal"], 1);
        assert_eq!(result.metrics["broken_external"], 1);
        assert_eq!(result.metrics["links_unchecked"], 1);
        assert_eq!(result.metrics["status_histogram"]["404"], 1);

        let internal = result
            .issues
            .iter()
            .find(|i| i.severity == Severity::High)
            .unwrap();
        assert_eq!(internal.url.as_deref(), Some("https://example.com/gone"));
        assert!(internal.message.contains("on 2 pages"));
    }
}
