//! Search Console readiness: indexability and site verification
//!
//! `GOOGLE_SEARCH_CONSOLE_API_KEY` only gates the check. The metrics come from
//! the crawled pages; the Search Console API is never called.

use super::common::missing_credential;
use super::*;
use serde_json::json;

pub struct GscCheck;

#[async_trait]
impl Check for GscCheck {
    fn name(&self) -> &'static str {
        "gsc"
    }

    fn description(&self) -> &'static str {
        "Reports indexability of crawled pages and Search Console verification"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        if ctx.config.api_keys.google_search_console.is_none() {
            tracing::warn!("gsc: no API key configured, running in degraded mode");
            return Ok(missing_credential(
                "Google Search Console",
                "GOOGLE_SEARCH_CONSOLE_API_KEY",
            ));
        }

        let mut findings = Findings::new();
        let mut indexable = 0;
        let mut noindex = 0;
        let mut canonicalized = 0;
        let mut non_success = 0;

        for page in &snapshot.pages {
            if !page.is_success() {
                non_success += 1;
                continue;
            }
            let Some(doc) = page.document() else { continue };
            if page.is_noindex() {
                noindex += 1;
                findings.issue_at(
                    Severity::Medium,
                    "Page is excluded from the index (noindex)",
                    page.final_url.as_str(),
                );
                continue;
            }
            let points_elsewhere = doc.canonical.as_ref().is_some_and(|c| {
                url::Url::parse(c)
                    .map(|u| snapshot.key_for(&u) != snapshot.key_for(&page.final_url))
                    .unwrap_or(false)
            });
            if points_elsewhere {
                canonicalized += 1;
            } else {
                indexable += 1;
            }
        }

        let verification = snapshot
            .seed_page()
            .and_then(|p| p.document())
            .and_then(|d| d.meta("google-site-verification"))
            .is_some();
        if !verification {
            findings.issue(
                Severity::Low,
                "No google-site-verification meta tag on the homepage",
            );
            findings.recommend(
                "Verify the site in Search Console (meta tag, DNS record or HTML file)",
            );
        }
        if indexable == 0 && !snapshot.pages.is_empty() {
            findings.issue(Severity::High, "No crawled page is indexable");
        }

        let metrics = json!({
            "configured": true,
            "indexable_pages": indexable,
            "noindex_pages": noindex,
            "canonicalized_pages": canonicalized,
            "non_200_pages": non_success,
            "verification_tag_present": verification,
        });
        Ok(findings.into_result(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, ctx_with, snapshot};
    use crate::config::AuditConfig;

    #[tokio::test]
    async fn test_missing_key_is_warning() {
        let result = GscCheck.run(&snapshot(&[]), &ctx()).await.unwrap();
        assert_eq!(result.status, CheckStatus::Warning);
        assert!(result.issues[0]
            .message
            .contains("GOOGLE_SEARCH_CONSOLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_indexability_counts() {
        let mut config = AuditConfig::default();
        config.api_keys.google_search_console = Some("key".to_string());
        let snap = snapshot(&[
            (
                "https://example.com/",
                r#"<head><meta name="google-site-verification" content="abc"></head>"#,
            ),
            (
                "https://example.com/hidden",
                r#"<head><meta name="robots" content="noindex"></head>"#,
            ),
            (
                "https://example.com/copy",
                r#"<head><link rel="canonical" href="https://example.com/"></head>"#,
            ),
        ]);

        let result = GscCheck.run(&snap, &ctx_with(config)).await.unwrap();
        assert_eq!(result.metrics["indexable_pages"], 1);
        assert_eq!(result.metrics["noindex_pages"], 1);
        assert_eq!(result.metrics["canonicalized_pages"], 1);
        assert_eq!(result.metrics["verification_tag_present"], true);
        assert_eq!(result.issues.len(), 1);
    }

    #[tokio::test]
    async fn test_key_value_does_not_change_metrics() {
        let snap = snapshot(&[("https://example.com/", "<p>x</p>")]);
        let mut results = Vec::new();
        for key in ["key", "something-else"] {
            let mut config = AuditConfig::default();
            config.api_keys.google_search_console = Some(key.to_string());
            results.push(GscCheck.run(&snap, &ctx_with(config)).await.unwrap());
        }
        assert_eq!(results[0].metrics, results[1].metrics);
        assert_eq!(results[0].metrics["indexable_pages"], 1);
    }
}
