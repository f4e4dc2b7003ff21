//! Google Analytics 4 property checks
//!
//! `GOOGLE_ANALYTICS_API_KEY` only gates the check. Measurement IDs and tag
//! coverage are read from the crawled pages, not from the Analytics API.

use super::analytics_tags::ga4_ids;
use super::common::{missing_credential, percent};
use super::*;
use serde_json::json;
use std::collections::BTreeSet;

pub struct Ga4Check;

#[async_trait]
impl Check for Ga4Check {
    fn name(&self) -> &'static str {
        "ga4"
    }

    fn description(&self) -> &'static str {
        "Verifies GA4 measurement IDs and tag coverage"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        if ctx.config.api_keys.google_analytics.is_none() {
            tracing::warn!("ga4: no API key configured, running in degraded mode");
            return Ok(missing_credential("Google Analytics", "GOOGLE_ANALYTICS_API_KEY"));
        }

        let mut findings = Findings::new();
        let mut ids = BTreeSet::new();
        let mut tagged = 0;
        let mut missing = Vec::new();
        let mut pages = 0;

        for (page, doc) in snapshot.documents() {
            pages += 1;
            let page_ids = ga4_ids(&doc.html);
            if page_ids.is_empty() {
                missing.push(page.final_url.to_string());
            } else {
                tagged += 1;
                ids.extend(page_ids);
            }
        }

        if pages > 0 && ids.is_empty() {
            findings.issue(Severity::High, "No GA4 measurement ID found on crawled pages");
            findings.recommend("Add the GA4 gtag.js snippet to the site template");
        } else {
            for url in &missing {
                findings.issue_at(Severity::Medium, "GA4 tag missing", url.as_str());
            }
        }
        if ids.len() > 1 {
            findings.issue(
                Severity::Low,
                format!("Multiple GA4 measurement IDs in use: {}", join(&ids)),
            );
            findings.recommend("Consolidate tracking onto a single GA4 property");
        }

        let metrics = json!({
            "configured": true,
            "measurement_ids": ids,
            "pages_analyzed": pages,
            "pages_with_tag": tagged,
            "pages_without_tag": missing.len(),
            "coverage_pct": percent(tagged, pages),
        });
        Ok(findings.into_result(metrics))
    }
}

fn join(ids: &BTreeSet<String>) -> String {
    ids.iter().cloned().collect::<Vec<_>>().join(", ")
}
