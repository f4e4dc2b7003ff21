//! Canonical tag validation

use super::*;
use serde_json::json;
use std::collections::BTreeMap;
use url::Url;

pub struct CanonicalCheck;

#[async_trait]
impl Check for CanonicalCheck {
    fn name(&self) -> &'static str {
        "canonical"
    }

    fn description(&self) -> &'static str {
        "Validates canonical tags: presence, targets and clustering"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut pages = 0;
        let mut missing = 0;
        let mut self_referencing = 0;
        let mut cross_domain = 0;
        let mut broken_targets = 0;
        let mut multiple = 0;
        let mut clusters: BTreeMap<String, Vec<&str>> = BTreeMap::new();

        for (page, doc) in snapshot.documents() {
            pages += 1;
            let url = page.final_url.as_str();

            if doc.canonical_count > 1 {
                multiple += 1;
                findings.issue_at(
                    Severity::Medium,
                    format!("{} canonical tags on one page", doc.canonical_count),
                    url,
                );
            }

            let Some(canonical) = doc.canonical.as_deref() else {
                missing += 1;
                findings.issue_at(Severity::Low, "Missing canonical tag", url);
                continue;
            };
            let Ok(target) = Url::parse(canonical) else {
                findings.issue_at(
                    Severity::Medium,
                    format!("Invalid canonical URL: {}", canonical),
                    url,
                );
                continue;
            };

            let target_key = snapshot.key_for(&target);
            if target_key == snapshot.key_for(&page.final_url) {
                self_referencing += 1;
                continue;
            }

            if !snapshot.is_internal(canonical) {
                cross_domain += 1;
                findings.issue_at(
                    Severity::Medium,
                    format!("Canonical points to another domain: {}", canonical),
                    url,
                );
            }
            if page.final_url.scheme() == "https" && target.scheme() == "http" {
                findings.issue_at(Severity::Low, "Canonical points to an HTTP URL", url);
            }

            if let Some(target_page) = snapshot.page_for(&target) {
                if target_page.is_broken() {
                    broken_targets += 1;
                    findings.issue_at(
                        Severity::High,
                        format!("Canonical points to a broken URL: {}", canonical),
                        url,
                    );
                } else if !target_page.redirect_chain.is_empty() {
                    findings.issue_at(
                        Severity::Medium,
                        format!("Canonical points to a redirecting URL: {}", canonical),
                        url,
                    );
                } else if target_page.is_noindex() {
                    findings.issue_at(
                        Severity::Medium,
                        format!("Canonical points to a noindex page: {}", canonical),
                        url,
                    );
                }
            }

            clusters.entry(target_key).or_default().push(url);
        }

        if missing > 0 {
            findings.recommend("Add a self-referencing canonical tag to every indexable page");
        }
        if multiple > 0 {
            findings.recommend("Keep a single canonical tag per page");
        }
        if broken_targets > 0 {
            findings.recommend("Point canonical tags at live, indexable URLs");
        }

        let cluster_sizes: BTreeMap<&str, usize> = clusters
            .iter()
            .map(|(target, members)| (target.as_str(), members.len()))
            .collect();
        let metrics = json!({
            "pages_analyzed": pages,
            "missing": missing,
            "self_referencing": self_referencing,
            "cross_domain": cross_domain,
            "broken_targets": broken_targets,
            "multiple_tags": multiple,
            "duplicate_clusters": clusters.len(),
            "clusters": cluster_sizes,
        });
        Ok(findings.into_result(metrics))
    }
}
