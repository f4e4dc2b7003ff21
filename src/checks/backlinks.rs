//! Link profile analysis
//!
//! Without access to a third-party backlink index this reports the site's
//! outbound link profile: follow/nofollow split, anchor text distribution and
//! the domains it references.
//!
//! `BACKLINK_API_KEY` only gates the check. Every metric is derived from the
//! crawl snapshot and no backlink API is called.

use super::common::missing_credential;
use super::*;
use crate::url::get_domain;
use serde_json::json;
use std::collections::BTreeMap;

const GENERIC_ANCHORS: &[&str] = &["click here", "here", "read more", "learn more", "more", "link"];
const TOP_N: usize = 10;

pub struct BacklinksCheck;

#[async_trait]
impl Check for BacklinksCheck {
    fn name(&self) -> &'static str {
        "backlinks"
    }

    fn description(&self) -> &'static str {
        "Analyzes the link profile: follow ratio, anchors and referenced domains"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        if ctx.config.api_keys.backlink.is_none() {
            tracing::warn!("backlinks: no API key configured, running in degraded mode");
            return Ok(missing_credential("Backlink", "BACKLINK_API_KEY"));
        }

        let mut findings = Findings::new();
        let mut total = 0;
        let mut nofollow = 0;
        let mut empty_anchors = 0;
        let mut generic_anchors = 0;
        let mut domains: BTreeMap<String, usize> = BTreeMap::new();
        let mut anchors: BTreeMap<String, usize> = BTreeMap::new();

        for (_, doc) in snapshot.documents() {
            for link in doc.links.iter().filter(|l| !snapshot.is_internal(&l.url)) {
                if !link.url.starts_with("http") {
                    continue;
                }
                total += 1;
                if link.is_nofollow() {
                    nofollow += 1;
                }
                *domains.entry(get_domain(&link.url)).or_default() += 1;

                let anchor = link.text.trim().to_lowercase();
                if anchor.is_empty() {
                    empty_anchors += 1;
                } else {
                    if GENERIC_ANCHORS.contains(&anchor.as_str()) {
                        generic_anchors += 1;
                    }
                    *anchors.entry(anchor).or_default() += 1;
                }
            }
        }

        if empty_anchors > 0 {
            findings.issue(
                Severity::Low,
                format!("{} external links have empty anchor text", empty_anchors),
            );
        }
        if generic_anchors > 0 {
            findings.issue(
                Severity::Low,
                format!("{} external links use generic anchor text", generic_anchors),
            );
            findings.recommend("Use descriptive anchor text that names the linked resource");
        }

        let dofollow = total - nofollow;
        let metrics = json!({
            "configured": true,
            "external_links": total,
            "dofollow": dofollow,
            "nofollow": nofollow,
            "referenced_domains": domains.len(),
            "top_domains": top(&domains),
            "top_anchors": top(&anchors),
            "empty_anchors": empty_anchors,
        });
        Ok(findings.into_result(metrics))
    }
}

fn top(counts: &BTreeMap<String, usize>) -> Vec<Value> {
    let mut ranked: Vec<(&String, &usize)> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_N)
        .map(|(name, count)| json!({ "value": name, "count": count }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, ctx_with, snapshot};
    use crate::config::AuditConfig;

    #[tokio::test]
    async fn test_missing_key_warns_with_env_name() {
        let snap = snapshot(&[("https://example.com/", "<p>x</p>")]);
        let result = BacklinksCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.status, CheckStatus::Warning);
        assert!(result.issues[0].message.contains("BACKLINK_API_KEY"));
    }

    #[tokio::test]
    async fn test_link_profile() {
        let mut config = AuditConfig::default();
        config.api_keys.backlink = Some("key".to_string());
        let html = r#"<a href="https://a.org/x">Rust docs</a>
<a href="https://a.org/y" rel="nofollow">click here</a>
<a href="https://b.net/"></a>
<a href="/internal">Home</a>"#;
        let snap = snapshot(&[("https://example.com/", html)]);

        let result = BacklinksCheck.run(&snap, &ctx_with(config)).await.unwrap();
        assert_eq!(result.status, CheckStatus::Success);
        assert_eq!(result.metrics["external_links"], 3);
        assert_eq!(result.metrics["nofollow"], 1);
        assert_eq!(result.metrics["referenced_domains"], 2);
        assert_eq!(result.metrics["top_domains"][0]["value"], "a.org");
        assert_eq!(result.issues.len(), 2);
    }

    #[tokio::test]
    async fn test_key_value_does_not_change_metrics() {
        let snap = snapshot(&[("https://example.com/", r#"<a href="https://a.org/">A</a>"#)]);
        let mut results = Vec::new();
        for key in ["key", "something-else"] {
            let mut config = AuditConfig::default();
            config.api_keys.backlink = Some(key.to_string());
            results.push(BacklinksCheck.run(&snap, &ctx_with(config)).await.unwrap());
        }
        assert_eq!(results[0].metrics, results[1].metrics);
        assert_eq!(results[0].metrics["external_links"], 1);
    }
}
