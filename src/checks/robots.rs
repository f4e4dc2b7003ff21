//! robots.txt and page-level robots directives

use super::*;
use crate::robots::{product_token, ParsedRobots, RobotsTxt};
use serde_json::json;
use std::collections::BTreeSet;

pub struct RobotsCheck;

#[async_trait]
impl Check for RobotsCheck {
    fn name(&self) -> &'static str {
        "robots"
    }

    fn description(&self) -> &'static str {
        "Validates robots.txt and reports meta robots and X-Robots-Tag directives"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let file = snapshot.robots_txt.as_ref();
        let robots_url = file
            .map(|f| f.url.clone())
            .unwrap_or_else(|| {
                format!("{}://{}/robots.txt", snapshot.seed.scheme(), snapshot.domain)
            });

        let content = file.and_then(|f| f.content());
        let summary = content.map(RobotsTxt::parse).unwrap_or_default();
        let present = content.is_some();

        match file {
            Some(f) if f.is_success() => {}
            Some(f) if matches!(f.status, Some(s) if (400..500).contains(&s)) => {
                findings.issue_at(Severity::Medium, "robots.txt not found", robots_url.as_str());
                findings.recommend(
                    "Publish a robots.txt, even a permissive one, with a Sitemap line",
                );
            }
            Some(f) => {
                let reason = f
                    .error
                    .clone()
                    .or_else(|| f.status.map(|s| format!("HTTP {}", s)))
                    .unwrap_or_else(|| "no response".to_string());
                findings.issue_at(
                    Severity::High,
                    format!("robots.txt is not accessible ({})", reason),
                    robots_url.as_str(),
                );
            }
            None => {
                findings.issue_at(
                    Severity::High,
                    "robots.txt was not fetched",
                    robots_url.as_str(),
                );
            }
        }

        for error in &summary.errors {
            findings.issue_at(
                Severity::Low,
                format!("robots.txt syntax: {}", error),
                robots_url.as_str(),
            );
        }

        if summary.wildcard_group().is_some_and(|g| g.blocks_everything()) {
            findings.issue_at(
                Severity::Critical,
                "robots.txt blocks all crawlers (Disallow: /)",
                robots_url.as_str(),
            );
            findings.recommend(
                "Remove the blanket 'Disallow: /' unless the site must stay out of search",
            );
        }

        let agent = ctx.config.user_agent.header_value();
        let ours = product_token(&agent);
        let seed_blocked = content
            .map(|c| !ParsedRobots::from_content(c).is_allowed(snapshot.seed.as_str(), ours))
            .unwrap_or(false);
        if seed_blocked {
            findings.issue(
                Severity::High,
                format!("robots.txt disallows the homepage for {}", ours),
            );
        }

        if present && summary.sitemaps.is_empty() {
            findings.issue_at(
                Severity::Low,
                "robots.txt does not declare a Sitemap",
                robots_url.as_str(),
            );
        }

        let mut noindex = 0;
        let mut nofollow = 0;
        for page in &snapshot.pages {
            if page.is_noindex() {
                noindex += 1;
                findings.issue_at(
                    Severity::Medium,
                    "Page is marked noindex",
                    page.final_url.as_str(),
                );
            }
            if page.is_nofollow() {
                nofollow += 1;
                findings.issue_at(
                    Severity::Low,
                    "Page is marked nofollow",
                    page.final_url.as_str(),
                );
            }
        }
        if noindex > 0 {
            findings.recommend("Confirm every noindex page is meant to be hidden from search");
        }

        let disallowed: BTreeSet<&str> = summary
            .groups
            .iter()
            .flat_map(|g| g.disallow.iter().map(String::as_str))
            .filter(|d| !d.is_empty())
            .collect();

        let metrics = json!({
            "present": present,
            "groups": summary.groups.len(),
            "disallowed_paths": disallowed,
            "sitemaps": summary.sitemaps,
            "syntax_errors": summary.errors.len(),
            "blocked_urls": snapshot.blocked_urls.len(),
            "noindex_pages": noindex,
            "nofollow_pages": nofollow,
        });
        Ok(findings.into_result(metrics))
    }
}
