//! XML sitemap validation and cross-referencing with the crawl

use super::*;
use crate::robots::{parse_sitemap, RobotsTxt, SitemapKind, MAX_SITEMAP_URLS};
use serde_json::json;
use std::collections::BTreeSet;

pub struct SitemapCheck;

#[async_trait]
impl Check for SitemapCheck {
    fn name(&self) -> &'static str {
        "sitemap"
    }

    fn description(&self) -> &'static str {
        "Validates XML sitemaps and compares them with the crawled pages"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut listed: BTreeSet<String> = BTreeSet::new();
        let mut found = 0;
        let mut index_files = 0;
        let mut parse_errors = 0;

        for file in &snapshot.sitemaps {
            let Some(body) = file.content() else {
                let reason = file
                    .error
                    .clone()
                    .or_else(|| file.status.map(|s| format!("HTTP {}", s)))
                    .unwrap_or_else(|| "no response".to_string());
                findings.issue_at(
                    Severity::Medium,
                    format!("Sitemap could not be fetched ({})", reason),
                    file.url.as_str(),
                );
                continue;
            };
            found += 1;

            let sitemap = parse_sitemap(body);
            if sitemap.kind == SitemapKind::Index {
                index_files += 1;
            }
            for error in &sitemap.errors {
                parse_errors += 1;
                findings.issue_at(
                    Severity::Medium,
                    format!("Sitemap error: {}", error),
                    file.url.as_str(),
                );
            }
            if sitemap.kind == SitemapKind::UrlSet {
                if sitemap.entries.len() >= MAX_SITEMAP_URLS {
                    findings.issue_at(
                        Severity::Medium,
                        format!("Sitemap reaches the {} URL limit", MAX_SITEMAP_URLS),
                        file.url.as_str(),
                    );
                }
                listed.extend(sitemap.locs().map(str::to_string));
            }
        }

        if found == 0 {
            findings.issue(Severity::High, "No XML sitemap found");
            findings.recommend("Publish an XML sitemap and reference it from robots.txt");
        }

        let declared = snapshot
            .robots_txt
            .as_ref()
            .and_then(|f| f.content())
            .map(|c| !RobotsTxt::parse(c).sitemaps.is_empty())
            .unwrap_or(false);
        if found > 0 && !declared {
            findings.issue(Severity::Low, "robots.txt does not declare a Sitemap");
            findings.recommend("Add a 'Sitemap:' line to robots.txt");
        }

        let mut off_domain = 0;
        let mut broken = 0;
        let mut redirecting = 0;
        let mut noindex = 0;
        let mut listed_keys: BTreeSet<String> = BTreeSet::new();

        for loc in &listed {
            if !snapshot.is_internal(loc) {
                off_domain += 1;
                findings.issue_at(
                    Severity::Medium,
                    "Sitemap lists a URL on another domain",
                    loc.as_str(),
                );
                continue;
            }
            if let Ok(parsed) = url::Url::parse(loc) {
                listed_keys.insert(snapshot.key_for(&parsed));
            }
            let Some(page) = snapshot.page(loc) else { continue };
            if page.is_broken() {
                broken += 1;
                let status = page
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "fetch error".to_string());
                findings.issue_at(
                    Severity::High,
                    format!("Sitemap lists a broken URL ({})", status),
                    loc.as_str(),
                );
            } else if !page.redirect_chain.is_empty() {
                redirecting += 1;
                findings.issue_at(
                    Severity::Medium,
                    "Sitemap lists a redirecting URL",
                    loc.as_str(),
                );
            } else if page.is_noindex() {
                noindex += 1;
                findings.issue_at(Severity::Medium, "Sitemap lists a noindex page", loc.as_str());
            }
        }

        let missing = if found == 0 {
            0
        } else {
            snapshot
                .documents()
                .filter(|(p, _)| p.redirect_chain.is_empty() && !p.is_noindex())
                .filter(|(p, _)| !listed_keys.contains(&p.key))
                .count()
        };
        if missing > 0 {
            findings.issue(
                Severity::Low,
                format!("{} crawled pages are missing from the sitemap", missing),
            );
            findings.recommend("Regenerate the sitemap so it covers every indexable page");
        }
        if broken + redirecting + noindex > 0 {
            findings.recommend(
                "List only canonical, indexable URLs that return 200 in the sitemap",
            );
        }

        let metrics = json!({
            "sitemaps_found": found,
            "index_files": index_files,
            "url_count": listed.len(),
            "parse_errors": parse_errors,
            "declared_in_robots": declared,
            "off_domain_urls": off_domain,
            "broken_urls": broken,
            "redirecting_urls": redirecting,
            "noindex_urls": noindex,
            "missing_from_sitemap": missing,
        });
        Ok(findings.into_result(metrics))
    }
}
