//! Crawlability: what search engines can reach and index

use super::common::percent;
use super::*;
use crate::crawler::FetchError;
use serde_json::json;
use std::collections::HashSet;

const MAX_PATH_SEGMENTS: usize = 8;
const MAX_QUERY_PARAMS: usize = 3;
const SESSION_PARAMS: &[&str] = &["sessionid", "session_id", "sid", "phpsessid", "jsessionid"];

pub struct CrawlabilityCheck;

#[async_trait]
impl Check for CrawlabilityCheck {
    fn name(&self) -> &'static str {
        "crawlability"
    }

    fn description(&self) -> &'static str {
        "Measures how much of the site crawlers can reach and index"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut crawlable = 0;
        let mut noindex = 0;
        let mut errors = 0;
        let mut traps = 0;

        for page in &snapshot.pages {
            let url = page.final_url.as_str();
            if let Some(error) = page.error() {
                errors += 1;
                findings.issue_at(
                    Severity::High,
                    format!("Crawl error: {}", describe(error)),
                    page.url.as_str(),
                );
                continue;
            }
            if let Some(status) = page.status.filter(|s| *s >= 500) {
                errors += 1;
                findings.issue_at(Severity::High, format!("Server error (HTTP {})", status), url);
                continue;
            }
            if page.document().is_none() {
                continue;
            }
            if page.is_noindex() {
                noindex += 1;
            } else if page.is_success() {
                crawlable += 1;
            }

            if let Some(reason) = trap_shape(&page.final_url) {
                traps += 1;
                findings.issue_at(Severity::Low, format!("Possible crawl trap: {}", reason), url);
            }
        }

        if snapshot.seed_page().is_some_and(|p| p.is_noindex()) {
            findings.issue(Severity::Critical, "Homepage is marked noindex");
            findings.recommend("Remove noindex from the homepage unless the site should be hidden");
        }

        match &snapshot.robots_txt {
            Some(file) if file.is_success() => {}
            Some(file) if file.status == Some(404) => {
                findings.issue(Severity::Medium, "robots.txt not found");
            }
            _ => findings.issue(Severity::Medium, "robots.txt could not be fetched"),
        }
        if !snapshot.sitemaps.iter().any(|s| s.is_success()) {
            findings.issue(Severity::Medium, "No XML sitemap available to guide crawlers");
        }

        let uncrawlable_pagination = pagination_problems(snapshot, &mut findings);

        if !snapshot.blocked_urls.is_empty() {
            findings.issue(
                Severity::Info,
                format!("{} URLs are blocked by robots.txt", snapshot.blocked_urls.len()),
            );
        }
        if errors > 0 {
            findings.recommend("Fix pages that fail to load so crawlers can reach them");
        }
        if traps > 0 {
            findings.recommend(
                "Avoid session IDs and unbounded parameter combinations in internal URLs",
            );
        }

        let total = snapshot.pages.len();
        let metrics = json!({
            "pages_crawled": total,
            "crawlable_pages": crawlable,
            "crawlable_pct": percent(crawlable, total),
            "blocked_urls": snapshot.blocked_urls.len(),
            "noindex_pages": noindex,
            "crawl_errors": errors,
            "max_depth_reached": snapshot.max_depth_reached,
            "pages_skipped": snapshot.pages_skipped,
            "trap_urls": traps,
            "uncrawlable_pagination": uncrawlable_pagination,
        });
        Ok(findings.into_result(metrics))
    }
}

fn describe(error: &FetchError) -> String {
    format!("{} ({})", error, error.kind())
}

/// rel=next/prev links whose target is blocked or broken
fn pagination_problems(snapshot: &CrawlSnapshot, findings: &mut Findings) -> usize {
    let blocked: HashSet<&str> = snapshot.blocked_urls.iter().map(String::as_str).collect();
    let mut count = 0;

    for (page, doc) in snapshot.documents() {
        for link in doc
            .head_links
            .iter()
            .filter(|l| l.has_rel("next") || l.has_rel("prev"))
        {
            let broken = snapshot.page(&link.href).is_some_and(|p| p.is_broken());
            if blocked.contains(link.href.as_str()) || broken {
                count += 1;
                findings.issue_at(
                    Severity::Medium,
                    format!("Pagination link to uncrawlable URL {}", link.href),
                    page.final_url.as_str(),
                );
            }
        }
    }
    count
}

/// URL shapes that tend to generate unbounded URL spaces
fn trap_shape(url: &url::Url) -> Option<String> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if segments.len() > MAX_PATH_SEGMENTS {
        return Some(format!("{} path segments", segments.len()));
    }

    // Repeated runs like /a/b/a/b/
    for width in 1..=segments.len() / 2 {
        for start in 0..=segments.len() - 2 * width {
            if segments[start..start + width] == segments[start + width..start + 2 * width] {
                return Some("repeating path segments".to_string());
            }
        }
    }

    let params: Vec<String> = url.query_pairs().map(|(k, _)| k.to_lowercase()).collect();
    if let Some(p) = params.iter().find(|p| SESSION_PARAMS.contains(&p.as_str())) {
        return Some(format!("session parameter '{}'", p));
    }
    if params.len() > MAX_QUERY_PARAMS {
        return Some(format!("{} query parameters", params.len()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, snapshot};
    use crate::snapshot::{AuxiliaryFile, PageRecord};
    use url::Url;

    #[test]
    fn test_trap_shapes() {
        let trap = |s: &str| trap_shape(&Url::parse(s).unwrap());
        assert!(trap("https://example.com/a/b/a/b/").is_some());
        assert!(trap("https://example.com/x/x").is_some());
        assert!(trap("https://example.com/p?PHPSESSID=1").is_some());
        assert!(trap("https://example.com/p?a=1&b=2&c=3&d=4").is_some());
        assert!(trap("https://example.com/1/2/3/4/5/6/7/8/9").is_some());
        assert!(trap("https://example.com/blog/post?page=2").is_none());
        assert!(trap("https://example.com/").is_none());
    }

    #[tokio::test]
    async fn test_counts_and_noindex_home() {
        let mut snap = snapshot(&[
            (
                "https://example.com/",
                r#"<head><meta name="robots" content="noindex"></head>"#,
            ),
            ("https://example.com/ok", "<p>fine</p>"),
        ]);
        snap.push_page(PageRecord::from_error(
            Url::parse("https://example.com/slow").unwrap(),
            1,
            FetchError::Timeout,
            false,
        ));
        snap.robots_txt = Some(AuxiliaryFile {
            url: "https://example.com/robots.txt".to_string(),
            status: Some(404),
            body: Some(String::new()),
            error: None,
        });

        let result = CrawlabilityCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["crawlable_pages"], 1);
        assert_eq!(result.metrics["noindex_pages"], 1);
        assert_eq!(result.metrics["crawl_errors"], 1);
        assert_eq!(result.count(Severity::Critical), 1);
        assert!(result.issues.iter().any(|i| i.message == "robots.txt not found"));
    }
}
