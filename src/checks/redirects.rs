//! Redirect chains, loops and redirect types

use super::*;
use crate::crawler::FetchError;
use serde_json::json;

pub struct RedirectsCheck;

#[async_trait]
impl Check for RedirectsCheck {
    fn name(&self) -> &'static str {
        "redirects"
    }

    fn description(&self) -> &'static str {
        "Reports redirect chains, loops, temporary redirects and links to redirects"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut redirecting = 0;
        let mut chains = 0;
        let mut loops = 0;
        let mut too_many = 0;
        let mut temporary = 0;
        let mut permanent = 0;

        for page in &snapshot.pages {
            let url = page.url.as_str();
            match page.error() {
                Some(FetchError::RedirectLoop { chain }) => {
                    loops += 1;
                    findings.issue_at(
                        Severity::High,
                        format!("Redirect loop: {}", chain.join(" -> ")),
                        url,
                    );
                    continue;
                }
                Some(FetchError::TooManyRedirects { limit, .. }) => {
                    too_many += 1;
                    findings.issue_at(
                        Severity::High,
                        format!("More than {} redirects", limit),
                        url,
                    );
                    continue;
                }
                _ => {}
            }

            if page.redirect_chain.is_empty() {
                continue;
            }
            redirecting += 1;
            let hops = page.redirect_chain.len();
            if hops > 1 {
                chains += 1;
                findings.issue_at(
                    Severity::Medium,
                    format!("Redirect chain of {} hops ending at {}", hops, page.final_url),
                    url,
                );
            }
            for hop in &page.redirect_chain {
                if matches!(hop.status, 302 | 303 | 307) {
                    temporary += 1;
                    findings.issue_at(
                        Severity::Low,
                        format!("Temporary redirect ({}) used", hop.status),
                        hop.url.as_str(),
                    );
                } else {
                    permanent += 1;
                }
            }
            if page.url.scheme() == "https" && page.final_url.scheme() == "http" {
                findings.issue_at(Severity::High, "Redirects from HTTPS to HTTP", url);
            }
        }

        let mut links_to_redirects = 0;
        for (_, doc) in snapshot.documents() {
            links_to_redirects += doc
                .links
                .iter()
                .filter_map(|l| snapshot.page(&l.url))
                .filter(|p| !p.redirect_chain.is_empty())
                .count();
        }
        if links_to_redirects > 0 {
            findings.issue(
                Severity::Low,
                format!("{} internal links point to redirecting URLs", links_to_redirects),
            );
            findings.recommend("Link directly to final URLs instead of through redirects");
        }
        if chains > 0 {
            findings.recommend("Collapse redirect chains into a single hop");
        }
        if temporary > 0 {
            findings.recommend("Use 301/308 for permanent moves so ranking signals transfer");
        }
        if loops > 0 {
            findings.recommend("Break redirect loops; affected URLs cannot be reached at all");
        }

        let metrics = json!({
            "redirecting_pages": redirecting,
            "chains": chains,
            "loops": loops,
            "too_many_redirects": too_many,
            "temporary_hops": temporary,
            "permanent_hops": permanent,
            "links_to_redirects": links_to_redirects,
        });
        Ok(findings.into_result(metrics))
    }
}
