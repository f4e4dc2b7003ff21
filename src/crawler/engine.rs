//! Crawl engine - builds a bounded site snapshot
//!
//! This module contains the crawl loop that coordinates:
//! - Fetching robots.txt and sitemaps before the first page
//! - Pulling breadth-first batches from the frontier
//! - Fetching each batch concurrently through the fetch pool
//! - Extracting documents and offering internal links back to the frontier
//! - Probing off-domain links once each
//!
//! Per-page failures never stop the crawl. Only an unreachable seed or
//! cancellation moves the engine to [`CrawlState::Aborted`].

use super::fetcher::{FetchError, FetchResponse, PageFetcher};
use super::frontier::Frontier;
use super::pool::{effective_delay, FetchPool};
use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::robots::{parse_sitemap, product_token, ParsedRobots, SitemapKind};
use crate::snapshot::{AuxiliaryFile, CrawlOutcome, CrawlSnapshot, LinkProbe, PageRecord};
use crate::url::{is_internal_link, netloc};
use chrono::Utc;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Most sitemap files fetched per crawl, index children included
pub const MAX_SITEMAP_FILES: usize = 10;

/// Head `<link>` relations whose internal targets are crawled like anchors
const FOLLOWED_HEAD_RELS: &[&str] = &["canonical", "alternate", "amphtml"];

/// Lifecycle of one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Orchestrates frontier, fetch pool and extractor for one domain
pub struct CrawlEngine {
    config: CrawlerConfig,
    pool: FetchPool,
    /// robots.txt product token
    agent: String,
    state: CrawlState,
}

impl CrawlEngine {
    /// Creates an idle engine
    ///
    /// # Arguments
    ///
    /// * `config` - Crawl limits and politeness settings
    /// * `user_agent` - Identity used for robots.txt matching
    /// * `fetcher` - Transport for every request
    pub fn new(
        config: &CrawlerConfig,
        user_agent: &UserAgentConfig,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let pool = FetchPool::new(
            fetcher,
            config.max_concurrent_fetches,
            config.crawl_delay(),
        );
        Self {
            config: config.clone(),
            pool,
            agent: product_token(&user_agent.header_value()).to_string(),
            state: CrawlState::Idle,
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Crawls `domain` breadth-first starting at `seed`
    ///
    /// Always returns a snapshot; check [`CrawlSnapshot::outcome`] to see
    /// whether the crawl completed or was aborted. Cancelling `cancel`
    /// aborts the crawl at its next suspension point.
    pub async fn crawl(
        &mut self,
        domain: &str,
        seed: Url,
        cancel: &CancellationToken,
    ) -> CrawlSnapshot {
        self.state = CrawlState::Running;
        let mut snapshot =
            CrawlSnapshot::new(domain, seed.clone(), self.config.strip_query_strings);
        tracing::info!("Starting crawl of {} from {}", domain, seed);

        let loaded = until_cancelled(cancel, self.load_site_files(&seed, &mut snapshot)).await;
        let Some(robots) = loaded else {
            return self.abort(snapshot, "audit timed out before crawling");
        };

        let mut frontier = Frontier::new(
            self.config.max_depth,
            self.config.max_pages,
            self.config.strip_query_strings,
        );
        frontier.offer(seed.clone(), 0);
        let seed_key = frontier.key(&seed);

        let mut external_order: Vec<Url> = Vec::new();
        let mut external_seen: HashSet<String> = HashSet::new();

        loop {
            if cancel.is_cancelled() {
                return self.abort(snapshot, "audit timed out during crawl");
            }

            let to_fetch = frontier.next_batch(self.config.max_concurrent_fetches.max(1));
            if to_fetch.is_empty() {
                break;
            }

            let urls: Vec<Url> = to_fetch.iter().map(|q| q.url.clone()).collect();
            let fetched = until_cancelled(cancel, self.pool.fetch_many(&urls)).await;
            let Some(results) = fetched else {
                return self.abort(snapshot, "audit timed out during crawl");
            };

            for (queued, result) in to_fetch.into_iter().zip(results) {
                frontier.mark_visited(&queued.url);
                snapshot.pages_visited += 1;

                let record = match result {
                    Ok(response) => {
                        self.record_aliases(&mut frontier, &response);
                        PageRecord::from_response(
                            queued.url.clone(),
                            queued.depth,
                            response,
                            self.config.strip_query_strings,
                        )
                    }
                    Err(error) => {
                        tracing::debug!("Fetch failed for {}: {}", queued.url, error);
                        if queued.key == seed_key {
                            let reason = format!("seed unreachable: {}", error);
                            snapshot.push_page(PageRecord::from_error(
                                queued.url,
                                queued.depth,
                                error,
                                self.config.strip_query_strings,
                            ));
                            return self.abort(snapshot, &reason);
                        }
                        PageRecord::from_error(
                            queued.url.clone(),
                            queued.depth,
                            error,
                            self.config.strip_query_strings,
                        )
                    }
                };

                tracing::debug!(
                    "Crawled {} (depth {}, status {:?})",
                    record.url,
                    record.depth,
                    record.status
                );

                if is_internal_link(record.final_url.as_str(), domain) {
                    for url in discovered_links(&record) {
                        if !is_internal_link(url.as_str(), domain) {
                            if external_seen.insert(snapshot.key_for(&url)) {
                                external_order.push(url);
                            }
                        } else if self.is_blocked(&robots, &url) {
                            // Blocked URLs take no page budget
                            if frontier.reject(&url, record.depth + 1) {
                                tracing::debug!("Skipping {} (disallowed by robots.txt)", url);
                                snapshot.pages_skipped += 1;
                                snapshot.blocked_urls.push(url.to_string());
                            }
                        } else {
                            frontier.offer(url, record.depth + 1);
                        }
                    }
                }

                snapshot.push_page(record);
            }
        }

        if self.config.probe_external_links && !external_order.is_empty() {
            external_order.truncate(self.config.max_external_probes);
            let probed = until_cancelled(cancel, self.probe_external(&external_order)).await;
            let Some(probes) = probed else {
                return self.abort(snapshot, "audit timed out probing external links");
            };
            for (url, probe) in external_order.iter().zip(probes) {
                let key = snapshot.key_for(url);
                snapshot.external_links.insert(key, probe);
            }
        }

        snapshot.finished_at = Utc::now();
        snapshot.outcome = CrawlOutcome::Completed;
        self.state = CrawlState::Completed;
        tracing::info!(
            "Crawl of {} complete: {} pages visited, {} skipped, max depth {}",
            domain,
            snapshot.pages_visited,
            snapshot.pages_skipped,
            snapshot.max_depth_reached
        );
        snapshot
    }

    /// Fetches robots.txt and sitemaps into the snapshot
    async fn load_site_files(&self, seed: &Url, snapshot: &mut CrawlSnapshot) -> ParsedRobots {
        let robots = match seed.join("/robots.txt") {
            Ok(robots_url) => {
                let file = self.fetch_auxiliary(&robots_url).await;
                let parsed = file
                    .content()
                    .map(ParsedRobots::from_content)
                    .unwrap_or_else(ParsedRobots::allow_all);
                snapshot.robots_txt = Some(file);
                parsed
            }
            Err(_) => ParsedRobots::allow_all(),
        };

        let delay = effective_delay(self.config.crawl_delay(), robots.crawl_delay(&self.agent));
        if delay != self.config.crawl_delay() {
            tracing::info!("Using robots.txt crawl delay of {:?} for {}", delay, netloc(seed));
        }
        self.pool.pacer().set_delay(&netloc(seed), delay);

        let mut sitemap_urls: Vec<Url> = robots
            .summary()
            .sitemaps
            .iter()
            .filter_map(|s| Url::parse(s).ok())
            .collect();
        if sitemap_urls.is_empty() {
            sitemap_urls.extend(seed.join("/sitemap.xml").ok());
        }
        sitemap_urls.truncate(MAX_SITEMAP_FILES);

        let mut children: Vec<Url> = Vec::new();
        for url in &sitemap_urls {
            let file = self.fetch_auxiliary(url).await;
            if let Some(body) = file.content() {
                let sitemap = parse_sitemap(body);
                if sitemap.kind == SitemapKind::Index {
                    children.extend(sitemap.locs().filter_map(|loc| Url::parse(loc).ok()));
                }
            }
            snapshot.sitemaps.push(file);
        }

        let budget = MAX_SITEMAP_FILES.saturating_sub(sitemap_urls.len());
        for url in children.iter().take(budget) {
            let file = self.fetch_auxiliary(url).await;
            snapshot.sitemaps.push(file);
        }

        robots
    }

    async fn fetch_auxiliary(&self, url: &Url) -> AuxiliaryFile {
        match self.pool.fetch(url).await {
            Ok(response) => AuxiliaryFile {
                url: url.to_string(),
                status: Some(response.status),
                body: Some(response.body),
                error: None,
            },
            Err(e) => AuxiliaryFile {
                url: url.to_string(),
                status: None,
                body: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn probe_external(&self, urls: &[Url]) -> Vec<LinkProbe> {
        tracing::info!("Probing {} external links", urls.len());
        self.pool
            .fetch_many(urls)
            .await
            .into_iter()
            .zip(urls)
            .map(|(result, url)| link_probe(url, result))
            .collect()
    }

    /// Whether robots.txt rules keep `url` out of the crawl
    fn is_blocked(&self, robots: &ParsedRobots, url: &Url) -> bool {
        self.config.respect_robots_txt && !robots.is_allowed(url.as_str(), &self.agent)
    }

    /// Marks redirect hops and the final URL seen so aliases aren't refetched
    fn record_aliases(&self, frontier: &mut Frontier, response: &FetchResponse) {
        for hop in &response.redirect_chain {
            if let Ok(url) = Url::parse(&hop.url) {
                frontier.mark_seen(&url);
            }
        }
        frontier.mark_seen(&response.final_url);
    }

    fn abort(&mut self, mut snapshot: CrawlSnapshot, reason: &str) -> CrawlSnapshot {
        tracing::error!("Crawl of {} aborted: {}", snapshot.domain, reason);
        snapshot.finished_at = Utc::now();
        snapshot.outcome = CrawlOutcome::Aborted {
            reason: reason.to_string(),
        };
        self.state = CrawlState::Aborted;
        snapshot
    }
}

/// Anchor targets plus followed head-link targets of a page
fn discovered_links(record: &PageRecord) -> Vec<Url> {
    let Some(doc) = record.document() else {
        return Vec::new();
    };

    let anchors = doc.links.iter().map(|l| l.url.as_str());
    let head = doc
        .head_links
        .iter()
        .filter(|l| FOLLOWED_HEAD_RELS.iter().any(|rel| l.has_rel(rel)))
        .map(|l| l.href.as_str());

    anchors
        .chain(head)
        .filter_map(|s| Url::parse(s).ok())
        .collect()
}

fn link_probe(url: &Url, result: Result<FetchResponse, FetchError>) -> LinkProbe {
    match result {
        Ok(response) => LinkProbe {
            url: url.to_string(),
            status: Some(response.status),
            error: None,
            redirect_chain: response.redirect_chain,
        },
        Err(e) => LinkProbe {
            url: url.to_string(),
            status: None,
            error: Some(e.to_string()),
            redirect_chain: Vec::new(),
        },
    }
}

/// Runs `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::StaticFetcher;
    use std::time::Duration;

    fn config() -> CrawlerConfig {
        CrawlerConfig {
            crawl_delay_ms: 0,
            ..CrawlerConfig::default()
        }
    }

    fn engine(config: &CrawlerConfig, fetcher: StaticFetcher) -> CrawlEngine {
        CrawlEngine::new(config, &UserAgentConfig::default(), Arc::new(fetcher))
    }

    fn seed() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let fetcher = StaticFetcher::new()
            .page("https://example.com/", r#"<a href="/a">A</a>"#)
            .page("https://example.com/a", r#"<a href="/b">B</a>"#)
            .page("https://example.com/b", r#"<a href="/a">A</a><a href="/">Home</a>"#);

        let mut engine = engine(&config(), fetcher);
        let snapshot = engine
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        assert_eq!(engine.state(), CrawlState::Completed);
        assert_eq!(snapshot.pages.len(), 3);
        assert_eq!(snapshot.pages_visited, 3);
        assert_eq!(snapshot.max_depth_reached, 2);
    }

    #[tokio::test]
    async fn test_max_pages_bounds_visits() {
        let mut fetcher = StaticFetcher::new();
        let links: String = (0..20)
            .map(|i| format!(r#"<a href="/p{}">p</a>"#, i))
            .collect();
        fetcher = fetcher.page("https://example.com/", &links);
        for i in 0..20 {
            fetcher = fetcher.page(&format!("https://example.com/p{}", i), "<p>leaf</p>");
        }

        let config = CrawlerConfig {
            max_pages: 5,
            ..config()
        };
        let snapshot = engine(&config, fetcher)
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        assert!(snapshot.pages_visited <= 5);
        assert!(snapshot.pages.len() <= 5);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let fetcher = StaticFetcher::new()
            .page("https://example.com/", r#"<a href="/1">1</a>"#)
            .page("https://example.com/1", r#"<a href="/2">2</a>"#)
            .page("https://example.com/2", r#"<a href="/3">3</a>"#);

        let config = CrawlerConfig {
            max_depth: 1,
            ..config()
        };
        let snapshot = engine(&config, fetcher)
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        assert_eq!(snapshot.pages.len(), 2);
        assert!(snapshot.page("https://example.com/2").is_none());
    }

    #[tokio::test]
    async fn test_page_failures_do_not_abort() {
        let fetcher = StaticFetcher::new()
            .page("https://example.com/", r#"<a href="/gone">x</a><a href="/down">y</a>"#)
            .status("https://example.com/gone", 404, "Not found")
            .error("https://example.com/down", FetchError::Timeout);

        let mut engine = engine(&config(), fetcher);
        let snapshot = engine
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        assert_eq!(engine.state(), CrawlState::Completed);
        assert_eq!(snapshot.pages.len(), 3);
        assert_eq!(
            snapshot.page("https://example.com/gone").unwrap().status,
            Some(404)
        );
        assert!(snapshot
            .page("https://example.com/down")
            .unwrap()
            .error()
            .is_some());
    }

    #[tokio::test]
    async fn test_unreachable_seed_aborts() {
        let fetcher = StaticFetcher::new()
            .error("https://example.com/", FetchError::Dns("no such host".to_string()));

        let mut engine = engine(&config(), fetcher);
        let snapshot = engine
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        assert_eq!(engine.state(), CrawlState::Aborted);
        assert!(snapshot.abort_reason().unwrap().contains("seed unreachable"));
    }

    #[tokio::test]
    async fn test_cancelled_crawl_aborts() {
        let fetcher = StaticFetcher::new()
            .page("https://example.com/", "<p>home</p>")
            .with_latency(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut engine = engine(&config(), fetcher);
        let snapshot = engine.crawl("example.com", seed(), &cancel).await;

        assert_eq!(engine.state(), CrawlState::Aborted);
        assert!(snapshot.is_aborted());
    }

    #[tokio::test]
    async fn test_robots_disallowed_urls_are_skipped() {
        let fetcher = StaticFetcher::new()
            .text("https://example.com/robots.txt", "User-agent: *\nDisallow: /private\n")
            .page("https://example.com/", r#"<a href="/private/x">x</a><a href="/ok">ok</a>"#)
            .page("https://example.com/private/x", "<p>secret</p>")
            .page("https://example.com/ok", "<p>ok</p>");

        let snapshot = engine(&config(), fetcher)
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        assert_eq!(snapshot.pages_skipped, 1);
        assert_eq!(snapshot.blocked_urls, vec!["https://example.com/private/x"]);
        assert!(snapshot.page("https://example.com/private/x").is_none());
        assert!(snapshot.page("https://example.com/ok").is_some());
        assert!(snapshot.robots_txt.as_ref().unwrap().is_success());
    }

    #[tokio::test]
    async fn test_blocked_urls_do_not_use_page_budget() {
        let fetcher = StaticFetcher::new()
            .text("https://example.com/robots.txt", "User-agent: *\nDisallow: /private\n")
            .page(
                "https://example.com/",
                r#"<a href="/private/a">a</a><a href="/private/b">b</a><a href="/ok">ok</a>"#,
            )
            .page("https://example.com/ok", r#"<a href="/private/a">a</a>"#);

        let config = CrawlerConfig {
            max_pages: 3,
            ..config()
        };
        let snapshot = engine(&config, fetcher)
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        assert_eq!(snapshot.pages_visited, 2);
        assert_eq!(snapshot.pages_skipped, 2);
        assert!(snapshot.page("https://example.com/ok").is_some());
        assert_eq!(
            snapshot.blocked_urls,
            vec!["https://example.com/private/a", "https://example.com/private/b"]
        );
    }

    #[tokio::test]
    async fn test_redirect_target_not_fetched_twice() {
        let fetcher = StaticFetcher::new()
            .page("https://example.com/", r#"<a href="/old">old</a>"#)
            .redirect("https://example.com/old", "https://example.com/new", 301)
            .page(
                "https://example.com/new",
                r#"<a href="/new">self</a><a href="/">home</a>"#,
            );

        let snapshot = engine(&config(), fetcher)
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        let fetched: Vec<&str> = snapshot.pages.iter().map(|p| p.url.path()).collect();
        assert_eq!(fetched, vec!["/", "/old"]);
        assert_eq!(
            snapshot.page("https://example.com/old").unwrap().final_url.as_str(),
            "https://example.com/new"
        );
    }

    #[tokio::test]
    async fn test_external_links_are_probed_not_crawled() {
        let fetcher = StaticFetcher::new()
            .page(
                "https://example.com/",
                r#"<a href="https://other.org/page">o</a><a href="https://dead.org/">d</a>"#,
            )
            .page("https://other.org/page", r#"<a href="https://other.org/deeper">x</a>"#)
            .status("https://dead.org/", 404, "");

        let snapshot = engine(&config(), fetcher)
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        assert_eq!(snapshot.pages.len(), 1);
        assert_eq!(snapshot.external_links.len(), 2);
        assert!(!snapshot.external("https://other.org/page").unwrap().is_broken());
        assert!(snapshot.external("https://dead.org/").unwrap().is_broken());
    }

    #[tokio::test]
    async fn test_sitemaps_loaded() {
        let fetcher = StaticFetcher::new()
            .text(
                "https://example.com/robots.txt",
                "User-agent: *\nSitemap: https://example.com/index.xml\n",
            )
            .text(
                "https://example.com/index.xml",
                "<sitemapindex><sitemap><loc>https://example.com/s1.xml</loc></sitemap></sitemapindex>",
            )
            .text(
                "https://example.com/s1.xml",
                "<urlset><url><loc>https://example.com/</loc></url></urlset>",
            )
            .page("https://example.com/", "<p>home</p>");

        let snapshot = engine(&config(), fetcher)
            .crawl("example.com", seed(), &CancellationToken::new())
            .await;

        let urls: Vec<&str> = snapshot.sitemaps.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/index.xml", "https://example.com/s1.xml"]
        );
    }
}
