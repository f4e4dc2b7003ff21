//! Crawl snapshot: the immutable input every check runs against
//!
//! A snapshot is built by the crawl engine, then frozen and shared read-only
//! (behind an `Arc`) across all checks of one audit run.

mod page;

pub use page::{Heading, HeadLink, Image, JsonLdBlock, Link, PageContent, PageDocument, PageRecord};

use crate::crawler::RedirectHop;
use crate::url::{frontier_key, is_internal_link};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use url::Url;

/// A site-level resource fetched alongside the pages (robots.txt, sitemaps)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryFile {
    pub url: String,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<String>,
}

impl AuxiliaryFile {
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s)) && self.body.is_some()
    }

    /// Body of a successful fetch
    pub fn content(&self) -> Option<&str> {
        if self.is_success() {
            self.body.as_deref()
        } else {
            None
        }
    }
}

/// Result of probing an off-domain link once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkProbe {
    pub url: String,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub redirect_chain: Vec<RedirectHop>,
}

impl LinkProbe {
    pub fn is_broken(&self) -> bool {
        self.error.is_some() || matches!(self.status, Some(s) if s >= 400)
    }
}

/// How the crawl ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    Completed,
    Aborted { reason: String },
}

/// Everything one crawl pass learned about a domain
#[derive(Debug, Clone)]
pub struct CrawlSnapshot {
    pub domain: String,
    pub seed: Url,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Breadth-first fetch order
    pub pages: Vec<PageRecord>,
    pub pages_visited: usize,
    pub pages_skipped: usize,
    pub max_depth_reached: u32,
    /// URLs skipped because robots.txt disallows them
    pub blocked_urls: Vec<String>,
    pub robots_txt: Option<AuxiliaryFile>,
    pub sitemaps: Vec<AuxiliaryFile>,
    /// Keyed by frontier key of the probed URL
    pub external_links: BTreeMap<String, LinkProbe>,
    pub outcome: CrawlOutcome,
    strip_query: bool,
    index: HashMap<String, usize>,
}

impl CrawlSnapshot {
    pub fn new(domain: impl Into<String>, seed: Url, strip_query: bool) -> Self {
        let now = Utc::now();
        Self {
            domain: domain.into(),
            seed,
            started_at: now,
            finished_at: now,
            pages: Vec::new(),
            pages_visited: 0,
            pages_skipped: 0,
            max_depth_reached: 0,
            blocked_urls: Vec::new(),
            robots_txt: None,
            sitemaps: Vec::new(),
            external_links: BTreeMap::new(),
            outcome: CrawlOutcome::Completed,
            strip_query,
            index: HashMap::new(),
        }
    }

    /// Records a page; a second record for the same key is ignored
    pub fn push_page(&mut self, page: PageRecord) -> bool {
        if self.index.contains_key(&page.key) {
            return false;
        }
        self.max_depth_reached = self.max_depth_reached.max(page.depth);
        self.index.insert(page.key.clone(), self.pages.len());
        self.pages.push(page);
        true
    }

    /// Looks a page up by any URL that normalizes to its key
    pub fn page(&self, url: &str) -> Option<&PageRecord> {
        let parsed = Url::parse(url).ok()?;
        self.page_for(&parsed)
    }

    pub fn page_for(&self, url: &Url) -> Option<&PageRecord> {
        self.index
            .get(&self.key_for(url))
            .and_then(|&i| self.pages.get(i))
    }

    pub fn key_for(&self, url: &Url) -> String {
        frontier_key(url, self.strip_query)
    }

    /// Probe result for an off-domain URL
    pub fn external(&self, url: &str) -> Option<&LinkProbe> {
        let parsed = Url::parse(url).ok()?;
        self.external_links.get(&self.key_for(&parsed))
    }

    pub fn seed_page(&self) -> Option<&PageRecord> {
        self.page_for(&self.seed)
    }

    /// Pages with a parsed document (2xx HTML)
    pub fn documents(&self) -> impl Iterator<Item = (&PageRecord, &PageDocument)> {
        self.pages
            .iter()
            .filter_map(|p| p.document().map(|d| (p, d)))
    }

    /// Like `documents`, but yields each final URL once
    ///
    /// A redirecting URL and its target can both be recorded when they were
    /// fetched in the same batch. Only the first record per final URL is kept.
    pub fn distinct_documents(&self) -> impl Iterator<Item = (&PageRecord, &PageDocument)> {
        let mut seen = HashSet::new();
        self.documents()
            .filter(move |(page, _)| seen.insert(self.key_for(&page.final_url)))
    }

    pub fn is_internal(&self, url: &str) -> bool {
        is_internal_link(url, &self.domain)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, CrawlOutcome::Aborted { .. })
    }

    pub fn abort_reason(&self) -> Option<&str> {
        match &self.outcome {
            CrawlOutcome::Aborted { reason } => Some(reason),
            CrawlOutcome::Completed => None,
        }
    }
}
