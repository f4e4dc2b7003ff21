//! URL frontier for one domain crawl
//!
//! Tracks every URL the crawl has discovered (pending or visited) and hands
//! pending URLs out in FIFO order, which makes the crawl breadth-first.
//! Deduplication is on [`frontier_key`], so a URL can enter the frontier at
//! most once and cyclic link graphs terminate.

use crate::url::frontier_key;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    pub url: Url,
    /// Deduplication key
    pub key: String,
    /// Link distance from the seed
    pub depth: u32,
}

/// Discovered-versus-visited bookkeeping for a crawl
#[derive(Debug)]
pub struct Frontier {
    max_depth: u32,
    max_pages: usize,
    strip_query: bool,
    /// Keys of every URL ever accepted (pending ∪ visited) plus redirect aliases
    seen: HashSet<String>,
    /// Number of accepted URLs; bounded by `max_pages`
    accepted: usize,
    pending: VecDeque<QueuedUrl>,
    visited: HashSet<String>,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Deepest link distance accepted
    /// * `max_pages` - Maximum URLs ever accepted, which bounds pages visited
    /// * `strip_query` - Whether query strings are ignored for deduplication
    pub fn new(max_depth: u32, max_pages: usize, strip_query: bool) -> Self {
        Self {
            max_depth,
            max_pages,
            strip_query,
            seen: HashSet::new(),
            accepted: 0,
            pending: VecDeque::new(),
            visited: HashSet::new(),
        }
    }

    pub fn key(&self, url: &Url) -> String {
        frontier_key(url, self.strip_query)
    }

    /// Adds a URL if it is new, within depth, and the page budget allows
    ///
    /// Returns whether the URL was accepted. A second offer of the same
    /// normalized URL is always rejected, whatever its depth.
    pub fn offer(&mut self, url: Url, depth: u32) -> bool {
        if depth > self.max_depth {
            return false;
        }

        let key = self.key(&url);
        if self.seen.contains(&key) {
            return false;
        }
        if self.accepted >= self.max_pages {
            return false;
        }

        self.seen.insert(key.clone());
        self.accepted += 1;
        self.pending.push_back(QueuedUrl { url, key, depth });
        true
    }

    /// Records a URL that will never be fetched, e.g. one robots.txt disallows
    ///
    /// Marks it seen without queueing it or spending page budget. Returns
    /// whether it was new and within depth, so callers count it only once.
    pub fn reject(&mut self, url: &Url, depth: u32) -> bool {
        if depth > self.max_depth {
            return false;
        }
        let key = self.key(url);
        self.seen.insert(key)
    }

    /// Removes and returns up to `n` pending URLs in discovery order
    pub fn next_batch(&mut self, n: usize) -> Vec<QueuedUrl> {
        let take = n.min(self.pending.len());
        self.pending.drain(..take).collect()
    }

    /// Records that a URL has been fetched (or given up on)
    pub fn mark_visited(&mut self, url: &Url) {
        let key = self.key(url);
        self.seen.insert(key.clone());
        self.visited.insert(key);
    }

    /// Marks an alias (e.g. a redirect target) as seen without queueing it
    pub fn mark_seen(&mut self, url: &Url) {
        let key = self.key(url);
        self.seen.insert(key);
    }

    pub fn is_seen(&self, url: &Url) -> bool {
        self.seen.contains(&self.key(url))
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(&self.key(url))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    /// True when nothing is pending or the page budget is spent
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty() || self.visited.len() >= self.max_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_offer_dedups_regardless_of_depth() {
        let mut frontier = Frontier::new(3, 100, false);
        assert!(frontier.offer(url("https://example.com/a"), 1));
        assert!(!frontier.offer(url("https://example.com/a"), 1));
        assert!(!frontier.offer(url("https://example.com/a"), 0));
        assert!(!frontier.offer(url("HTTPS://EXAMPLE.COM:443/a/"), 2));
        assert_eq!(frontier.pending_len(), 1);
    }

    #[test]
    fn test_offer_rejects_beyond_max_depth() {
        let mut frontier = Frontier::new(1, 100, false);
        assert!(frontier.offer(url("https://example.com/"), 0));
        assert!(frontier.offer(url("https://example.com/a"), 1));
        assert!(!frontier.offer(url("https://example.com/b"), 2));
    }

    #[test]
    fn test_offer_respects_page_budget() {
        let mut frontier = Frontier::new(5, 2, false);
        assert!(frontier.offer(url("https://example.com/1"), 0));
        assert!(frontier.offer(url("https://example.com/2"), 1));
        assert!(!frontier.offer(url("https://example.com/3"), 1));
    }

    #[test]
    fn test_query_sensitivity_follows_config() {
        let mut keep = Frontier::new(3, 100, false);
        assert!(keep.offer(url("https://example.com/p?page=1"), 1));
        assert!(keep.offer(url("https://example.com/p?page=2"), 1));

        let mut strip = Frontier::new(3, 100, true);
        assert!(strip.offer(url("https://example.com/p?page=1"), 1));
        assert!(!strip.offer(url("https://example.com/p?page=2"), 1));
    }

    #[test]
    fn test_next_batch_is_fifo() {
        let mut frontier = Frontier::new(3, 100, false);
        for path in ["a", "b", "c"] {
            frontier.offer(url(&format!("https://example.com/{}", path)), 1);
        }

        let first = frontier.next_batch(2);
        assert_eq!(first[0].url.path(), "/a");
        assert_eq!(first[1].url.path(), "/b");

        let rest = frontier.next_batch(10);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].url.path(), "/c");
        assert!(frontier.next_batch(1).is_empty());
    }

    #[test]
    fn test_cycle_is_broken() {
        let mut frontier = Frontier::new(10, 100, false);
        let a = url("https://example.com/a");
        let b = url("https://example.com/b");

        assert!(frontier.offer(a.clone(), 0));
        let batch = frontier.next_batch(1);
        frontier.mark_visited(&batch[0].url);

        assert!(frontier.offer(b.clone(), 1));
        let batch = frontier.next_batch(1);
        frontier.mark_visited(&batch[0].url);

        // B links back to A
        assert!(!frontier.offer(a, 2));
        assert!(frontier.is_exhausted());
    }

    #[test]
    fn test_rejected_urls_spend_no_budget() {
        let mut frontier = Frontier::new(3, 2, false);
        assert!(frontier.offer(url("https://example.com/"), 0));
        assert!(frontier.reject(&url("https://example.com/private/a"), 1));
        assert!(frontier.reject(&url("https://example.com/private/b"), 1));
        assert!(!frontier.reject(&url("https://example.com/private/a"), 1));
        assert!(!frontier.offer(url("https://example.com/private/a"), 1));
        assert!(frontier.offer(url("https://example.com/ok"), 1));
        assert_eq!(frontier.pending_len(), 2);
    }

    #[test]
    fn test_mark_seen_blocks_alias() {
        let mut frontier = Frontier::new(3, 100, false);
        frontier.mark_seen(&url("https://example.com/new-home"));
        assert!(!frontier.offer(url("https://example.com/new-home"), 1));
    }
}
