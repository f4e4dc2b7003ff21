//! Crawler module for building site snapshots
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirect handling
//! - Bounded-concurrency fetch pool with per-host politeness
//! - The breadth-first URL frontier
//! - HTML document extraction
//! - Overall crawl orchestration

mod engine;
mod fetcher;
mod frontier;
mod memory;
mod parser;
mod pool;

pub use engine::{CrawlEngine, CrawlState, MAX_SITEMAP_FILES};
pub use fetcher::{
    build_http_client, detect_redirect_loop, FetchError, FetchResponse, HttpFetcher, PageFetcher,
    RedirectHop,
};
pub use frontier::{Frontier, QueuedUrl};
pub use memory::StaticFetcher;
pub use parser::extract_document;
pub use pool::{effective_delay, FetchPool, HostPacer, MAX_ROBOTS_DELAY};
