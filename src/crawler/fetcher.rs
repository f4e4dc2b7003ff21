//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - Following redirects manually so every hop is recorded
//! - Redirect loop and chain-length detection
//! - Error classification into [`FetchError`] values
//!
//! Fetching never panics or raises to the caller: every outcome is either a
//! [`FetchResponse`] (any HTTP status) or a [`FetchError`].

use crate::config::{CrawlerConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::{header::LOCATION, redirect::Policy, Client};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// One redirect response in a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    /// URL that answered with the redirect
    pub url: String,
    pub status: u16,
}

/// A completed HTTP exchange (any status code)
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// URL after all redirects were followed
    pub final_url: Url,
    pub status: u16,
    /// Header names are lowercased; repeated headers are joined with ", "
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub elapsed: Duration,
    pub redirect_chain: Vec<RedirectHop>,
}

/// Why a fetch produced no response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Too many redirects (limit {limit})")]
    TooManyRedirects { limit: usize, chain: Vec<String> },

    #[error("Redirect loop: {}", chain.join(" -> "))]
    RedirectLoop { chain: Vec<String> },

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Short machine-friendly label used in metrics
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::Connect(_) => "connect",
            FetchError::Dns(_) => "dns",
            FetchError::Tls(_) => "tls",
            FetchError::TooManyRedirects { .. } => "too_many_redirects",
            FetchError::RedirectLoop { .. } => "redirect_loop",
            FetchError::Body(_) => "body",
            FetchError::Other(_) => "other",
        }
    }
}

/// Anything that can turn a URL into a response
///
/// The crawl engine only talks to this trait, so tests can serve a site from
/// memory while production uses [`HttpFetcher`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError>;
}

/// Returns true when any URL appears twice in a redirect chain
///
/// # Example
///
/// ```
/// use seo_audit::crawler::detect_redirect_loop;
///
/// assert!(detect_redirect_loop(&["a", "b", "a"]));
/// assert!(!detect_redirect_loop(&["a", "b", "c"]));
/// ```
pub fn detect_redirect_loop<S: AsRef<str>>(chain: &[S]) -> bool {
    let unique: HashSet<&str> = chain.iter().map(|s| s.as_ref()).collect();
    unique.len() != chain.len()
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use seo_audit::config::UserAgentConfig;
/// use seo_audit::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageFetcher`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_redirects: usize,
}

impl HttpFetcher {
    pub fn new(client: Client, max_redirects: usize) -> Self {
        Self {
            client,
            max_redirects,
        }
    }

    /// Builds a client from crawler and user agent settings
    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, crawler.request_timeout())?;
        Ok(Self::new(client, crawler.max_redirects))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Fetches a URL, following up to `max_redirects` redirects by hand
    ///
    /// # Request Flow
    ///
    /// 1. Send GET request
    /// 2. On 3xx with a `Location` header, record the hop and follow it
    ///    - A URL seen twice in the chain → `RedirectLoop`
    ///    - More than `max_redirects` hops → `TooManyRedirects`
    /// 3. Otherwise read headers and body and return the response
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let start = Instant::now();
        let mut current = url.clone();
        let mut chain: Vec<RedirectHop> = Vec::new();

        loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(classify_error)?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| current.join(loc.trim()).ok());

                if let Some(next) = location {
                    chain.push(RedirectHop {
                        url: current.to_string(),
                        status: status.as_u16(),
                    });

                    let mut visited: Vec<&str> = chain.iter().map(|h| h.url.as_str()).collect();
                    visited.push(next.as_str());
                    if detect_redirect_loop(&visited) {
                        return Err(FetchError::RedirectLoop {
                            chain: visited.into_iter().map(String::from).collect(),
                        });
                    }
                    if chain.len() > self.max_redirects {
                        return Err(FetchError::TooManyRedirects {
                            limit: self.max_redirects,
                            chain: visited.into_iter().map(String::from).collect(),
                        });
                    }

                    tracing::debug!("Redirect {} {} -> {}", status.as_u16(), current, next);
                    current = next;
                    continue;
                }
                // A 3xx without a usable Location is returned as-is
            }

            let mut headers: BTreeMap<String, String> = BTreeMap::new();
            for (name, value) in response.headers() {
                let value = String::from_utf8_lossy(value.as_bytes()).to_string();
                headers
                    .entry(name.as_str().to_lowercase())
                    .and_modify(|existing| {
                        existing.push_str(", ");
                        existing.push_str(&value);
                    })
                    .or_insert(value);
            }

            let body = response
                .text()
                .await
                .map_err(|e| FetchError::Body(error_chain(&e)))?;

            return Ok(FetchResponse {
                final_url: current,
                status: status.as_u16(),
                headers,
                body,
                elapsed: start.elapsed(),
                redirect_chain: chain,
            });
        }
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(error: reqwest::Error) -> FetchError {
    let detail = error_chain(&error);
    let lowered = detail.to_lowercase();

    if error.is_timeout() {
        FetchError::Timeout
    } else if lowered.contains("dns") || lowered.contains("failed to lookup address") {
        FetchError::Dns(detail)
    } else if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl")
    {
        FetchError::Tls(detail)
    } else if error.is_connect() {
        FetchError::Connect(detail)
    } else {
        FetchError::Other(detail)
    }
}

/// Flattens an error and its sources into one message
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_detect_redirect_loop() {
        assert!(detect_redirect_loop(&["a", "b", "a"]));
        assert!(!detect_redirect_loop(&["a", "b", "c"]));
        assert!(!detect_redirect_loop::<&str>(&[]));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::RedirectLoop {
            chain: vec![
                "https://a/".to_string(),
                "https://b/".to_string(),
                "https://a/".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Redirect loop: https://a/ -> https://b/ -> https://a/"
        );
        assert_eq!(err.kind(), "redirect_loop");
        assert_eq!(FetchError::Timeout.to_string(), "Request timed out");
    }
}
