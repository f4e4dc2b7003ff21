//! In-memory [`PageFetcher`] serving canned responses
//!
//! Used to audit fixture sites deterministically (any scheme, no network).
//! Unknown URLs answer `404`.

use super::fetcher::{detect_redirect_loop, FetchError, FetchResponse, PageFetcher, RedirectHop};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

const MAX_STATIC_REDIRECTS: usize = 10;

#[derive(Debug, Clone)]
enum Canned {
    Response {
        status: u16,
        headers: BTreeMap<String, String>,
        body: String,
    },
    Redirect {
        status: u16,
        location: String,
    },
    Error(FetchError),
}

/// A fixture site held in memory
#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: HashMap<String, Canned>,
    /// Headers added to every non-redirect response
    common_headers: BTreeMap<String, String>,
    latency: Duration,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn route_key(url: &str) -> String {
        Url::parse(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string())
    }

    /// Serves `body` as `text/html` with status 200
    pub fn page(self, url: &str, body: &str) -> Self {
        self.response(url, 200, &[("content-type", "text/html; charset=utf-8")], body)
    }

    /// Serves `body` as `text/plain` with status 200
    pub fn text(self, url: &str, body: &str) -> Self {
        self.response(url, 200, &[("content-type", "text/plain")], body)
    }

    /// Serves an HTML body with an arbitrary status
    pub fn status(self, url: &str, status: u16, body: &str) -> Self {
        self.response(url, status, &[("content-type", "text/html")], body)
    }

    pub fn response(
        mut self,
        url: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Self {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.to_string()))
            .collect();
        self.routes.insert(
            Self::route_key(url),
            Canned::Response {
                status,
                headers,
                body: body.to_string(),
            },
        );
        self
    }

    pub fn redirect(mut self, from: &str, to: &str, status: u16) -> Self {
        self.routes.insert(
            Self::route_key(from),
            Canned::Redirect {
                status,
                location: to.to_string(),
            },
        );
        self
    }

    pub fn error(mut self, url: &str, error: FetchError) -> Self {
        self.routes.insert(Self::route_key(url), Canned::Error(error));
        self
    }

    /// Adds a header to every response (e.g. site-wide security headers)
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.common_headers
            .insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every URL requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut current = url.clone();
        let mut chain: Vec<RedirectHop> = Vec::new();

        loop {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(current.to_string());

            match self.routes.get(current.as_str()) {
                Some(Canned::Error(e)) => return Err(e.clone()),
                Some(Canned::Redirect { status, location }) => {
                    let next = current
                        .join(location)
                        .map_err(|e| FetchError::Other(e.to_string()))?;
                    chain.push(RedirectHop {
                        url: current.to_string(),
                        status: *status,
                    });

                    let mut visited: Vec<String> = chain.iter().map(|h| h.url.clone()).collect();
                    visited.push(next.to_string());
                    if detect_redirect_loop(&visited) {
                        return Err(FetchError::RedirectLoop { chain: visited });
                    }
                    if chain.len() > MAX_STATIC_REDIRECTS {
                        return Err(FetchError::TooManyRedirects {
                            limit: MAX_STATIC_REDIRECTS,
                            chain: visited,
                        });
                    }
                    current = next;
                }
                Some(Canned::Response {
                    status,
                    headers,
                    body,
                }) => {
                    let mut all_headers = self.common_headers.clone();
                    all_headers.extend(headers.clone());
                    return Ok(FetchResponse {
                        final_url: current,
                        status: *status,
                        headers: all_headers,
                        body: body.clone(),
                        elapsed: self.latency,
                        redirect_chain: chain,
                    });
                }
                None => {
                    return Ok(FetchResponse {
                        final_url: current,
                        status: 404,
                        headers: BTreeMap::from([(
                            "content-type".to_string(),
                            "text/plain".to_string(),
                        )]),
                        body: "Not Found".to_string(),
                        elapsed: self.latency,
                        redirect_chain: chain,
                    })
                }
            }
        }
    }
}
