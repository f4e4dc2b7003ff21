//! Per-page records held by a crawl snapshot

use crate::crawler::{extract_document, FetchError, FetchResponse, RedirectHop};
use crate::url::frontier_key;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// One heading element in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// 1 through 6
    pub level: u8,
    pub text: String,
}

/// An outbound `<a href>` link, already resolved to an absolute URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub text: String,
    /// Lowercased `rel` tokens
    pub rel: Vec<String>,
    pub title: Option<String>,
}

impl Link {
    pub fn is_nofollow(&self) -> bool {
        self.rel
            .iter()
            .any(|r| r == "nofollow" || r == "ugc" || r == "sponsored")
    }
}

/// An `<img>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Absolute when resolvable, raw attribute value otherwise
    pub src: String,
    /// `None` when the attribute is absent; `Some("")` marks a decorative image
    pub alt: Option<String>,
    pub title: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub loading: Option<String>,
}

/// A `<link rel href>` element from the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadLink {
    pub rel: Vec<String>,
    pub href: String,
    pub hreflang: Option<String>,
}

impl HeadLink {
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rel.iter().any(|r| r == rel)
    }
}

/// A JSON-LD `<script>` block
#[derive(Debug, Clone, PartialEq)]
pub enum JsonLdBlock {
    Valid(Value),
    /// Present on the page but not parseable JSON
    Malformed { raw: String, error: String },
}

/// Structured view of one HTML page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageDocument {
    /// First `<title>` wins
    pub title: Option<String>,
    pub title_count: usize,
    pub meta_description: Option<String>,
    /// Keyed by lowercased `name`, `property` or `http-equiv`; first wins
    pub meta_tags: BTreeMap<String, String>,
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
    pub images: Vec<Image>,
    pub head_links: Vec<HeadLink>,
    /// Resolved against the page URL
    pub canonical: Option<String>,
    pub canonical_count: usize,
    pub json_ld: Vec<JsonLdBlock>,
    pub lang: Option<String>,
    pub is_amp: bool,
    /// Visible text with scripts and styles removed
    pub text: String,
    /// Raw markup, for checks that need selectors the extractor doesn't cover
    pub html: String,
    /// Recoverable oddities found while parsing
    pub warnings: Vec<String>,
}

impl PageDocument {
    pub fn meta(&self, name: &str) -> Option<&str> {
        self.meta_tags.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn headings_at(&self, level: u8) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(move |h| h.level == level)
    }

    pub fn h1_count(&self) -> usize {
        self.headings_at(1).count()
    }

    /// `rel="alternate"` links carrying an `hreflang`
    pub fn alternates(&self) -> impl Iterator<Item = &HeadLink> {
        self.head_links
            .iter()
            .filter(|l| l.has_rel("alternate") && l.hreflang.is_some())
    }

    pub fn amphtml(&self) -> Option<&str> {
        self.head_links
            .iter()
            .find(|l| l.has_rel("amphtml"))
            .map(|l| l.href.as_str())
    }

    /// Directives from `<meta name="robots">` (lowercased)
    pub fn robots_directives(&self) -> Vec<String> {
        self.meta("robots")
            .map(split_directives)
            .unwrap_or_default()
    }

    pub fn json_ld_values(&self) -> impl Iterator<Item = &Value> {
        self.json_ld.iter().filter_map(|b| match b {
            JsonLdBlock::Valid(v) => Some(v),
            JsonLdBlock::Malformed { .. } => None,
        })
    }

    pub fn word_count(&self) -> usize {
        crate::text::count_words(&self.text)
    }
}

/// What the crawl learned about a page's body
#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    Document(Box<PageDocument>),
    /// Fetched, but not a successful HTML response
    Unparsed { reason: String },
    Failed(FetchError),
}

/// One fetched (or failed) page in a snapshot
///
/// A record has either a document or a fetch error, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// The URL that was requested
    pub url: Url,
    /// Deduplication key of `url`
    pub key: String,
    pub depth: u32,
    /// Where the redirect chain ended; equals `url` without redirects
    pub final_url: Url,
    pub status: Option<u16>,
    /// Lowercased header names
    pub headers: BTreeMap<String, String>,
    pub redirect_chain: Vec<RedirectHop>,
    pub elapsed: Duration,
    pub content: PageContent,
}

impl PageRecord {
    /// Builds a record from a completed fetch, parsing successful HTML bodies
    pub fn from_response(url: Url, depth: u32, response: FetchResponse, strip_query: bool) -> Self {
        let key = frontier_key(&url, strip_query);
        let content_type = response
            .headers
            .get("content-type")
            .cloned()
            .unwrap_or_default();

        let content = if !(200..300).contains(&response.status) {
            PageContent::Unparsed {
                reason: format!("HTTP {}", response.status),
            }
        } else if !is_html_content_type(&content_type) {
            PageContent::Unparsed {
                reason: format!("Expected HTML, got {}", content_type),
            }
        } else {
            let document = extract_document(&response.final_url, &response.body);
            PageContent::Document(Box::new(document))
        };

        Self {
            url,
            key,
            depth,
            final_url: response.final_url,
            status: Some(response.status),
            headers: response.headers,
            redirect_chain: response.redirect_chain,
            elapsed: response.elapsed,
            content,
        }
    }

    /// Builds a record for a fetch that never produced a response
    pub fn from_error(url: Url, depth: u32, error: FetchError, strip_query: bool) -> Self {
        Self {
            key: frontier_key(&url, strip_query),
            final_url: url.clone(),
            url,
            depth,
            status: None,
            headers: BTreeMap::new(),
            redirect_chain: Vec::new(),
            elapsed: Duration::ZERO,
            content: PageContent::Failed(error),
        }
    }

    pub fn document(&self) -> Option<&PageDocument> {
        match &self.content {
            PageContent::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.content {
            PageContent::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// 2xx response
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }

    /// Failed fetch or a 4xx/5xx response
    pub fn is_broken(&self) -> bool {
        self.error().is_some() || matches!(self.status, Some(s) if s >= 400)
    }

    /// Combined `X-Robots-Tag` and meta robots directives
    pub fn robots_directives(&self) -> Vec<String> {
        let mut directives = self
            .header("x-robots-tag")
            .map(split_directives)
            .unwrap_or_default();
        if let Some(doc) = self.document() {
            directives.extend(doc.robots_directives());
        }
        directives
    }

    pub fn is_noindex(&self) -> bool {
        self.robots_directives()
            .iter()
            .any(|d| d == "noindex" || d == "none")
    }

    pub fn is_nofollow(&self) -> bool {
        self.robots_directives()
            .iter()
            .any(|d| d == "nofollow" || d == "none")
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    // Servers that omit the header are assumed to serve HTML
    let ct = content_type.to_lowercase();
    ct.is_empty() || ct.contains("text/html") || ct.contains("application/xhtml")
}

fn split_directives(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}
