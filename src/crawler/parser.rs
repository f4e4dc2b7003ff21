//! HTML parser for building page documents
//!
//! This module handles parsing HTML content to extract:
//! - Title, meta description and all meta tags
//! - Headings in document order
//! - Links (with anchor text and `rel`) and head `<link>` elements
//! - Images with their `alt`, dimensions and loading hints
//! - Canonical URL, JSON-LD blocks, `<html lang>` and the AMP marker
//! - Visible text
//!
//! Parsing never fails: malformed markup yields a best-effort document with
//! missing fields left empty, and problems are recorded as warnings.

use crate::snapshot::{Heading, HeadLink, Image, JsonLdBlock, Link, PageDocument};
use crate::text::clean_text;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose text never reaches the reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Parses HTML content into a [`PageDocument`]
///
/// # Precedence Rules
///
/// - Duplicate `<title>` or canonical tags: first occurrence wins
/// - Duplicate meta tags with the same key: first occurrence wins
/// - Relative URLs (links, images, canonical) resolve against `page_url`
///
/// # Link Extraction Rules
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links (same page anchors)
///
/// **Note:** `rel="nofollow"` links are kept; their `rel` is recorded
///
/// # Example
///
/// ```
/// use seo_audit::crawler::extract_document;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title><link rel="canonical" href="/c"></head>
///               <body><a href="/page">Link</a></body></html>"#;
/// let page_url = Url::parse("https://example.com/blog/post").unwrap();
/// let doc = extract_document(&page_url, html);
/// assert_eq!(doc.title.as_deref(), Some("Test"));
/// assert_eq!(doc.canonical.as_deref(), Some("https://example.com/c"));
/// assert_eq!(doc.links[0].url, "https://example.com/page");
/// ```
pub fn extract_document(page_url: &Url, html: &str) -> PageDocument {
    let document = Html::parse_document(html);
    let mut doc = PageDocument {
        html: html.to_string(),
        ..PageDocument::default()
    };

    extract_title(&document, &mut doc);
    extract_meta(&document, &mut doc);
    doc.headings = extract_headings(&document);
    doc.links = extract_links(&document, page_url);
    doc.images = extract_images(&document, page_url);
    extract_head_links(&document, page_url, &mut doc);
    extract_json_ld(&document, &mut doc);
    extract_root_attributes(&document, &mut doc);
    doc.text = visible_text(&document);

    doc
}

/// Returns elements matching a selector, or nothing if the selector is invalid
fn select<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

fn attr(element: &ElementRef<'_>, name: &str) -> Option<String> {
    element.value().attr(name).map(|v| v.trim().to_string())
}

fn extract_title(document: &Html, doc: &mut PageDocument) {
    let titles = select(document, "title");
    doc.title_count = titles.len();
    doc.title = titles
        .first()
        .map(element_text)
        .filter(|s| !s.is_empty());

    if titles.len() > 1 {
        doc.warnings
            .push(format!("{} <title> elements found; using the first", titles.len()));
    }
}

fn extract_meta(document: &Html, doc: &mut PageDocument) {
    for element in select(document, "meta") {
        if let Some(charset) = attr(&element, "charset") {
            doc.meta_tags
                .entry("charset".to_string())
                .or_insert(charset);
            continue;
        }

        let key = attr(&element, "name")
            .or_else(|| attr(&element, "property"))
            .or_else(|| attr(&element, "http-equiv"))
            .map(|k| k.to_lowercase());
        let (Some(key), Some(content)) = (key, attr(&element, "content")) else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        doc.meta_tags.entry(key).or_insert(content);
    }

    doc.meta_description = doc
        .meta_tags
        .get("description")
        .map(|d| clean_text(d))
        .filter(|d| !d.is_empty());
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    select(document, "h1, h2, h3, h4, h5, h6")
        .iter()
        .filter_map(|element| {
            let level = element.value().name().strip_prefix('h')?.parse::<u8>().ok()?;
            Some(Heading {
                level,
                text: element_text(element),
            })
        })
        .collect()
}

fn extract_links(document: &Html, page_url: &Url) -> Vec<Link> {
    select(document, "a[href]")
        .iter()
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = resolve_link(href, page_url)?;
            Some(Link {
                url,
                text: element_text(element),
                rel: rel_tokens(element),
                title: attr(element, "title"),
            })
        })
        .collect()
}

fn extract_images(document: &Html, page_url: &Url) -> Vec<Image> {
    select(document, "img")
        .iter()
        .filter_map(|element| {
            let src = attr(element, "src")
                .or_else(|| attr(element, "data-src"))
                .filter(|s| !s.is_empty())?;
            let src = page_url
                .join(&src)
                .map(|u| u.to_string())
                .unwrap_or(src);
            Some(Image {
                src,
                alt: element.value().attr("alt").map(str::to_string),
                title: attr(element, "title"),
                width: attr(element, "width"),
                height: attr(element, "height"),
                loading: attr(element, "loading").map(|l| l.to_lowercase()),
            })
        })
        .collect()
}

fn extract_head_links(document: &Html, page_url: &Url, doc: &mut PageDocument) {
    for element in select(document, "link[rel][href]") {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(href) = resolve_link(href, page_url) else {
            continue;
        };
        doc.head_links.push(HeadLink {
            rel: rel_tokens(&element),
            href,
            hreflang: attr(&element, "hreflang").filter(|h| !h.is_empty()),
        });
    }

    let canonicals: Vec<&HeadLink> = doc
        .head_links
        .iter()
        .filter(|l| l.has_rel("canonical"))
        .collect();
    doc.canonical_count = canonicals.len();
    doc.canonical = canonicals.first().map(|l| l.href.clone());

    if doc.canonical_count > 1 {
        doc.warnings.push(format!(
            "{} canonical links found; using the first",
            doc.canonical_count
        ));
    }
}

fn extract_json_ld(document: &Html, doc: &mut PageDocument) {
    for element in select(document, "script[type]") {
        let is_json_ld = element
            .value()
            .attr("type")
            .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
            .unwrap_or(false);
        if !is_json_ld {
            continue;
        }

        let raw = element.text().collect::<String>().trim().to_string();
        match serde_json::from_str(&raw) {
            Ok(value) => doc.json_ld.push(JsonLdBlock::Valid(value)),
            Err(e) => {
                doc.warnings.push(format!("Malformed JSON-LD block: {}", e));
                doc.json_ld.push(JsonLdBlock::Malformed {
                    raw,
                    error: e.to_string(),
                });
            }
        }
    }
}

fn extract_root_attributes(document: &Html, doc: &mut PageDocument) {
    let root = document.root_element();
    doc.lang = attr(&root, "lang").filter(|l| !l.is_empty());
    doc.is_amp = root.value().attr("amp").is_some() || root.value().attr("⚡").is_some();
}

/// Collects text nodes outside scripts, styles and the document head
fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    clean_text(&parts.join(" "))
}

fn rel_tokens(element: &ElementRef<'_>) -> Vec<String> {
    element
        .value()
        .attr("rel")
        .map(|rel| rel.split_whitespace().map(|r| r.to_lowercase()).collect())
        .unwrap_or_default()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            // Only accept HTTP and HTTPS URLs
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    fn parse(html: &str) -> PageDocument {
        extract_document(&base_url(), html)
    }

    #[test]
    fn test_extract_title_with_whitespace() {
        let doc = parse(r#"<html><head><title>  Test   Page  </title></head><body></body></html>"#);
        assert_eq!(doc.title, Some("Test Page".to_string()));
        assert_eq!(doc.title_count, 1);
    }

    #[test]
    fn test_first_title_wins() {
        let doc = parse(r#"<html><head><title>First</title><title>Second</title></head></html>"#);
        assert_eq!(doc.title.as_deref(), Some("First"));
        assert_eq!(doc.title_count, 2);
        assert_eq!(doc.warnings.len(), 1);
    }

    #[test]
    fn test_no_title() {
        let doc = parse(r#"<html><head></head><body></body></html>"#);
        assert_eq!(doc.title, None);
    }

    #[test]
    fn test_meta_tags() {
        let doc = parse(
            r#"<html><head>
                <meta charset="utf-8">
                <meta name="Description" content="  A page  about things ">
                <meta name="description" content="ignored">
                <meta property="og:title" content="OG">
                <meta http-equiv="Content-Language" content="en">
                <meta name="viewport" content="width=device-width, initial-scale=1">
            </head></html>"#,
        );
        assert_eq!(doc.meta_description.as_deref(), Some("A page about things"));
        assert_eq!(doc.meta("og:title"), Some("OG"));
        assert_eq!(doc.meta("content-language"), Some("en"));
        assert_eq!(doc.meta("charset"), Some("utf-8"));
        assert!(doc.meta("viewport").unwrap().contains("device-width"));
    }

    #[test]
    fn test_headings_in_document_order() {
        let doc = parse(r#"<body><h2>B</h2><h1>A</h1><h3>C <em>c</em></h3></body>"#);
        let levels: Vec<u8> = doc.headings.iter().map(|h| h.level).collect();
        assert_eq!(levels, vec![2, 1, 3]);
        assert_eq!(doc.headings[2].text, "C c");
        assert_eq!(doc.h1_count(), 1);
    }

    #[test]
    fn test_extract_links() {
        let doc = parse(
            r##"<body>
                <a href="/valid" rel="nofollow UGC" title="t">Valid</a>
                <a href="other">Relative</a>
                <a href="https://other.com/page3">External</a>
                <a href="javascript:alert('no')">Invalid</a>
                <a href="mailto:test@example.com">Invalid</a>
                <a href="tel:+1234567890">Invalid</a>
                <a href="data:text/html,x">Invalid</a>
                <a href="#section">Jump</a>
            </body>"##,
        );
        assert_eq!(doc.links.len(), 3);
        assert_eq!(doc.links[0].url, "https://example.com/valid");
        assert_eq!(doc.links[0].rel, vec!["nofollow", "ugc"]);
        assert!(doc.links[0].is_nofollow());
        assert_eq!(doc.links[0].title.as_deref(), Some("t"));
        assert_eq!(doc.links[1].url, "https://example.com/blog/other");
        assert_eq!(doc.links[2].text, "External");
    }

    #[test]
    fn test_extract_images() {
        let doc = parse(
            r#"<body>
                <img src="/a.png" alt="Logo" width="10" height="20" loading="LAZY">
                <img src="b.jpg">
                <img src="c.gif" alt="">
                <img alt="no source">
            </body>"#,
        );
        assert_eq!(doc.images.len(), 3);
        assert_eq!(doc.images[0].src, "https://example.com/a.png");
        assert_eq!(doc.images[0].alt.as_deref(), Some("Logo"));
        assert_eq!(doc.images[0].loading.as_deref(), Some("lazy"));
        assert_eq!(doc.images[1].src, "https://example.com/blog/b.jpg");
        assert_eq!(doc.images[1].alt, None);
        assert_eq!(doc.images[2].alt.as_deref(), Some(""));
    }

    #[test]
    fn test_relative_canonical_resolves_against_page() {
        let doc = parse(r#"<head><link rel="canonical" href="canonical-post"></head>"#);
        assert_eq!(
            doc.canonical.as_deref(),
            Some("https://example.com/blog/canonical-post")
        );
    }

    #[test]
    fn test_first_canonical_wins() {
        let doc = parse(
            r#"<head>
                <link rel="canonical" href="https://example.com/one">
                <link rel="canonical" href="https://example.com/two">
            </head>"#,
        );
        assert_eq!(doc.canonical.as_deref(), Some("https://example.com/one"));
        assert_eq!(doc.canonical_count, 2);
        assert!(!doc.warnings.is_empty());
    }

    #[test]
    fn test_head_links_and_alternates() {
        let doc = parse(
            r#"<head>
                <link rel="stylesheet" href="/style.css">
                <link rel="alternate" hreflang="de" href="https://example.com/de/">
                <link rel="amphtml" href="/blog/post.amp">
            </head>"#,
        );
        assert_eq!(doc.head_links.len(), 3);
        assert_eq!(doc.alternates().count(), 1);
        assert_eq!(doc.amphtml(), Some("https://example.com/blog/post.amp"));
    }

    #[test]
    fn test_malformed_json_ld_is_kept() {
        let doc = parse(
            r#"<head>
                <script type="application/ld+json">{"@type": "Organization", "name": "X"}</script>
                <script type="application/ld+json">{"@type": "WebSite",</script>
            </head>"#,
        );
        assert_eq!(doc.json_ld.len(), 2);
        assert!(matches!(doc.json_ld[0], JsonLdBlock::Valid(_)));
        assert!(matches!(doc.json_ld[1], JsonLdBlock::Malformed { .. }));
        assert_eq!(doc.json_ld_values().count(), 1);
        assert!(doc.warnings.iter().any(|w| w.contains("JSON-LD")));
    }

    #[test]
    fn test_lang_and_amp() {
        let doc = parse(r#"<html lang="en-US" amp><head></head><body></body></html>"#);
        assert_eq!(doc.lang.as_deref(), Some("en-US"));
        assert!(doc.is_amp);

        let plain = parse(r#"<html><body></body></html>"#);
        assert_eq!(plain.lang, None);
        assert!(!plain.is_amp);
    }

    #[test]
    fn test_visible_text_skips_scripts_and_styles() {
        let doc = parse(
            r#"<html><head><title>Hidden title</title><style>p { color: red }</style></head>
            <body><p>Hello   <b>world</b></p><script>var x = 1;</script><noscript>nope</noscript></body></html>"#,
        );
        assert_eq!(doc.text, "Hello world");
        assert_eq!(doc.word_count(), 2);
    }

    #[test]
    fn test_malformed_html_does_not_fail() {
        let doc = parse("<html><head><title>Broken<body><a href='/x'>x<div></p></html");
        assert!(doc.title.is_some());
        assert!(!doc.html.is_empty());
    }
}
