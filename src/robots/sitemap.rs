//! XML sitemap parsing
//!
//! Handles both `<urlset>` sitemaps and `<sitemapindex>` files. Parsing is
//! tolerant: entries are pulled out with patterns rather than a validating
//! XML parser, and structural problems are reported as errors on the result.

use regex::Regex;
use std::sync::LazyLock;

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(url|sitemap)\b[^>]*>(.*?)</(?:url|sitemap)\s*>").expect("valid entry regex")
});

static LOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").expect("valid loc regex"));

static LASTMOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<lastmod>\s*(.*?)\s*</lastmod>").expect("valid lastmod regex")
});

/// Protocol limit on URLs per sitemap file
pub const MAX_SITEMAP_URLS: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapKind {
    UrlSet,
    Index,
    Unknown,
}

/// One `<url>` or `<sitemap>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
}

/// Parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sitemap {
    pub kind: SitemapKind,
    pub entries: Vec<SitemapEntry>,
    pub errors: Vec<String>,
}

impl Sitemap {
    pub fn locs(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.loc.as_str())
    }
}

/// Parses sitemap XML into its entries
pub fn parse_sitemap(xml: &str) -> Sitemap {
    let lowered = xml.to_lowercase();
    let kind = if lowered.contains("<sitemapindex") {
        SitemapKind::Index
    } else if lowered.contains("<urlset") {
        SitemapKind::UrlSet
    } else {
        SitemapKind::Unknown
    };

    let mut errors = Vec::new();
    if kind == SitemapKind::Unknown {
        errors.push("Missing <urlset> or <sitemapindex> root element".to_string());
    }

    let mut entries = Vec::new();
    for caps in ENTRY_RE.captures_iter(xml) {
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let Some(loc) = LOC_RE.captures(body).and_then(|c| c.get(1)) else {
            errors.push("Entry without <loc>".to_string());
            continue;
        };
        let loc = decode_entities(loc.as_str());
        if !(loc.starts_with("http://") || loc.starts_with("https://")) {
            errors.push(format!("Invalid <loc> '{}'", loc));
            continue;
        }
        let lastmod = LASTMOD_RE
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        entries.push(SitemapEntry { loc, lastmod });
    }

    if entries.len() > MAX_SITEMAP_URLS {
        errors.push(format!(
            "{} entries exceeds the {} URL limit",
            entries.len(),
            MAX_SITEMAP_URLS
        ));
    }

    Sitemap {
        kind,
        entries,
        errors,
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc><lastmod>2024-01-01</lastmod></url>
  <url>
    <loc> https://example.com/a?x=1&amp;y=2 </loc>
  </url>
</urlset>"#;
        let sitemap = parse_sitemap(xml);
        assert_eq!(sitemap.kind, SitemapKind::UrlSet);
        assert_eq!(sitemap.entries.len(), 2);
        assert_eq!(sitemap.entries[0].lastmod.as_deref(), Some("2024-01-01"));
        assert_eq!(sitemap.entries[1].loc, "https://example.com/a?x=1&y=2");
        assert!(sitemap.errors.is_empty());
    }

    #[test]
    fn test_parse_index() {
        let xml = r#"<sitemapindex><sitemap><loc>https://example.com/s1.xml</loc></sitemap></sitemapindex>"#;
        let sitemap = parse_sitemap(xml);
        assert_eq!(sitemap.kind, SitemapKind::Index);
        assert_eq!(sitemap.locs().collect::<Vec<_>>(), vec!["https://example.com/s1.xml"]);
    }

    #[test]
    fn test_parse_garbage() {
        let sitemap = parse_sitemap("<html><body>Not found</body></html>");
        assert_eq!(sitemap.kind, SitemapKind::Unknown);
        assert!(sitemap.entries.is_empty());
        assert!(!sitemap.errors.is_empty());
    }

    #[test]
    fn test_relative_loc_is_an_error() {
        let sitemap = parse_sitemap("<urlset><url><loc>/page</loc></url></urlset>");
        assert!(sitemap.entries.is_empty());
        assert_eq!(sitemap.errors.len(), 1);
    }
}
