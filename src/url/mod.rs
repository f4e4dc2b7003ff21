//! URL handling module
//!
//! This module provides URL normalization, frontier deduplication keys,
//! domain extraction, internal-link classification and small URL helpers
//! shared by the crawler and the checks.

mod domain;
mod normalize;

pub use domain::{get_base_url, get_domain, is_internal_link, netloc, validate_domain};
pub use normalize::{frontier_key, normalize_url};

use std::collections::HashMap;
use url::Url;

/// Components of a parsed URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: String,
    pub domain: String,
    pub path: String,
    pub query: HashMap<String, Vec<String>>,
    pub fragment: String,
    pub base_url: String,
}

/// Checks whether a string is an absolute URL with a scheme and host
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.has_host() && !u.scheme().is_empty())
        .unwrap_or(false)
}

/// Resolves `relative` against `base`; returns `relative` unchanged when
/// either side cannot be parsed
pub fn join_urls(base: &str, relative: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(relative))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| relative.to_string())
}

/// Drops the query string and fragment from a URL
pub fn remove_query_params(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => format!("{}://{}{}", u.scheme(), netloc(&u), u.path()),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Lowercased file extension of the URL path, or an empty string
///
/// # Examples
///
/// ```
/// use seo_audit::url::get_url_extension;
///
/// assert_eq!(get_url_extension("https://example.com/img/logo.PNG?v=2"), "png");
/// assert_eq!(get_url_extension("https://example.com/about"), "");
/// ```
pub fn get_url_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let last_segment = path.rsplit('/').next().unwrap_or_default();
    match last_segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

/// Splits a URL into its components
pub fn parse_url_parts(url: &str) -> Option<UrlParts> {
    let parsed = Url::parse(url).ok()?;

    let mut query: HashMap<String, Vec<String>> = HashMap::new();
    for (k, v) in parsed.query_pairs() {
        query.entry(k.to_string()).or_default().push(v.to_string());
    }

    let domain = netloc(&parsed);
    Some(UrlParts {
        scheme: parsed.scheme().to_string(),
        base_url: format!("{}://{}", parsed.scheme(), domain),
        domain,
        path: parsed.path().to_string(),
        query,
        fragment: parsed.fragment().unwrap_or_default().to_string(),
    })
}
