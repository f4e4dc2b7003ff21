use url::Url;

/// List of tracking query parameters dropped from frontier keys
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes user input into an absolute URL string
///
/// Adds `https://` when no scheme is present and removes a trailing slash
/// from non-root paths. This is the lightweight normalization used for
/// command-line input and report keys; crawl deduplication uses
/// [`frontier_key`].
///
/// # Examples
///
/// ```
/// use seo_audit::url::normalize_url;
///
/// assert_eq!(normalize_url("example.com"), "https://example.com");
/// assert_eq!(normalize_url("https://example.com/docs/"), "https://example.com/docs");
/// ```
pub fn normalize_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("https://{}", url);
    }

    if url.ends_with('/') && url.matches('/').count() > 3 {
        url = url.trim_end_matches('/').to_string();
    }

    url
}

/// Computes the deduplication key the frontier uses for a URL
///
/// # Key Rules
///
/// 1. Scheme and host lowercased, default ports dropped
/// 2. Path dot segments and repeated slashes collapsed
/// 3. Trailing slash removed (the root path becomes empty)
/// 4. Fragment removed
/// 5. Query string removed entirely when `strip_query` is set; otherwise
///    tracking parameters are dropped and the rest sorted by key
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_audit::url::frontier_key;
///
/// let a = Url::parse("HTTPS://Example.com:443/a/./b/?utm_source=x#top").unwrap();
/// assert_eq!(frontier_key(&a, false), "https://example.com/a/b");
/// ```
pub fn frontier_key(url: &Url, strip_query: bool) -> String {
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host.to_lowercase(), port),
        (Some(host), None) => host.to_lowercase(),
        (None, _) => String::new(),
    };

    let path = normalize_path(url.path());
    let path = if path == "/" { "" } else { path.as_str() };

    let query = if strip_query || url.query().is_none() {
        String::new()
    } else {
        let params = filter_and_sort_query_params(url);
        if params.is_empty() {
            String::new()
        } else {
            let joined = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            format!("?{}", joined)
        }
    };

    format!("{}://{}{}{}", url.scheme().to_lowercase(), host, path, query)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
