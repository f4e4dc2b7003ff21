use crate::UrlError;
use url::Url;

/// Extracts the network location (host plus non-default port) from a URL
///
/// Returns an empty string when the input cannot be parsed.
///
/// # Examples
///
/// ```
/// use seo_audit::url::get_domain;
///
/// assert_eq!(get_domain("https://example.com/path"), "example.com");
/// assert_eq!(get_domain("http://127.0.0.1:8080/"), "127.0.0.1:8080");
/// assert_eq!(get_domain("not a url"), "");
/// ```
pub fn get_domain(url: &str) -> String {
    Url::parse(url)
        .map(|u| netloc(&u))
        .unwrap_or_default()
}

/// Network location of an already-parsed URL
pub fn netloc(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host.to_lowercase(), port),
        (Some(host), None) => host.to_lowercase(),
        (None, _) => String::new(),
    }
}

/// Returns `scheme://netloc` for a URL, or an empty string if unparseable
pub fn get_base_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => format!("{}://{}", u.scheme(), netloc(&u)),
        Err(_) => String::new(),
    }
}

/// Checks whether a URL belongs to the audited domain or one of its subdomains
///
/// # Examples
///
/// ```
/// use seo_audit::url::is_internal_link;
///
/// assert!(is_internal_link("https://example.com/a", "example.com"));
/// assert!(is_internal_link("https://blog.example.com/a", "example.com"));
/// assert!(!is_internal_link("https://notexample.com/a", "example.com"));
/// ```
pub fn is_internal_link(url: &str, domain: &str) -> bool {
    let url_domain = get_domain(url);
    if url_domain.is_empty() {
        return false;
    }
    let domain = domain.to_lowercase();
    url_domain == domain || url_domain.ends_with(&format!(".{}", domain))
}

/// Validates audit input and returns the domain's network location
///
/// Accepts a bare hostname (`example.com`), a `host:port` pair, or a full
/// URL. Hostnames must contain at least one dot (or be `localhost`) and may
/// only use alphanumerics, dots and hyphens.
pub fn validate_domain(input: &str) -> Result<String, UrlError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UrlError::InvalidDomain("domain cannot be empty".to_string()));
    }

    let netloc_part = if input.contains("://") {
        let url = Url::parse(input).map_err(|e| UrlError::Parse(e.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }
        let host = netloc(&url);
        if host.is_empty() {
            return Err(UrlError::MissingDomain);
        }
        host
    } else {
        input
            .split('/')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    };

    let (host, port) = match netloc_part.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (netloc_part.as_str(), None),
    };

    if let Some(port) = port {
        port.parse::<u16>()
            .map_err(|_| UrlError::InvalidDomain(format!("invalid port in '{}'", input)))?;
    }

    validate_hostname(host)?;
    Ok(netloc_part.to_lowercase())
}

/// Validates a hostname string (no port)
fn validate_hostname(host: &str) -> Result<(), UrlError> {
    if host.is_empty() {
        return Err(UrlError::InvalidDomain("hostname cannot be empty".to_string()));
    }

    if host == "localhost" {
        return Ok(());
    }

    if !host.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-') {
        return Err(UrlError::InvalidDomain(format!(
            "'{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(UrlError::InvalidDomain(format!(
            "'{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(UrlError::InvalidDomain(format!(
            "'{}' cannot contain consecutive dots",
            host
        )));
    }

    if !host.contains('.') {
        return Err(UrlError::InvalidDomain(format!(
            "'{}' must contain at least one dot",
            host
        )));
    }

    Ok(())
}
