use crate::checks::{Severity, ALL_CHECK_NAMES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for an audit process
///
/// Read once at startup and shared read-only afterwards. Every section has
/// defaults, so an empty TOML file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AuditConfig {
    pub crawler: CrawlerConfig,
    pub user_agent: UserAgentConfig,
    pub audit: AuditSettings,
    pub api_keys: ApiKeys,
    pub content: ContentConfig,
    pub images: ImageConfig,
    pub security: SecurityConfig,
    pub schema: SchemaConfig,
    pub lighthouse: LighthouseConfig,
    pub local_seo: LocalSeoConfig,
    pub competitive: CompetitiveConfig,
    pub custom_rules: Vec<CustomRuleConfig>,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed URL
    pub max_depth: u32,

    /// Maximum number of pages fetched per domain
    pub max_pages: usize,

    /// Minimum time between dispatches to the same host (milliseconds)
    pub crawl_delay_ms: u64,

    /// Maximum number of concurrent page fetches
    pub max_concurrent_fetches: usize,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Maximum redirect hops followed per request
    pub max_redirects: usize,

    /// Treat URLs differing only by query string as the same page
    pub strip_query_strings: bool,

    /// Skip URLs disallowed by robots.txt
    pub respect_robots_txt: bool,

    /// Fetch off-domain links once to record their status
    pub probe_external_links: bool,

    /// Upper bound on off-domain probes per crawl
    pub max_external_probes: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 1000,
            crawl_delay_ms: 1000,
            max_concurrent_fetches: 10,
            request_timeout_secs: 30,
            max_redirects: 10,
            strip_query_strings: false,
            respect_robots_txt: true,
            probe_external_links: true,
            max_external_probes: 100,
        }
    }
}

impl CrawlerConfig {
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_millis(self.crawl_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SEOAuditBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Run-level limits and check selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AuditSettings {
    /// Process-wide limit on audits running at once; extra runs queue
    pub max_concurrent_audits: usize,

    /// Whole-run timeout (seconds)
    pub timeout_secs: u64,

    /// Checks executing concurrently within one run
    pub max_concurrent_checks: usize,

    /// Checks that run when no explicit selection is given
    pub enabled_checks: Vec<String>,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            max_concurrent_audits: 5,
            timeout_secs: 300,
            max_concurrent_checks: 4,
            enabled_checks: ALL_CHECK_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AuditSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Optional third-party credentials, one per integration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ApiKeys {
    pub google_analytics: Option<String>,
    pub google_search_console: Option<String>,
    pub lighthouse: Option<String>,
    pub backlink: Option<String>,
}

/// Content analysis thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ContentConfig {
    /// Pages with fewer words are thin
    pub thin_content_words: usize,

    /// Word-set similarity at or above which two pages are duplicates
    pub duplicate_threshold: f64,

    /// Pairwise comparison is limited to this many pages
    pub max_similarity_pages: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            thin_content_words: 300,
            duplicate_threshold: 0.8,
            max_similarity_pages: 200,
        }
    }
}

/// Image optimization settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ImageConfig {
    pub max_image_bytes: u64,
    pub supported_formats: Vec<String>,

    /// Issue HEAD requests to learn image sizes
    pub probe_sizes: bool,
    pub max_size_probes: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 500 * 1024,
            supported_formats: ["webp", "jpg", "jpeg", "png", "svg", "avif", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            probe_sizes: false,
            max_size_probes: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecurityConfig {
    pub required_headers: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            required_headers: [
                "Strict-Transport-Security",
                "X-Content-Type-Options",
                "X-Frame-Options",
                "Content-Security-Policy",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SchemaConfig {
    pub required_types: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            required_types: ["Organization", "WebSite", "BreadcrumbList"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// PageSpeed Insights settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LighthouseConfig {
    pub categories: Vec<String>,

    /// `mobile` or `desktop`
    pub device: String,

    pub endpoint: String,
}

impl Default for LighthouseConfig {
    fn default() -> Self {
        Self {
            categories: ["performance", "accessibility", "best-practices", "seo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            device: "mobile".to_string(),
            endpoint: "https://www.googleapis.com/pagespeedonline/v5/runPagespeed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LocalSeoConfig {
    /// Compare Name/Address/Phone across pages
    pub nap_check: bool,
}

impl Default for LocalSeoConfig {
    fn default() -> Self {
        Self { nap_check: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompetitiveConfig {
    /// Competitor domains to compare against
    pub competitors: Vec<String>,
}

/// What a custom rule tests on each page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustomRuleKind {
    /// CSS selector must match at least one element
    ElementPresent,
    /// CSS selector must match nothing
    ElementAbsent,
    /// Visible text must contain the target (case-insensitive)
    TextContains,
    /// Response must carry the named header
    HeaderPresent,
}

/// One user-defined page rule
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CustomRuleConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: CustomRuleKind,
    pub target: String,
    #[serde(default = "default_rule_severity")]
    pub severity: Severity,
}

fn default_rule_severity() -> Severity {
    Severity::Medium
}

/// Report rendering format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Json,
    Markdown,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    pub format: ReportFormat,
}
