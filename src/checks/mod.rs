//! Audit checks and the registry that selects them
//!
//! Every check implements [`Check`]: it reads a frozen [`CrawlSnapshot`] and
//! the shared configuration, and produces a [`CheckResult`]. Checks never
//! mutate the snapshot and are run concurrently by the coordinator.
//!
//! A check only reports `warning` status when it could not do its job fully
//! (for example, a missing API credential). Findings about the site are
//! issues, and never change the status.

mod common;
mod registry;

mod accessibility;
mod amp;
mod analytics_tags;
mod backlinks;
mod broken_links;
mod canonical;
mod competitive;
mod content;
mod crawlability;
mod custom_checks;
mod ga4;
mod gsc;
mod hreflang;
mod images;
mod keywords;
mod lighthouse;
mod local_seo;
mod mobile;
mod onpage;
mod redirects;
mod robots;
mod security;
mod sitemap;
mod structured_data;

pub use accessibility::AccessibilityCheck;
pub use amp::AmpCheck;
pub use analytics_tags::AnalyticsTagsCheck;
pub use backlinks::BacklinksCheck;
pub use broken_links::BrokenLinksCheck;
pub use canonical::CanonicalCheck;
pub use competitive::CompetitiveCheck;
pub use content::ContentCheck;
pub use crawlability::CrawlabilityCheck;
pub use custom_checks::{CustomChecks, PageRule, RuleTarget};
pub use ga4::Ga4Check;
pub use gsc::GscCheck;
pub use hreflang::HreflangCheck;
pub use images::ImagesCheck;
pub use keywords::KeywordsCheck;
pub use lighthouse::LighthouseCheck;
pub use local_seo::LocalSeoCheck;
pub use mobile::MobileCheck;
pub use onpage::OnPageCheck;
pub use redirects::RedirectsCheck;
pub use registry::CheckRegistry;
pub use robots::RobotsCheck;
pub use security::SecurityCheck;
pub use sitemap::SitemapCheck;
pub use structured_data::StructuredDataCheck;

use crate::config::AuditConfig;
use crate::crawler::build_http_client;
use crate::snapshot::CrawlSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Every built-in check, in registration order
pub const ALL_CHECK_NAMES: [&str; 24] = [
    "ga4",
    "gsc",
    "lighthouse",
    "sitemap",
    "onpage",
    "backlinks",
    "keywords",
    "crawlability",
    "accessibility",
    "mobile",
    "security",
    "structured_data",
    "content",
    "broken_links",
    "redirects",
    "images",
    "robots",
    "canonical",
    "local_seo",
    "hreflang",
    "amp",
    "analytics_tags",
    "custom_checks",
    "competitive",
];

/// How serious an issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Most to least severe
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    /// Ran in a degraded mode (e.g. missing credential)
    Warning,
    /// Did not run or failed internally
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckStatus::Success => "success",
            CheckStatus::Warning => "warning",
            CheckStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// What a check reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Check-specific shape
    #[serde(default)]
    pub metrics: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    /// An `error` result carrying only the failure message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Error,
            issues: Vec::new(),
            recommendations: Vec::new(),
            metrics: Value::Object(Default::default()),
            error: Some(message.into()),
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// Issue counts per severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Accumulates issues and recommendations while a check runs
#[derive(Debug, Default)]
pub struct Findings {
    issues: Vec<Issue>,
    recommendations: Vec<String>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, severity: Severity, message: impl Into<String>) {
        self.issues.push(Issue {
            severity,
            message: message.into(),
            url: None,
        });
    }

    pub fn issue_at(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        url: impl Into<String>,
    ) {
        self.issues.push(Issue {
            severity,
            message: message.into(),
            url: Some(url.into()),
        });
    }

    /// Adds a recommendation unless an identical one is already present
    pub fn recommend(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !self.recommendations.contains(&text) {
            self.recommendations.push(text);
        }
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_result(self, metrics: Value) -> CheckResult {
        self.finish(CheckStatus::Success, metrics)
    }

    /// Result for a check that could only partly run
    pub fn into_warning(self, metrics: Value) -> CheckResult {
        self.finish(CheckStatus::Warning, metrics)
    }

    fn finish(self, status: CheckStatus, metrics: Value) -> CheckResult {
        CheckResult {
            status,
            issues: self.issues,
            recommendations: self.recommendations,
            metrics,
            error: None,
        }
    }
}

/// Failures that stop a check from producing a result
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Response(String),

    #[error("{0}")]
    Internal(String),

    #[error("Check cancelled")]
    Cancelled,
}

/// Shared, read-only inputs for checks beyond the snapshot
#[derive(Clone)]
pub struct CheckContext {
    pub config: Arc<AuditConfig>,
    /// For checks that call external services
    pub client: reqwest::Client,
    pub cancel: CancellationToken,
}

impl CheckContext {
    pub fn new(
        config: Arc<AuditConfig>,
        client: reqwest::Client,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            client,
            cancel,
        }
    }

    /// Builds a context with an HTTP client configured like the crawler's
    pub fn from_config(config: Arc<AuditConfig>) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        Ok(Self::new(config, client, CancellationToken::new()))
    }
}

/// One pluggable audit unit
#[async_trait]
pub trait Check: Send + Sync {
    /// Registry name, also the report key
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Analyzes the snapshot
    ///
    /// Returning `Err` (or panicking) turns this check's entry into an
    /// `error` result without affecting other checks.
    async fn run(&self, snapshot: &CrawlSnapshot, ctx: &CheckContext)
        -> Result<CheckResult, CheckError>;
}

/// Issue counts for a set of results
pub fn count_severities<'a>(results: impl IntoIterator<Item = &'a CheckResult>) -> SeverityCounts {
    let mut counts = SeverityCounts::default();
    for result in results {
        for issue in &result.issues {
            counts.add(issue.severity);
        }
    }
    counts
}

/// Histogram helper shared by checks' metrics
pub(crate) fn histogram<I, K>(items: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = K>,
    K: ToString,
{
    let mut map = BTreeMap::new();
    for item in items {
        *map.entry(item.to_string()).or_insert(0) += 1;
    }
    map
}
