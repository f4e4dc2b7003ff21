//! SEO Audit: a crawl-and-check website auditor
//!
//! This crate crawls one domain into an immutable snapshot and runs a set of
//! pluggable audit checks (on-page, security, accessibility, structured data,
//! and more) against it, assembling the results into a single report.

pub mod audit;
pub mod checks;
pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod snapshot;
pub mod text;
pub mod url;

use thiserror::Error;

/// Main error type for run-level failures
///
/// Page-level and check-level failures never surface here; they are recorded
/// as data inside the snapshot and the report.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid domain: {0}")]
    InvalidDomain(#[from] UrlError),

    #[error("Crawl aborted for {domain}: {reason}")]
    CrawlAbort { domain: String, reason: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Audit queue closed")]
    QueueClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed domain: {0}")]
    InvalidDomain(String),
}

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use audit::{run_audit, AuditCoordinator, AuditReport};
pub use checks::{Check, CheckRegistry, CheckResult, CheckStatus, Severity};
pub use config::AuditConfig;
pub use snapshot::{CrawlSnapshot, PageRecord};
pub use url::{get_domain, is_internal_link, normalize_url};
