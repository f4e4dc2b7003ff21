//! Configuration module for the auditor
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, plus environment overrides for credentials and run limits.
//!
//! # Example
//!
//! ```no_run
//! use seo_audit::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("audit.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    ApiKeys, AuditConfig, AuditSettings, CompetitiveConfig, ContentConfig, CrawlerConfig,
    CustomRuleConfig, CustomRuleKind, ImageConfig, LighthouseConfig, LocalSeoConfig,
    OutputConfig, ReportFormat, SchemaConfig, SecurityConfig, UserAgentConfig,
};

pub use parser::{
    apply_env_overrides, compute_config_hash, config_from_env, hash_config, load_config,
    load_config_with_hash, parse_config,
};
pub use validation::validate;
