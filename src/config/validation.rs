use crate::checks::ALL_CHECK_NAMES;
use crate::config::types::{
    AuditConfig, AuditSettings, ContentConfig, CrawlerConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &AuditConfig) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_audit_settings(&config.audit)?;
    validate_content_config(&config.content)?;

    Url::parse(&config.lighthouse.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid lighthouse endpoint: {}", e)))?;

    for rule in &config.custom_rules {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "custom rule name cannot be empty".to_string(),
            ));
        }
        if rule.target.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "custom rule '{}' has an empty target",
                rule.name
            )));
        }
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 100, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

fn validate_audit_settings(config: &AuditSettings) -> Result<(), ConfigError> {
    if config.max_concurrent_audits < 1 || config.max_concurrent_audits > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_audits must be between 1 and 100, got {}",
            config.max_concurrent_audits
        )));
    }

    if config.max_concurrent_checks < 1 || config.max_concurrent_checks > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_checks must be between 1 and 100, got {}",
            config.max_concurrent_checks
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    for name in &config.enabled_checks {
        if !ALL_CHECK_NAMES.contains(&name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown check in enabled_checks: '{}'",
                name
            )));
        }
    }

    Ok(())
}

fn validate_content_config(config: &ContentConfig) -> Result<(), ConfigError> {
    if !(config.duplicate_threshold > 0.0 && config.duplicate_threshold <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "duplicate_threshold must be in (0, 1], got {}",
            config.duplicate_threshold
        )));
    }
    Ok(())
}
