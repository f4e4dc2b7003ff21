use crate::config::types::AuditConfig;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Environment overrides (API keys, `MAX_CONCURRENT_AUDITS`, `AUDIT_TIMEOUT`)
/// are applied after parsing and before validation.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use seo_audit::config::load_config;
///
/// let config = load_config(Path::new("audit.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<AuditConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Parses TOML text into a configuration without validating it
pub fn parse_config(content: &str) -> Result<AuditConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Builds the default configuration with environment overrides applied
pub fn config_from_env() -> Result<AuditConfig, ConfigError> {
    let mut config = AuditConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies process environment overrides using the given lookup
///
/// Empty values count as unset. Unparseable numbers are ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut AuditConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty("GOOGLE_ANALYTICS_API_KEY") {
        config.api_keys.google_analytics = Some(key);
    }
    if let Some(key) = non_empty("GOOGLE_SEARCH_CONSOLE_API_KEY") {
        config.api_keys.google_search_console = Some(key);
    }
    if let Some(key) = non_empty("LIGHTHOUSE_API_KEY") {
        config.api_keys.lighthouse = Some(key);
    }
    if let Some(key) = non_empty("BACKLINK_API_KEY") {
        config.api_keys.backlink = Some(key);
    }

    if let Some(value) = non_empty("MAX_CONCURRENT_AUDITS") {
        match value.trim().parse() {
            Ok(n) => config.audit.max_concurrent_audits = n,
            Err(_) => tracing::warn!("Ignoring invalid MAX_CONCURRENT_AUDITS: {}", value),
        }
    }
    if let Some(value) = non_empty("AUDIT_TIMEOUT") {
        match value.trim().parse() {
            Ok(n) => config.audit.timeout_secs = n,
            Err(_) => tracing::warn!("Ignoring invalid AUDIT_TIMEOUT: {}", value),
        }
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stamped into every report so results can be traced to the settings that
/// produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of an in-memory configuration, for runs without a config file
pub fn hash_config(config: &AuditConfig) -> String {
    let serialized = serde_json::to_vec(config).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&serialized);
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(AuditConfig, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomRuleKind;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
max-depth = 2
max-pages = 50
crawl-delay-ms = 250

[user-agent]
crawler-name = "TestAuditor"
crawler-version = "2.0"
contact-url = "https://example.com/about"

[audit]
timeout-secs = 60
enabled-checks = ["onpage", "security"]

[[custom-rules]]
name = "has-footer"
kind = "element-present"
target = "footer"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_depth, 2);
        assert_eq!(config.crawler.max_pages, 50);
        assert_eq!(config.user_agent.crawler_name, "TestAuditor");
        assert_eq!(config.audit.enabled_checks, vec!["onpage", "security"]);
        assert_eq!(config.custom_rules.len(), 1);
        assert_eq!(config.custom_rules[0].kind, CustomRuleKind::ElementPresent);
        // Untouched sections keep their defaults
        assert_eq!(config.content.thin_content_words, 300);
        assert_eq!(config.crawler.max_concurrent_fetches, 10);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = parse_config("").unwrap();
        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.crawler.max_pages, 1000);
        assert_eq!(config.audit.enabled_checks.len(), 24);
        assert_eq!(
            config.user_agent.header_value(),
            "SEOAuditBot/1.0 (+https://example.com/bot)"
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/audit.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[crawler]\nmax-concurrent-fetches = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BACKLINK_API_KEY", "secret"),
            ("LIGHTHOUSE_API_KEY", ""),
            ("MAX_CONCURRENT_AUDITS", "9"),
            ("AUDIT_TIMEOUT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = AuditConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_keys.backlink.as_deref(), Some("secret"));
        assert_eq!(config.api_keys.lighthouse, None);
        assert_eq!(config.audit.max_concurrent_audits, 9);
        assert_eq!(config.audit.timeout_secs, 300);
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_hash_config_tracks_settings() {
        let a = AuditConfig::default();
        let mut b = AuditConfig::default();
        b.crawler.max_depth = 7;

        assert_eq!(hash_config(&a), hash_config(&AuditConfig::default()));
        assert_ne!(hash_config(&a), hash_config(&b));
    }
}
