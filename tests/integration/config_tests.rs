//! Configuration loading and URL helpers through the public API

use seo_audit::audit::AuditCoordinator;
use seo_audit::checks::{CheckRegistry, CheckStatus, Severity};
use seo_audit::config::{load_config_with_hash, ReportFormat};
use seo_audit::crawler::{detect_redirect_loop, StaticFetcher};
use seo_audit::url::{get_domain, normalize_url};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[crawler]
max-depth = 1
crawl-delay-ms = 0

[audit]
enabled-checks = ["onpage", "custom_checks"]

[output]
format = "markdown"

[[custom-rules]]
name = "has-footer"
description = "Every page needs a footer"
kind = "element-present"
target = "footer"
severity = "high"
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_config_file_drives_an_audit() {
    let file = write_config(CONFIG);
    let (config, hash) = load_config_with_hash(file.path()).unwrap();
    assert_eq!(config.output.format, ReportFormat::Markdown);

    let registry = CheckRegistry::from_config(&config);
    assert_eq!(registry.enabled_names(), vec!["onpage", "custom_checks"]);

    let fetcher = StaticFetcher::new().page(
        "https://example.com/",
        "<html><head><title>Home</title></head><body><h1>Hi</h1></body></html>",
    );
    let coordinator = AuditCoordinator::new(config, registry)
        .unwrap()
        .with_fetcher(Arc::new(fetcher))
        .with_config_hash(hash.clone());

    let report = coordinator.run_audit("example.com", None).await.unwrap();

    assert_eq!(report.config_hash, hash);
    assert_eq!(report.modules.len(), 2);
    let custom = &report.modules["custom_checks"];
    assert_eq!(custom.status, CheckStatus::Success);
    assert_eq!(custom.count(Severity::High), 1);
    assert!(custom.issues[0]
        .message
        .starts_with("Custom rule 'has-footer' failed"));
    assert!(custom
        .recommendations
        .contains(&"Every page needs a footer".to_string()));
}

#[test]
fn test_invalid_config_is_rejected() {
    let file = write_config("[crawler]\nmax-concurrent-fetches = 0\n");
    assert!(load_config_with_hash(file.path()).is_err());
}

#[test]
fn test_url_helpers() {
    assert_eq!(normalize_url("example.com"), "https://example.com");
    assert_eq!(get_domain("https://www.example.com/a?b=c"), "www.example.com");
    assert!(detect_redirect_loop(&[
        "https://example.com/a",
        "https://example.com/b",
        "https://example.com/a",
    ]));
    assert!(!detect_redirect_loop(&["https://example.com/a", "https://example.com/b"]));
}
