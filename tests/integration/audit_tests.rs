//! End-to-end audits against in-memory sites

use async_trait::async_trait;
use seo_audit::audit::AuditCoordinator;
use seo_audit::checks::{
    Check, CheckContext, CheckError, CheckRegistry, CheckResult, CheckStatus, ALL_CHECK_NAMES,
};
use seo_audit::config::AuditConfig;
use seo_audit::crawler::StaticFetcher;
use seo_audit::CrawlSnapshot;
use std::sync::Arc;

const HEAD: &str = r#"<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Acme Widgets: Handmade Widgets Since 1999</title>
    <meta name="description" content="Acme builds handmade widgets for workshops and homes. Browse the catalogue, read our guides and find a retailer near you today.">
</head>"#;

fn page(h1: &str, links: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html lang="en">{}<body><h1>{}</h1><p>Widgets for every workshop.</p>{}</body></html>"#,
        HEAD, h1, links
    )
}

/// Three-page https site sending every default security header
fn secure_site() -> Arc<StaticFetcher> {
    Arc::new(
        StaticFetcher::new()
            .text("https://example.com/robots.txt", "User-agent: *\nAllow: /")
            .page(
                "https://example.com/",
                &page("Home", r#"<a href="/about">About</a> <a href="/contact">Contact</a>"#),
            )
            .page("https://example.com/about", &page("About", r#"<a href="/">Home</a>"#))
            .page("https://example.com/contact", &page("Contact", r#"<a href="/">Home</a>"#))
            .with_header("Strict-Transport-Security", "max-age=31536000; includeSubDomains")
            .with_header("X-Content-Type-Options", "nosniff")
            .with_header("X-Frame-Options", "DENY")
            .with_header("Content-Security-Policy", "default-src 'self'"),
    )
}

fn fast_config() -> AuditConfig {
    let mut config = AuditConfig::default();
    config.crawler.crawl_delay_ms = 0;
    config
}

fn coordinator(config: AuditConfig, registry: CheckRegistry) -> AuditCoordinator {
    AuditCoordinator::new(config, registry)
        .expect("Failed to create coordinator")
        .with_fetcher(secure_site())
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_secure_site_has_no_critical_issues() {
    let coordinator = coordinator(fast_config(), CheckRegistry::with_defaults());
    let modules = names(&["onpage", "mobile", "security"]);

    let report = coordinator
        .run_audit("example.com", Some(modules.as_slice()))
        .await
        .expect("Audit failed");

    assert_eq!(report.domain, "example.com");
    assert_eq!(report.crawl.pages_visited, 3);
    assert_eq!(report.modules.len(), 3);
    for name in ["onpage", "mobile", "security"] {
        assert_eq!(report.modules[name].status, CheckStatus::Success, "{}", name);
    }
    assert_eq!(report.summary.critical, 0);
    assert_eq!(report.modules["security"].metrics["https"], true);
}

#[tokio::test]
async fn test_missing_credential_degrades_to_warning() {
    let coordinator = coordinator(fast_config(), CheckRegistry::with_defaults());
    let modules = names(&["backlinks"]);

    let report = coordinator
        .run_audit("example.com", Some(modules.as_slice()))
        .await
        .unwrap();

    let backlinks = &report.modules["backlinks"];
    assert_eq!(backlinks.status, CheckStatus::Warning);
    assert!(backlinks
        .issues
        .iter()
        .any(|i| i.message.contains("BACKLINK_API_KEY")));
}

#[tokio::test]
async fn test_default_report_covers_every_check() {
    let mut config = fast_config();
    config.audit.timeout_secs = 60;
    config.crawler.probe_external_links = false;
    config.images.probe_sizes = false;
    let registry = CheckRegistry::from_config(&config);
    let coordinator = coordinator(config, registry);

    let report = coordinator.run_audit("example.com", None).await.unwrap();

    let mut keys: Vec<&str> = report.modules.keys().map(String::as_str).collect();
    let mut expected = ALL_CHECK_NAMES.to_vec();
    keys.sort_unstable();
    expected.sort_unstable();
    assert_eq!(keys, expected);
    assert!(report.skipped_checks.is_empty());
}

struct Panicking;

#[async_trait]
impl Check for Panicking {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn description(&self) -> &'static str {
        "Always panics"
    }

    async fn run(
        &self,
        _snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        panic!("index out of bounds");
    }
}

#[tokio::test]
async fn test_one_failing_check_does_not_affect_others() {
    let mut registry = CheckRegistry::with_defaults();
    registry.register(Arc::new(Panicking));
    let coordinator = coordinator(fast_config(), registry);
    let modules = names(&["panicking", "onpage"]);

    let report = coordinator
        .run_audit("example.com", Some(modules.as_slice()))
        .await
        .unwrap();

    assert_eq!(report.modules["panicking"].status, CheckStatus::Error);
    assert!(report.modules["panicking"].issues.is_empty());
    assert_eq!(report.modules["onpage"].status, CheckStatus::Success);
}

#[tokio::test]
async fn test_report_serializes_to_wire_format() {
    let coordinator = coordinator(fast_config(), CheckRegistry::with_defaults());
    let modules = names(&["security"]);
    let report = coordinator
        .run_audit("example.com", Some(modules.as_slice()))
        .await
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["domain"], "example.com");
    assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    for key in ["critical", "high", "medium", "low", "info"] {
        assert!(value["summary"][key].is_u64(), "{}", key);
    }
    assert_eq!(value["modules"]["security"]["status"], "success");
}
