//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive the real
//! HTTP transport through a full audit.

use seo_audit::audit::AuditCoordinator;
use seo_audit::checks::{CheckRegistry, CheckStatus};
use seo_audit::config::AuditConfig;
use seo_audit::crawler::{FetchError, HttpFetcher, PageFetcher};
use seo_audit::url::get_domain;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

fn test_config() -> AuditConfig {
    let mut config = AuditConfig::default();
    config.crawler.crawl_delay_ms = 10;
    config.crawler.max_depth = 2;
    config.crawler.probe_external_links = false;
    config
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let domain = get_domain(&base_url);

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{}/page1">Page 1</a>
            <a href="/old">Old page</a>
            <a href="/admin">Admin</a>
            </body></html>"#,
            base_url
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(
            "<html><head><title>Page 1</title></head><body>Content 1</body></html>".to_string(),
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/page2"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html(
            "<html><head><title>Page 2</title></head><body>Content 2</body></html>".to_string(),
        ))
        .mount(&mock_server)
        .await;

    // Disallowed by robots.txt, must never be requested
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(html("secret".to_string()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let coordinator = AuditCoordinator::new(test_config(), CheckRegistry::with_defaults())
        .expect("Failed to create coordinator");
    let seed = Url::parse(&format!("{}/", base_url)).expect("Failed to parse base URL");
    let modules = vec!["redirects".to_string(), "crawlability".to_string()];

    let report = coordinator
        .run_audit_from(&domain, seed, Some(modules.as_slice()))
        .await
        .expect("Audit failed");

    assert_eq!(report.crawl.status, "completed");
    assert_eq!(
        report.crawl.pages_visited, 3,
        "Expected /, /page1 and /old (-> /page2)"
    );
    assert_eq!(report.crawl.pages_skipped, 1);
    assert!(report.error.is_none());
    assert_eq!(report.modules["redirects"].status, CheckStatus::Success);
    assert_eq!(report.modules["crawlability"].status, CheckStatus::Success);
}

#[tokio::test]
async fn test_http_fetcher_follows_redirects() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/b"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/c"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html("<p>done</p>".to_string()))
        .mount(&mock_server)
        .await;

    let config = test_config();
    let fetcher = HttpFetcher::from_config(&config.crawler, &config.user_agent).unwrap();
    let url = Url::parse(&format!("{}/a", base_url)).unwrap();
    let response = fetcher.fetch(&url).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.final_url.path(), "/c");
    assert_eq!(response.redirect_chain.len(), 2);
    assert_eq!(response.redirect_chain[0].status, 301);
    assert_eq!(response.redirect_chain[1].status, 302);
    assert!(response.body.contains("done"));
}

#[tokio::test]
async fn test_http_fetcher_detects_redirect_loop() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/pong"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pong"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/ping"))
        .mount(&mock_server)
        .await;

    let config = test_config();
    let fetcher = HttpFetcher::from_config(&config.crawler, &config.user_agent).unwrap();
    let url = Url::parse(&format!("{}/ping", base_url)).unwrap();
    let result = fetcher.fetch(&url).await;

    assert!(matches!(result, Err(FetchError::RedirectLoop { .. })));
}
