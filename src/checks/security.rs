//! Transport and header security

use super::*;
use scraper::{Html, Selector};
use serde_json::json;
use std::collections::BTreeMap;

/// Six months, the usual HSTS preload minimum
const MIN_HSTS_MAX_AGE: u64 = 15_552_000;

pub struct SecurityCheck;

#[async_trait]
impl Check for SecurityCheck {
    fn name(&self) -> &'static str {
        "security"
    }

    fn description(&self) -> &'static str {
        "Checks HTTPS, security headers, mixed content and version disclosure"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let seed = snapshot
            .seed_page()
            .filter(|p| p.status.is_some())
            .or_else(|| snapshot.pages.iter().find(|p| p.status.is_some()));

        let Some(seed) = seed else {
            return Err(CheckError::Internal("no page responded; nothing to inspect".to_string()));
        };
        let seed_url = seed.final_url.as_str();

        let https = seed.final_url.scheme() == "https";
        if !https {
            findings.issue_at(Severity::Critical, "Site is not served over HTTPS", seed_url);
            findings.recommend("Serve the whole site over HTTPS and redirect HTTP to HTTPS");
        }

        let mut headers_present: BTreeMap<String, bool> = BTreeMap::new();
        let mut missing = Vec::new();
        for header in &ctx.config.security.required_headers {
            let present = seed.header(header).is_some();
            headers_present.insert(header.clone(), present);
            if !present {
                missing.push(header.clone());
                findings.issue_at(
                    Severity::High,
                    format!("Missing security header: {}", header),
                    seed_url,
                );
            }
        }
        if !missing.is_empty() {
            findings.recommend(format!("Send these response headers: {}", missing.join(", ")));
        }

        if let Some(max_age) = seed.header("strict-transport-security").and_then(hsts_max_age) {
            if max_age < MIN_HSTS_MAX_AGE {
                findings.issue_at(
                    Severity::Low,
                    format!("HSTS max-age is short ({} seconds)", max_age),
                    seed_url,
                );
            }
        }

        if let Some(server) = seed.header("server") {
            if server.chars().any(|c| c.is_ascii_digit()) {
                findings.issue_at(
                    Severity::Low,
                    format!("Server header discloses a version: {}", server),
                    seed_url,
                );
            }
        }
        if let Some(powered) = seed.header("x-powered-by") {
            findings.issue_at(
                Severity::Low,
                format!("X-Powered-By header discloses technology: {}", powered),
                seed_url,
            );
            findings.recommend("Remove the X-Powered-By header and version details from Server");
        }

        for cookie in seed.header("set-cookie").map(split_cookies).unwrap_or_default() {
            let lower = cookie.to_lowercase();
            if https && !lower.contains("secure") {
                let name = cookie.split('=').next().unwrap_or(cookie.as_str()).trim().to_string();
                findings.issue_at(
                    Severity::Medium,
                    format!("Cookie '{}' is not marked Secure", name),
                    seed_url,
                );
            }
        }

        let mut mixed_pages = 0;
        let mut insecure_forms = 0;
        for (page, doc) in snapshot.documents() {
            if page.final_url.scheme() != "https" {
                continue;
            }
            let markup = inspect_markup(&doc.html);
            if markup.mixed_resources > 0 {
                mixed_pages += 1;
                findings.issue_at(
                    Severity::High,
                    format!("Mixed content: {} resources loaded over HTTP", markup.mixed_resources),
                    page.final_url.as_str(),
                );
            }
            if markup.insecure_forms > 0 {
                insecure_forms += markup.insecure_forms;
                findings.issue_at(
                    Severity::High,
                    "Form submits over plain HTTP",
                    page.final_url.as_str(),
                );
            }
        }
        if mixed_pages > 0 {
            findings.recommend("Load every script, stylesheet and image over HTTPS");
        }

        let present = headers_present.values().filter(|p| **p).count();
        let metrics = json!({
            "https": https,
            "url": seed_url,
            "headers_present": headers_present,
            "required_headers_present": present,
            "missing_headers": missing,
            "mixed_content_pages": mixed_pages,
            "insecure_forms": insecure_forms,
        });
        Ok(findings.into_result(metrics))
    }
}

fn hsts_max_age(value: &str) -> Option<u64> {
    value.split(';').find_map(|directive| {
        let (key, v) = directive.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("max-age") {
            v.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

/// Repeated `Set-Cookie` headers are joined with ", "; split on the
/// separator only where a new `name=` starts
fn split_cookies(value: &str) -> Vec<String> {
    let mut cookies: Vec<String> = Vec::new();
    for part in value.split(", ") {
        let starts_cookie = part
            .split_once('=')
            .is_some_and(|(name, _)| !name.contains(';') && !name.contains(' '));
        match cookies.last_mut() {
            Some(last) if !starts_cookie => {
                last.push_str(", ");
                last.push_str(part);
            }
            _ => cookies.push(part.to_string()),
        }
    }
    cookies
}

#[derive(Debug, Default, PartialEq)]
struct MarkupFindings {
    mixed_resources: usize,
    insecure_forms: usize,
}

fn inspect_markup(html: &str) -> MarkupFindings {
    let dom = Html::parse_document(html);
    let sel = |css: &str| Selector::parse(css).expect("valid security selector");
    let src = sel(
        "img[src], script[src], iframe[src], source[src], audio[src], video[src], embed[src]",
    );
    let stylesheets = sel("link[href]");
    let forms = sel("form[action]");

    let insecure =
        |v: Option<&str>| v.is_some_and(|v| v.trim().to_lowercase().starts_with("http://"));

    let mut mixed = dom
        .select(&src)
        .filter(|el| insecure(el.value().attr("src")))
        .count();
    mixed += dom
        .select(&stylesheets)
        .filter(|el| {
            el.value()
                .attr("rel")
                .is_some_and(|r| r.to_lowercase().split_whitespace().any(|t| t == "stylesheet"))
        })
        .filter(|el| insecure(el.value().attr("href")))
        .count();
    let insecure_forms = dom
        .select(&forms)
        .filter(|el| insecure(el.value().attr("action")))
        .count();

    MarkupFindings {
        mixed_resources: mixed,
        insecure_forms,
    }
}
