//! hreflang annotations

use super::*;
use crate::snapshot::{PageDocument, PageRecord};
use regex::Regex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use url::Url;

static LANG_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(x-default|[a-z]{2,3}(-[a-z]{4})?(-([a-z]{2}|\d{3}))?)$")
        .expect("valid language code regex")
});

/// One `<URL>; param; param` entry of a `Link` header
static LINK_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]*)>\s*((?:;[^,<]*)*)").expect("valid link header regex"));

static LINK_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(rel|hreflang)\s*=\s*"?([^";]+)"?"#).expect("valid link param regex")
});

/// One hreflang annotation, from markup or a response header
#[derive(Debug, Clone, PartialEq, Eq)]
struct Alternate {
    code: String,
    href: String,
}

pub struct HreflangCheck;

#[async_trait]
impl Check for HreflangCheck {
    fn name(&self) -> &'static str {
        "hreflang"
    }

    fn description(&self) -> &'static str {
        "Validates hreflang codes, return links, self-references and x-default"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut annotated = 0;
        let mut invalid_codes = 0;
        let mut missing_return = 0;
        let mut languages: BTreeSet<String> = BTreeSet::new();

        let mut by_page: BTreeMap<String, Vec<Alternate>> = BTreeMap::new();
        for (page, doc) in snapshot.documents() {
            let alternates = page_alternates(page, doc);
            if !alternates.is_empty() {
                by_page.insert(snapshot.key_for(&page.final_url), alternates);
            }
        }

        for (page, doc) in snapshot.documents() {
            let page_key = snapshot.key_for(&page.final_url);
            let Some(alternates) = by_page.get(&page_key) else {
                continue;
            };
            annotated += 1;
            let url = page.final_url.as_str();

            let mut seen: BTreeSet<String> = BTreeSet::new();
            for alt in alternates {
                let code = alt.code.to_lowercase();
                if !LANG_CODE_RE.is_match(&alt.code) {
                    invalid_codes += 1;
                    findings.issue_at(
                        Severity::Medium,
                        format!("Invalid hreflang code '{}'", alt.code),
                        url,
                    );
                }
                if !seen.insert(code.clone()) {
                    findings.issue_at(
                        Severity::Medium,
                        format!("hreflang '{}' is declared more than once", alt.code),
                        url,
                    );
                }
                languages.insert(code);
            }

            let keyed: Vec<(&Alternate, Option<String>)> = alternates
                .iter()
                .map(|a| (a, Url::parse(&a.href).ok().map(|u| snapshot.key_for(&u))))
                .collect();

            if !keyed.iter().any(|(_, key)| key.as_deref() == Some(page_key.as_str())) {
                findings.issue_at(
                    Severity::Low,
                    "hreflang set does not reference the page itself",
                    url,
                );
            }
            if !seen.contains("x-default") {
                findings.issue_at(Severity::Low, "No x-default hreflang", url);
            }

            if let Some(canonical) = doc.canonical.as_deref().and_then(|c| Url::parse(c).ok()) {
                if snapshot.key_for(&canonical) != page_key {
                    findings.issue_at(
                        Severity::Medium,
                        format!("Page has hreflang but canonicalizes to {}", canonical),
                        url,
                    );
                }
            }

            for (alt, target_key) in &keyed {
                let Some(target_key) = target_key else {
                    continue;
                };
                if *target_key == page_key {
                    continue;
                }
                // Targets outside the crawl can't be verified
                let Some(target) = snapshot.page(&alt.href) else {
                    continue;
                };
                if target.document().is_none() {
                    continue;
                }
                let links_back = by_page
                    .get(&snapshot.key_for(&target.final_url))
                    .map(|back| {
                        back.iter().any(|b| {
                            Url::parse(&b.href)
                                .map(|u| snapshot.key_for(&u) == page_key)
                                .unwrap_or(false)
                        })
                    })
                    .unwrap_or(false);
                if !links_back {
                    missing_return += 1;
                    findings.issue_at(
                        Severity::Medium,
                        format!("{} ({}) does not link back with hreflang", alt.href, alt.code),
                        url,
                    );
                }
            }
        }

        if invalid_codes > 0 {
            findings.recommend(
                "Use ISO 639-1 language codes with optional ISO 3166-1 regions, e.g. en-GB",
            );
        }
        if missing_return > 0 {
            findings.recommend(
                "Make every hreflang set reciprocal: each page must list all alternates",
            );
        }
        if annotated > 0 && findings.issues().iter().any(|i| i.message == "No x-default hreflang") {
            findings.recommend("Add an x-default alternate for users whose language isn't listed");
        }

        let metrics = json!({
            "pages_with_hreflang": annotated,
            "languages": languages,
            "invalid_codes": invalid_codes,
            "missing_return_links": missing_return,
        });
        Ok(findings.into_result(metrics))
    }
}

fn page_alternates(page: &PageRecord, doc: &PageDocument) -> Vec<Alternate> {
    let mut alternates: Vec<Alternate> = doc
        .alternates()
        .filter_map(|l| {
            Some(Alternate {
                code: l.hreflang.clone()?,
                href: l.href.clone(),
            })
        })
        .collect();
    if let Some(header) = page.header("link") {
        alternates.extend(header_alternates(header, &page.final_url));
    }
    alternates
}

/// hreflang alternates declared in a `Link` response header
fn header_alternates(header: &str, base: &Url) -> Vec<Alternate> {
    LINK_HEADER_RE
        .captures_iter(header)
        .filter_map(|caps| {
            let mut rel = None;
            let mut hreflang = None;
            for param in LINK_PARAM_RE.captures_iter(&caps[2]) {
                let value = param[2].trim().to_string();
                if param[1].eq_ignore_ascii_case("rel") {
                    rel = Some(value.to_lowercase());
                } else {
                    hreflang = Some(value);
                }
            }
            if !rel?.split_whitespace().any(|r| r == "alternate") {
                return None;
            }
            Some(Alternate {
                code: hreflang?,
                href: base.join(caps[1].trim()).ok()?.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, record, response, snapshot};

    fn head(links: &[(&str, &str)]) -> String {
        let tags: String = links
            .iter()
            .map(|(code, href)| {
                format!(r#"<link rel="alternate" hreflang="{}" href="{}">"#, code, href)
            })
            .collect();
        format!("<head>{}</head><p>x</p>", tags)
    }

    #[tokio::test]
    async fn test_reciprocal_set_is_clean() {
        let set = [
            ("en", "https://example.com/"),
            ("de", "https://example.com/de"),
            ("x-default", "https://example.com/"),
        ];
        let html = head(&set);
        let snap = snapshot(&[
            ("https://example.com/", html.as_str()),
            ("https://example.com/de", html.as_str()),
        ]);
        let result = HreflangCheck.run(&snap, &ctx()).await.unwrap();
        assert!(result.issues.is_empty(), "{:?}", result.issues);
        assert_eq!(result.metrics["pages_with_hreflang"], 2);
        assert_eq!(result.metrics["languages"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_return_invalid_code_and_self() {
        let home = head(&[("en_US", "https://example.com/en"), ("fr", "https://example.com/fr")]);
        let snap = snapshot(&[
            ("https://example.com/", home.as_str()),
            ("https://example.com/fr", "<p>bonjour</p>"),
        ]);
        let result = HreflangCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["invalid_codes"], 1);
        assert_eq!(result.metrics["missing_return_links"], 1);
        let messages: Vec<&str> = result.issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.contains(&"hreflang set does not reference the page itself"));
        assert!(messages.contains(&"No x-default hreflang"));
    }

    #[tokio::test]
    async fn test_link_header_alternates() {
        let mut snap = snapshot(&[]);
        snap.push_page(record(
            "https://example.com/",
            0,
            response(
                "https://example.com/",
                200,
                &[(
                    "Link",
                    r#"<https://example.com/>; rel="alternate"; hreflang="en", <https://example.com/es>; rel="alternate"; hreflang="es", <https://cdn.example.com/a.css>; rel="preload""#,
                )],
                r#"<head><link rel="canonical" href="https://example.com/other"></head>"#,
            ),
        ));
        let result = HreflangCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["pages_with_hreflang"], 1);
        assert_eq!(result.metrics["languages"], json!(["en", "es"]));
        assert!(result
            .issues
            .iter()
            .any(|i| i.message.starts_with("Page has hreflang but canonicalizes")));
    }

    #[test]
    fn test_language_codes() {
        for ok in ["en", "en-GB", "zh-Hant-TW", "es-419", "x-default"] {
            assert!(LANG_CODE_RE.is_match(ok), "{}", ok);
        }
        for bad in ["en_US", "english", "e", "en-GBR"] {
            assert!(!LANG_CODE_RE.is_match(bad), "{}", bad);
        }
    }
}
