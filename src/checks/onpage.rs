//! On-page SEO: titles, descriptions, headings and image alt text

use super::common::heading_skips;
use super::*;
use crate::text::truncate_text;
use serde_json::json;
use std::collections::BTreeMap;

const TITLE_MIN: usize = 30;
const TITLE_MAX: usize = 60;
const DESCRIPTION_MIN: usize = 120;
const DESCRIPTION_MAX: usize = 160;

pub struct OnPageCheck;

#[async_trait]
impl Check for OnPageCheck {
    fn name(&self) -> &'static str {
        "onpage"
    }

    fn description(&self) -> &'static str {
        "Checks titles, meta descriptions, headings and image alt text"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut titles: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        let mut descriptions: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        let mut pages = 0;
        let mut missing_titles = 0;
        let mut missing_descriptions = 0;
        let mut missing_h1 = 0;
        let mut multiple_h1 = 0;
        let mut images_missing_alt = 0;
        let mut title_lengths = Vec::new();

        for (page, doc) in snapshot.distinct_documents() {
            pages += 1;
            let url = page.final_url.as_str();

            match doc.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                None => {
                    missing_titles += 1;
                    findings.issue_at(Severity::High, "Missing <title>", url);
                }
                Some(title) => {
                    let len = title.chars().count();
                    title_lengths.push(len);
                    if len < TITLE_MIN {
                        findings.issue_at(
                            Severity::Medium,
                            format!("Title too short ({} chars)", len),
                            url,
                        );
                    } else if len > TITLE_MAX {
                        findings.issue_at(
                            Severity::Medium,
                            format!("Title too long ({} chars)", len),
                            url,
                        );
                    }
                    titles.entry(title.to_string()).or_default().push(url);
                }
            }

            match doc.meta_description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
                None => {
                    missing_descriptions += 1;
                    findings.issue_at(Severity::Medium, "Missing meta description", url);
                }
                Some(description) => {
                    let len = description.chars().count();
                    if len < DESCRIPTION_MIN {
                        findings.issue_at(
                            Severity::Low,
                            format!("Meta description too short ({} chars)", len),
                            url,
                        );
                    } else if len > DESCRIPTION_MAX {
                        findings.issue_at(
                            Severity::Low,
                            format!("Meta description too long ({} chars)", len),
                            url,
                        );
                    }
                    descriptions.entry(description.to_string()).or_default().push(url);
                }
            }

            match doc.h1_count() {
                0 => {
                    missing_h1 += 1;
                    findings.issue_at(Severity::High, "Missing H1 heading", url);
                }
                1 => {}
                n => {
                    multiple_h1 += 1;
                    findings.issue_at(
                        Severity::Medium,
                        format!("Multiple H1 headings ({})", n),
                        url,
                    );
                }
            }

            for (from, to) in heading_skips(&doc.headings) {
                findings.issue_at(
                    Severity::Low,
                    format!("Heading level skipped (h{} to h{})", from, to),
                    url,
                );
            }

            let no_alt = doc.images.iter().filter(|i| i.alt.is_none()).count();
            if no_alt > 0 {
                images_missing_alt += no_alt;
                findings.issue_at(
                    Severity::Medium,
                    format!("{} images missing alt text", no_alt),
                    url,
                );
            }
        }

        let duplicate_titles = report_duplicates(&mut findings, &titles, "title", Severity::Medium);
        let duplicate_descriptions =
            report_duplicates(&mut findings, &descriptions, "meta description", Severity::Low);

        if missing_titles > 0 || title_lengths.iter().any(|l| *l < TITLE_MIN || *l > TITLE_MAX) {
            findings.recommend(format!(
                "Give every page a unique title of {}-{} characters",
                TITLE_MIN, TITLE_MAX
            ));
        }
        if missing_descriptions > 0 || duplicate_descriptions > 0 {
            findings.recommend(format!(
                "Write a unique meta description of {}-{} characters for each page",
                DESCRIPTION_MIN, DESCRIPTION_MAX
            ));
        }
        if missing_h1 + multiple_h1 > 0 {
            findings.recommend("Use exactly one H1 per page");
        }
        if images_missing_alt > 0 {
            findings.recommend("Add descriptive alt text to content images");
        }

        let avg_title_length = if title_lengths.is_empty() {
            0.0
        } else {
            title_lengths.iter().sum::<usize>() as f64 / title_lengths.len() as f64
        };

        let metrics = json!({
            "pages_analyzed": pages,
            "missing_titles": missing_titles,
            "missing_descriptions": missing_descriptions,
            "duplicate_titles": duplicate_titles,
            "duplicate_descriptions": duplicate_descriptions,
            "missing_h1": missing_h1,
            "multiple_h1": multiple_h1,
            "images_missing_alt": images_missing_alt,
            "avg_title_length": avg_title_length,
        });
        Ok(findings.into_result(metrics))
    }
}

/// One issue per value shared by several pages; returns the group count
fn report_duplicates(
    findings: &mut Findings,
    groups: &BTreeMap<String, Vec<&str>>,
    what: &str,
    severity: Severity,
) -> usize {
    let mut count = 0;
    for (value, urls) in groups.iter().filter(|(_, urls)| urls.len() > 1) {
        count += 1;
        findings.issue_at(
            severity,
            format!(
                "Duplicate {} shared by {} pages: \"{}\"",
                what,
                urls.len(),
                truncate_text(value, 60, "...")
            ),
            urls[0],
        );
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, empty, record, response, snapshot};

    const GOOD_DESCRIPTION: &str = "A thorough description of this page that runs long enough to land inside the recommended range for search result snippets.";

    fn good_page(title: &str) -> String {
        format!(
            r#"<html><head><title>{}</title><meta name="description" content="{}"></head>
<body><h1>Heading</h1><h2>Sub</h2><img src="/a.png" alt="A"></body></html>"#,
            title, GOOD_DESCRIPTION
        )
    }

    #[tokio::test]
    async fn test_clean_page_has_no_issues() {
        let html = good_page("A well sized page title for testing");
        let snap = snapshot(&[("https://example.com/", html.as_str())]);
        let result = OnPageCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.status, CheckStatus::Success);
        assert!(result.issues.is_empty(), "{:?}", result.issues);
    }

    #[tokio::test]
    async fn test_reports_problems() {
        let html = r#"<html><head><title>Short</title></head>
<body><h1>A</h1><h1>B</h1><h4>deep</h4><img src="/x.png"></body></html>"#;
        let snap = snapshot(&[("https://example.com/", html)]);
        let result = OnPageCheck.run(&snap, &ctx()).await.unwrap();

        let messages: Vec<&str> = result.issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.contains(&"Title too short (5 chars)"));
        assert!(messages.contains(&"Missing meta description"));
        assert!(messages.contains(&"Multiple H1 headings (2)"));
        assert!(messages.contains(&"Heading level skipped (h1 to h4)"));
        assert!(messages.contains(&"1 images missing alt text"));
        assert_eq!(result.count(Severity::Critical), 0);
    }

    #[tokio::test]
    async fn test_duplicate_titles() {
        let html = good_page("A well sized page title for testing");
        let snap = snapshot(&[
            ("https://example.com/", html.as_str()),
            ("https://example.com/b", html.as_str()),
        ]);
        let result = OnPageCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["duplicate_titles"], 1);
        assert_eq!(result.metrics["duplicate_descriptions"], 1);
    }

    #[tokio::test]
    async fn test_redirect_alias_does_not_duplicate_title() {
        let html = good_page("A well sized page title for testing");
        let mut snap = empty();
        for requested in ["https://example.com/old", "https://example.com/new"] {
            snap.push_page(record(
                requested,
                1,
                response("https://example.com/new", 200, &[], &html),
            ));
        }

        let result = OnPageCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["duplicate_titles"], 0);
        assert_eq!(result.metrics["duplicate_descriptions"], 0);
        assert!(result.issues.is_empty(), "{:?}", result.issues);
    }
}
