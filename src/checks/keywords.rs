//! Keyword targeting across the site

use super::*;
use crate::text::{calculate_keyword_density, extract_keywords};
use serde_json::json;
use std::collections::BTreeMap;

const SITE_KEYWORDS: usize = 10;
/// Density above which a page is flagged for stuffing
const STUFFING_DENSITY: f64 = 5.0;

pub struct KeywordsCheck;

#[async_trait]
impl Check for KeywordsCheck {
    fn name(&self) -> &'static str {
        "keywords"
    }

    fn description(&self) -> &'static str {
        "Finds site keywords, per-page targets, cannibalization and stuffing"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let site_text: String = snapshot
            .documents()
            .map(|(_, d)| d.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let site_keywords = extract_keywords(&site_text, SITE_KEYWORDS);

        let mut primary: BTreeMap<String, String> = BTreeMap::new();
        let mut by_keyword: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut densities = Vec::new();

        for (page, doc) in snapshot.distinct_documents() {
            let url = page.final_url.to_string();
            let Some(keyword) = doc
                .title
                .as_deref()
                .and_then(|t| extract_keywords(t, 1).into_iter().next())
            else {
                continue;
            };

            if !doc.text.to_lowercase().contains(&keyword) {
                findings.issue_at(
                    Severity::Low,
                    format!("Title keyword '{}' does not appear in the page content", keyword),
                    url.as_str(),
                );
            }

            let density = calculate_keyword_density(&doc.text, &keyword);
            densities.push(density);
            if density > STUFFING_DENSITY {
                findings.issue_at(
                    Severity::Medium,
                    format!("Possible keyword stuffing: '{}' at {:.1}% density", keyword, density),
                    url.as_str(),
                );
            }

            by_keyword.entry(keyword.clone()).or_default().push(url.clone());
            primary.insert(url, keyword);
        }

        let mut cannibalized = 0;
        for (keyword, urls) in by_keyword.iter().filter(|(_, u)| u.len() > 1) {
            cannibalized += 1;
            findings.issue_at(
                Severity::Medium,
                format!("{} pages target the same primary keyword '{}'", urls.len(), keyword),
                urls[0].as_str(),
            );
        }
        if cannibalized > 0 {
            findings.recommend(
                "Give each page a distinct primary keyword, or consolidate overlapping pages",
            );
        }
        if primary.is_empty() && snapshot.documents().next().is_some() {
            findings.recommend("Put each page's target keyword in its title");
        }

        let avg_density = if densities.is_empty() {
            0.0
        } else {
            densities.iter().sum::<f64>() / densities.len() as f64
        };

        let metrics = json!({
            "top_keywords": site_keywords,
            "primary_keywords": primary,
            "cannibalized_keywords": cannibalized,
            "avg_primary_density": (avg_density * 100.0).round() / 100.0,
        });
        Ok(findings.into_result(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, snapshot};

    #[tokio::test]
    async fn test_cannibalization_and_missing_keyword() {
        let snap = snapshot(&[
            (
                "https://example.com/",
                "<title>Widgets</title><body>Widgets for everyone, quality widgets made well</body>",
            ),
            (
                "https://example.com/more",
                "<title>Widgets and more widgets</title><body>Nothing relevant here at all</body>",
            ),
        ]);

        let result = KeywordsCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["cannibalized_keywords"], 1);
        assert_eq!(result.metrics["primary_keywords"]["https://example.com/"], "widgets");
        assert!(result
            .issues
            .iter()
            .any(|i| i.message.contains("does not appear")
                && i.url.as_deref() == Some("https://example.com/more")));
    }

    #[tokio::test]
    async fn test_stuffing() {
        let snap = snapshot(&[(
            "https://example.com/",
            "<title>Shoes</title><body>shoes shoes shoes buy shoes now</body>",
        )]);
        let result = KeywordsCheck.run(&snap, &ctx()).await.unwrap();
        assert!(result.issues.iter().any(|i| i.message.contains("stuffing")));
    }
}
