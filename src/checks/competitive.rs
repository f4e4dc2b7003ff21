//! Comparison against competitor homepages

use super::common::schema_types;
use super::*;
use crate::crawler::{extract_document, HttpFetcher, PageFetcher};
use crate::snapshot::PageDocument;
use crate::text::{extract_keywords, keyword_frequencies};
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use url::Url;

/// Competitors beyond this are ignored
const MAX_COMPETITORS: usize = 5;

const COMPETITOR_REDIRECTS: usize = 5;

const TOP_KEYWORDS: usize = 20;

/// Competitor homepage word count must exceed ours by this factor to be reported
const CONTENT_GAP_FACTOR: f64 = 1.5;

#[derive(Debug, Serialize)]
struct CompetitorProfile {
    domain: String,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    word_count: usize,
    schema_types: BTreeSet<String>,
    keywords: Vec<String>,
}

impl CompetitorProfile {
    fn unreachable(domain: &str, error: String) -> Self {
        Self {
            domain: domain.to_string(),
            reachable: false,
            error: Some(error),
            word_count: 0,
            schema_types: BTreeSet::new(),
            keywords: Vec::new(),
        }
    }

    fn from_document(domain: &str, doc: &PageDocument) -> Self {
        Self {
            domain: domain.to_string(),
            reachable: true,
            error: None,
            word_count: doc.word_count(),
            schema_types: document_schema_types(doc),
            keywords: extract_keywords(&doc.text, TOP_KEYWORDS),
        }
    }
}

pub struct CompetitiveCheck;

#[async_trait]
impl Check for CompetitiveCheck {
    fn name(&self) -> &'static str {
        "competitive"
    }

    fn description(&self) -> &'static str {
        "Compares content volume, schema usage and keywords with competitor homepages"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let competitors = &ctx.config.competitive.competitors;

        if competitors.is_empty() {
            findings.issue(Severity::Low, "No competitors configured");
            findings.recommend(
                "List competitor domains under [competitive] competitors to enable comparison",
            );
            return Ok(findings.into_warning(json!({ "competitors": [] })));
        }
        if competitors.len() > MAX_COMPETITORS {
            tracing::warn!(
                "{} competitors configured; comparing the first {}",
                competitors.len(),
                MAX_COMPETITORS
            );
        }

        let fetcher = HttpFetcher::new(ctx.client.clone(), COMPETITOR_REDIRECTS);
        let profiles = tokio::select! {
            profiles = join_all(
                competitors
                    .iter()
                    .take(MAX_COMPETITORS)
                    .map(|c| profile_competitor(&fetcher, c)),
            ) => profiles,
            _ = ctx.cancel.cancelled() => return Err(CheckError::Cancelled),
        };

        let own_home = snapshot.seed_page().and_then(|p| p.document());
        let own_words = own_home.map(|d| d.word_count()).unwrap_or(0);
        let own_types: BTreeSet<String> = snapshot
            .documents()
            .flat_map(|(_, d)| document_schema_types(d))
            .collect();
        let own_keywords: HashSet<String> = snapshot
            .documents()
            .flat_map(|(_, d)| keyword_frequencies(&d.text))
            .map(|(word, _)| word)
            .collect();

        for profile in &profiles {
            if let Some(error) = &profile.error {
                findings.issue(
                    Severity::Info,
                    format!("Could not fetch competitor {}: {}", profile.domain, error),
                );
                continue;
            }

            if profile.word_count as f64 > own_words as f64 * CONTENT_GAP_FACTOR {
                findings.issue(
                    Severity::Low,
                    format!(
                        "{} homepage has {} words, ours has {}",
                        profile.domain, profile.word_count, own_words
                    ),
                );
                findings.recommend("Expand homepage content to match the depth of competing sites");
            }

            let missing_types: Vec<&str> = profile
                .schema_types
                .difference(&own_types)
                .map(String::as_str)
                .collect();
            if !missing_types.is_empty() {
                findings.issue(
                    Severity::Low,
                    format!(
                        "{} uses schema types this site lacks: {}",
                        profile.domain,
                        missing_types.join(", ")
                    ),
                );
                findings.recommend("Consider adding the structured data types competitors use");
            }

            let gaps: Vec<&str> = profile
                .keywords
                .iter()
                .filter(|k| !own_keywords.contains(*k))
                .map(String::as_str)
                .take(10)
                .collect();
            if !gaps.is_empty() {
                findings.issue(
                    Severity::Info,
                    format!(
                        "Keywords {} targets that this site never mentions: {}",
                        profile.domain,
                        gaps.join(", "),
                    ),
                );
            }
        }

        let metrics = json!({
            "own": {
                "home_word_count": own_words,
                "schema_types": own_types,
            },
            "competitors": profiles,
        });
        Ok(findings.into_result(metrics))
    }
}

/// Homepage URL for a competitor given as a bare domain or a full URL
fn competitor_url(competitor: &str) -> Option<Url> {
    let competitor = competitor.trim();
    if competitor.contains("://") {
        Url::parse(competitor).ok()
    } else {
        Url::parse(&format!("https://{}/", competitor)).ok()
    }
}

async fn profile_competitor(fetcher: &HttpFetcher, competitor: &str) -> CompetitorProfile {
    let Some(url) = competitor_url(competitor) else {
        return CompetitorProfile::unreachable(competitor, "not a valid domain or URL".to_string());
    };
    match fetcher.fetch(&url).await {
        Ok(response) if (200..300).contains(&response.status) => {
            let doc = extract_document(&response.final_url, &response.body);
            CompetitorProfile::from_document(competitor, &doc)
        }
        Ok(response) => {
            CompetitorProfile::unreachable(competitor, format!("HTTP {}", response.status))
        }
        Err(e) => CompetitorProfile::unreachable(competitor, e.to_string()),
    }
}

fn document_schema_types(doc: &PageDocument) -> BTreeSet<String> {
    doc.json_ld_values().flat_map(schema_types).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, ctx_with, snapshot};
    use crate::config::AuditConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_no_competitors_is_warning() {
        let snap = snapshot(&[("https://example.com/", "<p>a</p>")]);
        let result = CompetitiveCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.count(Severity::Low), 1);
    }

    #[tokio::test]
    async fn test_compares_with_competitor() {
        let server = MockServer::start().await;
        let body = format!(
            r#"<html><head><script type="application/ld+json">{{"@type":"FAQPage"}}</script></head>
<body><p>{}</p></body></html>"#,
            "gadgets gizmos gadgets reviews ".repeat(20)
        );
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(&server)
            .await;

        let mut config = AuditConfig::default();
        config.competitive.competitors = vec![server.uri(), "unreachable.invalid".to_string()];
        let snap = snapshot(&[("https://example.com/", "<p>Our widgets are great</p>")]);

        let result = CompetitiveCheck.run(&snap, &ctx_with(config)).await.unwrap();
        assert_eq!(result.status, CheckStatus::Success);
        assert_eq!(result.metrics["competitors"][0]["reachable"], true);
        assert_eq!(result.metrics["competitors"][0]["word_count"], 80);
        assert_eq!(result.metrics["competitors"][1]["reachable"], false);

        let messages: Vec<&str> = result.issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("homepage has 80 words, ours has 4")));
        assert!(messages.iter().any(|m| m.contains("schema types this site lacks: FAQPage")));
        assert!(messages.iter().any(|m| m.contains("gadgets")));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("Could not fetch competitor unreachable.invalid")));
    }
}
