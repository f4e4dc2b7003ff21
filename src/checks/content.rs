//! Content quality: volume, duplication, readability and freshness

use super::*;
use crate::text::{flesch_reading_ease, jaccard, word_set};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashSet;

/// Flesch score below which text is considered hard to read
const LOW_READABILITY: f64 = 30.0;
const STALE_AFTER_DAYS: i64 = 365;

pub struct ContentCheck;

#[async_trait]
impl Check for ContentCheck {
    fn name(&self) -> &'static str {
        "content"
    }

    fn description(&self) -> &'static str {
        "Finds thin, duplicate, hard-to-read and stale content"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let settings = &ctx.config.content;
        let mut findings = Findings::new();
        let now = Utc::now();

        let mut pages = 0;
        let mut total_words = 0;
        let mut thin = 0;
        let mut readability = Vec::new();
        let mut stale = 0;
        let mut sets: Vec<(&str, HashSet<String>)> = Vec::new();

        for (page, doc) in snapshot.distinct_documents() {
            pages += 1;
            let url = page.final_url.as_str();
            let words = doc.word_count();
            total_words += words;

            if words < settings.thin_content_words {
                thin += 1;
                findings.issue_at(
                    Severity::Medium,
                    format!(
                        "Thin content ({} words, minimum {})",
                        words,
                        settings.thin_content_words,
                    ),
                    url,
                );
            }

            if let Some(score) = flesch_reading_ease(&doc.text) {
                readability.push(score);
                if score < LOW_READABILITY && words >= 100 {
                    findings.issue_at(
                        Severity::Low,
                        format!("Hard to read (Flesch reading ease {:.0})", score),
                        url,
                    );
                }
            }

            if let Some(modified) = page.header("last-modified").and_then(parse_http_date) {
                let age = now.signed_duration_since(modified);
                if age > Duration::days(STALE_AFTER_DAYS) {
                    stale += 1;
                    findings.issue_at(
                        Severity::Info,
                        format!("Not modified for {} days", age.num_days()),
                        url,
                    );
                }
            }

            if sets.len() < settings.max_similarity_pages {
                sets.push((url, word_set(&doc.text)));
            }
        }

        let mut duplicate_pairs = 0;
        for (i, (url_a, words_a)) in sets.iter().enumerate() {
            for (url_b, words_b) in &sets[i + 1..] {
                let similarity = jaccard(words_a, words_b);
                if similarity >= settings.duplicate_threshold {
                    duplicate_pairs += 1;
                    findings.issue_at(
                        Severity::High,
                        format!("{:.0}% similar to {}", similarity * 100.0, url_b),
                        *url_a,
                    );
                }
            }
        }

        if thin > 0 {
            findings.recommend(
                "Expand thin pages with useful, original content or consolidate them",
            );
        }
        if duplicate_pairs > 0 {
            findings.recommend("Merge or canonicalize near-duplicate pages");
        }

        let avg_words = if pages == 0 { 0.0 } else { total_words as f64 / pages as f64 };
        let avg_readability = if readability.is_empty() {
            None
        } else {
            Some((readability.iter().sum::<f64>() / readability.len() as f64 * 10.0).round() / 10.0)
        };
        let quality_score = quality_score(pages, thin, duplicate_pairs, avg_readability);

        let metrics = json!({
            "pages_analyzed": pages,
            "avg_word_count": avg_words.round(),
            "thin_pages": thin,
            "duplicate_pairs": duplicate_pairs,
            "avg_readability": avg_readability,
            "stale_pages": stale,
            "quality_score": quality_score,
        });
        Ok(findings.into_result(metrics))
    }
}

/// 0-100, penalizing the share of thin and duplicated pages and poor readability
fn quality_score(pages: usize, thin: usize, duplicates: usize, readability: Option<f64>) -> f64 {
    if pages == 0 {
        return 0.0;
    }
    let pages = pages as f64;
    let mut score = 100.0;
    score -= 40.0 * (thin as f64 / pages);
    score -= 40.0 * (duplicates as f64 / pages).min(1.0);
    if let Some(r) = readability {
        if r < LOW_READABILITY {
            score -= 20.0;
        } else if r < 50.0 {
            score -= 10.0;
        }
    }
    score.clamp(0.0, 100.0).round()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, ctx_with, record, response, snapshot};
    use crate::config::AuditConfig;

    #[tokio::test]
    async fn test_thin_and_duplicate() {
        let body = "<p>The quick brown fox jumps over the lazy dog near the river bank today.</p>";
        let snap = snapshot(&[
            ("https://example.com/", body),
            ("https://example.com/copy", body),
        ]);

        let result = ContentCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["thin_pages"], 2);
        assert_eq!(result.metrics["duplicate_pairs"], 1);
        assert!(result.issues.iter().any(|i| i.severity == Severity::High
            && i.url.as_deref() == Some("https://example.com/")));
    }

    #[tokio::test]
    async fn test_threshold_is_configurable() {
        let mut config = AuditConfig::default();
        config.content.thin_content_words = 1;
        config.content.duplicate_threshold = 0.95;
        let snap = snapshot(&[
            ("https://example.com/", "<p>alpha beta gamma delta</p>"),
            ("https://example.com/b", "<p>alpha beta gamma epsilon</p>"),
        ]);
        let result = ContentCheck.run(&snap, &ctx_with(config)).await.unwrap();
        assert_eq!(result.metrics["duplicate_pairs"], 0);
        assert_eq!(result.metrics["thin_pages"], 0);
    }

    #[tokio::test]
    async fn test_stale_last_modified() {
        let mut snap = crate::checks::test_support::empty();
        snap.push_page(record(
            "https://example.com/",
            0,
            response(
                "https://example.com/",
                200,
                &[("last-modified", "Wed, 21 Oct 2015 07:28:00 GMT")],
                "<p>old</p>",
            ),
        ));
        let result = ContentCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["stale_pages"], 1);
    }

    #[tokio::test]
    async fn test_redirect_alias_is_not_a_duplicate() {
        let body = "<p>The quick brown fox jumps over the lazy dog near the river bank today.</p>";
        let mut snap = crate::checks::test_support::empty();
        for requested in ["https://example.com/old", "https://example.com/new"] {
            snap.push_page(record(
                requested,
                1,
                response("https://example.com/new", 200, &[], body),
            ));
        }

        let result = ContentCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["pages_analyzed"], 1);
        assert_eq!(result.metrics["duplicate_pairs"], 0);
        assert!(!result.issues.iter().any(|i| i.message.contains("similar to")));
    }

    #[test]
    fn test_quality_score() {
        assert_eq!(quality_score(0, 0, 0, None), 0.0);
        assert_eq!(quality_score(4, 0, 0, Some(70.0)), 100.0);
        assert_eq!(quality_score(4, 2, 0, Some(70.0)), 80.0);
    }
}
