//! Lighthouse scores via the PageSpeed Insights API

use super::common::missing_credential;
use super::*;
use serde_json::json;
use std::collections::BTreeMap;

/// Core Web Vitals and lab metrics: (audit id, metric key, medium threshold, high threshold)
const VITALS: &[(&str, &str, f64, f64)] = &[
    ("largest-contentful-paint", "lcp_ms", 2500.0, 4000.0),
    ("cumulative-layout-shift", "cls", 0.1, 0.25),
    ("total-blocking-time", "tbt_ms", 200.0, 600.0),
    ("first-contentful-paint", "fcp_ms", 1800.0, 3000.0),
    ("speed-index", "speed_index_ms", 3400.0, 5800.0),
    ("interactive", "tti_ms", 3800.0, 7300.0),
];

pub struct LighthouseCheck;

#[async_trait]
impl Check for LighthouseCheck {
    fn name(&self) -> &'static str {
        "lighthouse"
    }

    fn description(&self) -> &'static str {
        "Queries PageSpeed Insights for Lighthouse scores and Core Web Vitals"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let Some(key) = ctx.config.api_keys.lighthouse.as_deref() else {
            tracing::warn!("lighthouse: no API key configured, running in degraded mode");
            return Ok(missing_credential("Lighthouse", "LIGHTHOUSE_API_KEY"));
        };

        let settings = &ctx.config.lighthouse;
        let target = snapshot
            .seed_page()
            .map(|p| p.final_url.to_string())
            .unwrap_or_else(|| snapshot.seed.to_string());

        let mut query: Vec<(&str, String)> = vec![
            ("url", target.clone()),
            ("strategy", settings.device.clone()),
            ("key", key.to_string()),
        ];
        for category in &settings.categories {
            query.push(("category", category.to_uppercase().replace('-', "_")));
        }

        tracing::debug!("lighthouse: requesting {} for {}", settings.endpoint, target);
        let response = ctx
            .client
            .get(&settings.endpoint)
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CheckError::Response(format!(
                "PageSpeed Insights returned HTTP {}",
                status.as_u16()
            )));
        }
        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| CheckError::Response(format!("Invalid PageSpeed Insights JSON: {}", e)))?;

        Ok(evaluate(&payload, &target))
    }
}

fn evaluate(payload: &Value, target: &str) -> CheckResult {
    let mut findings = Findings::new();
    let result = &payload["lighthouseResult"];

    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    if let Some(categories) = result["categories"].as_object() {
        for (id, category) in categories {
            if let Some(score) = category["score"].as_f64() {
                scores.insert(id.clone(), (score * 100.0).round());
            }
        }
    }
    for (id, score) in &scores {
        let severity = if *score < 50.0 {
            Some(Severity::High)
        } else if *score < 90.0 {
            Some(Severity::Medium)
        } else {
            None
        };
        if let Some(severity) = severity {
            findings.issue_at(severity, format!("{} score is {}/100", id, score), target);
        }
    }

    let mut vitals: BTreeMap<&str, f64> = BTreeMap::new();
    for (audit, metric, medium, high) in VITALS {
        let Some(value) = result["audits"][*audit]["numericValue"].as_f64() else {
            continue;
        };
        vitals.insert(*metric, value);
        if value > *high {
            findings.issue_at(Severity::High, format!("Poor {}: {:.2}", audit, value), target);
        } else if value > *medium {
            findings.issue_at(
                Severity::Medium,
                format!("{} needs improvement: {:.2}", audit, value),
                target,
            );
        }
    }

    if findings.issue_count() > 0 {
        findings.recommend("Review the PageSpeed Insights opportunities for the homepage");
    }
    if scores.get("performance").is_some_and(|s| *s < 90.0) {
        findings.recommend(
            "Reduce render-blocking resources and compress images to improve performance",
        );
    }

    findings.into_result(json!({
        "configured": true,
        "url": target,
        "scores": scores,
        "vitals": vitals,
    }))
}
