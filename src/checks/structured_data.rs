//! Structured data: JSON-LD, microdata, Open Graph and Twitter Cards

use super::common::{percent, schema_types};
use super::*;
use crate::snapshot::JsonLdBlock;
use regex::Regex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static MICRODATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)itemtype\s*=\s*["']https?://schema\.org/([A-Za-z]+)"#)
        .expect("valid microdata regex")
});

const OPEN_GRAPH_TAGS: &[&str] = &["og:title", "og:description", "og:image"];

pub struct StructuredDataCheck;

#[async_trait]
impl Check for StructuredDataCheck {
    fn name(&self) -> &'static str {
        "structured_data"
    }

    fn description(&self) -> &'static str {
        "Validates JSON-LD, microdata and social meta tags"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut types: BTreeMap<String, usize> = BTreeMap::new();
        let mut microdata: BTreeMap<String, usize> = BTreeMap::new();
        let mut pages = 0;
        let mut with_json_ld = 0;
        let mut malformed = 0;
        let mut og_complete = 0;
        let mut twitter = 0;

        for (page, doc) in snapshot.documents() {
            pages += 1;
            let url = page.final_url.as_str();

            if !doc.json_ld.is_empty() {
                with_json_ld += 1;
            }
            for block in &doc.json_ld {
                match block {
                    JsonLdBlock::Valid(value) => {
                        for t in schema_types(value) {
                            *types.entry(t).or_default() += 1;
                        }
                        if !has_context(value) {
                            findings.issue_at(Severity::Low, "JSON-LD block has no @context", url);
                        }
                    }
                    JsonLdBlock::Malformed { error, .. } => {
                        malformed += 1;
                        findings.issue_at(
                            Severity::High,
                            format!("JSON-LD found but invalid: {}", error),
                            url,
                        );
                    }
                }
            }

            for cap in MICRODATA_RE.captures_iter(&doc.html) {
                *microdata.entry(cap[1].to_string()).or_default() += 1;
            }

            let missing_og: Vec<&str> = OPEN_GRAPH_TAGS
                .iter()
                .copied()
                .filter(|tag| doc.meta(tag).is_none())
                .collect();
            if missing_og.is_empty() {
                og_complete += 1;
            } else {
                findings.issue_at(
                    Severity::Low,
                    format!("Missing Open Graph tags: {}", missing_og.join(", ")),
                    url,
                );
            }

            if doc.meta("twitter:card").is_some() {
                twitter += 1;
            } else {
                findings.issue_at(Severity::Info, "No Twitter Card tags", url);
            }
        }

        let declared: BTreeSet<&str> = types
            .keys()
            .chain(microdata.keys())
            .map(String::as_str)
            .collect();
        for required in &ctx.config.schema.required_types {
            if !declared.contains(required.as_str()) {
                findings.issue(
                    Severity::Medium,
                    format!("Required schema type {} not found", required),
                );
            }
        }

        if malformed > 0 {
            findings.recommend("Fix invalid JSON-LD blocks; search engines ignore them entirely");
        }
        if types.is_empty() && microdata.is_empty() {
            findings.recommend(
                "Add schema.org structured data (JSON-LD) describing the site and its pages",
            );
        }
        if og_complete < pages {
            findings.recommend(
                "Add og:title, og:description and og:image to every page for link previews",
            );
        }

        let metrics = json!({
            "pages_analyzed": pages,
            "pages_with_json_ld": with_json_ld,
            "types_found": types,
            "microdata_types": microdata,
            "malformed_blocks": malformed,
            "open_graph_coverage_pct": percent(og_complete, pages),
            "twitter_card_coverage_pct": percent(twitter, pages),
        });
        Ok(findings.into_result(metrics))
    }
}

fn has_context(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("@context"),
        Value::Array(items) => items.iter().all(has_context),
        _ => false,
    }
}
