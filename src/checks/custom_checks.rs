//! User-defined page rules
//!
//! Rules come from two places: `[[custom-rules]]` entries in the
//! configuration, and [`PageRule`] implementations registered in code with
//! [`CustomChecks::with_rule`]. Every rule is evaluated against every crawled
//! HTML page; each failure becomes one issue at the rule's severity.
//!
//! # Example
//!
//! ```
//! use seo_audit::checks::{CustomChecks, PageRule, RuleTarget, Severity};
//! use std::sync::Arc;
//!
//! struct NeedsOgImage;
//!
//! impl PageRule for NeedsOgImage {
//!     fn name(&self) -> &str {
//!         "og-image"
//!     }
//!
//!     fn severity(&self) -> Severity {
//!         Severity::Low
//!     }
//!
//!     fn evaluate(&self, target: &RuleTarget<'_>) -> Option<String> {
//!         match target.document.meta("og:image") {
//!             Some(_) => None,
//!             None => Some("Missing og:image".to_string()),
//!         }
//!     }
//! }
//!
//! let checks = CustomChecks::new().with_rule(Arc::new(NeedsOgImage));
//! assert_eq!(checks.rule_count(), 1);
//! ```

use super::*;
use crate::config::{CustomRuleConfig, CustomRuleKind};
use crate::snapshot::{PageDocument, PageRecord};
use scraper::{Html, Selector};
use serde_json::json;
use std::collections::BTreeMap;

/// What a rule sees for one page
pub struct RuleTarget<'a> {
    pub record: &'a PageRecord,
    pub document: &'a PageDocument,
    /// Parsed DOM of `document.html`
    pub dom: &'a Html,
}

/// A per-page predicate
pub trait PageRule: Send + Sync {
    fn name(&self) -> &str;

    fn severity(&self) -> Severity;

    /// `Some(message)` when the page fails the rule
    fn evaluate(&self, target: &RuleTarget<'_>) -> Option<String>;
}

/// A `[[custom-rules]]` entry with its selector compiled
struct ConfiguredRule {
    config: CustomRuleConfig,
    selector: Option<Selector>,
}

impl ConfiguredRule {
    /// Compiles the rule, or explains why its selector is unusable
    fn compile(config: &CustomRuleConfig) -> Result<Self, String> {
        let selector = match config.kind {
            CustomRuleKind::ElementPresent | CustomRuleKind::ElementAbsent => Some(
                Selector::parse(&config.target)
                    .map_err(|e| format!("invalid selector '{}': {:?}", config.target, e))?,
            ),
            CustomRuleKind::TextContains | CustomRuleKind::HeaderPresent => None,
        };
        Ok(Self {
            config: config.clone(),
            selector,
        })
    }
}

impl PageRule for ConfiguredRule {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn severity(&self) -> Severity {
        self.config.severity
    }

    fn evaluate(&self, target: &RuleTarget<'_>) -> Option<String> {
        let wanted = &self.config.target;
        let matches = self
            .selector
            .as_ref()
            .map(|s| target.dom.select(s).count())
            .unwrap_or(0);

        let failure = match self.config.kind {
            CustomRuleKind::ElementPresent if matches == 0 => {
                format!("no element matches '{}'", wanted)
            }
            CustomRuleKind::ElementAbsent if matches > 0 => {
                format!("{} elements match '{}'", matches, wanted)
            }
            CustomRuleKind::TextContains
                if !target
                    .document
                    .text
                    .to_lowercase()
                    .contains(&wanted.to_lowercase()) =>
            {
                format!("page text does not contain '{}'", wanted)
            }
            CustomRuleKind::HeaderPresent if target.record.header(wanted).is_none() => {
                format!("response has no {} header", wanted)
            }
            _ => return None,
        };
        Some(format!("Custom rule '{}' failed: {}", self.config.name, failure))
    }
}

/// Runs configured and programmatic page rules
#[derive(Clone, Default)]
pub struct CustomChecks {
    rules: Vec<Arc<dyn PageRule>>,
}

impl CustomChecks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule evaluated alongside the configured ones
    pub fn with_rule(mut self, rule: Arc<dyn PageRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Programmatic rules only
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[async_trait]
impl Check for CustomChecks {
    fn name(&self) -> &'static str {
        "custom_checks"
    }

    fn description(&self) -> &'static str {
        "Evaluates user-defined page rules"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        Ok(evaluate(snapshot, &ctx.config.custom_rules, &self.rules))
    }
}

/// Evaluates every rule against every page; kept sync because `Html` is not `Send`
fn evaluate(
    snapshot: &CrawlSnapshot,
    configured: &[CustomRuleConfig],
    programmatic: &[Arc<dyn PageRule>],
) -> CheckResult {
    let mut findings = Findings::new();
    let mut rules: Vec<Arc<dyn PageRule>> = Vec::new();
    let mut descriptions: BTreeMap<String, String> = BTreeMap::new();

    for config in configured {
        match ConfiguredRule::compile(config) {
            Ok(rule) => {
                if !config.description.trim().is_empty() {
                    descriptions.insert(config.name.clone(), config.description.clone());
                }
                rules.push(Arc::new(rule));
            }
            Err(reason) => {
                findings.issue(
                    Severity::Medium,
                    format!("Custom rule '{}' skipped: {}", config.name, reason),
                );
            }
        }
    }
    rules.extend(programmatic.iter().cloned());

    let mut failures: BTreeMap<String, usize> =
        rules.iter().map(|r| (r.name().to_string(), 0)).collect();
    let mut pages = 0;

    if !rules.is_empty() {
        for (record, document) in snapshot.documents() {
            pages += 1;
            let dom = Html::parse_document(&document.html);
            let target = RuleTarget {
                record,
                document,
                dom: &dom,
            };
            for rule in &rules {
                if let Some(message) = rule.evaluate(&target) {
                    *failures.entry(rule.name().to_string()).or_default() += 1;
                    findings.issue_at(rule.severity(), message, record.final_url.as_str());
                }
            }
        }
    }

    for (name, count) in &failures {
        if *count == 0 {
            continue;
        }
        match descriptions.get(name) {
            Some(description) => findings.recommend(description.clone()),
            None => findings.recommend(format!("Fix pages failing the '{}' rule", name)),
        }
    }

    let metrics = json!({
        "rules": rules.len(),
        "pages_evaluated": pages,
        "failures": failures,
    });
    findings.into_result(metrics)
}
