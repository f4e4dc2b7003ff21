//! Report aggregation

use crate::checks::{count_severities, CheckResult, CheckStatus, SeverityCounts};
use crate::snapshot::{CrawlOutcome, CrawlSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the crawl behind a report went
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    /// `completed` or `aborted`
    pub status: String,
    pub pages_visited: usize,
    pub pages_skipped: usize,
    pub max_depth_reached: u32,
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl From<&CrawlSnapshot> for CrawlSummary {
    fn from(snapshot: &CrawlSnapshot) -> Self {
        let (status, abort_reason) = match &snapshot.outcome {
            CrawlOutcome::Completed => ("completed", None),
            CrawlOutcome::Aborted { reason } => ("aborted", Some(reason.clone())),
        };
        Self {
            status: status.to_string(),
            pages_visited: snapshot.pages_visited,
            pages_skipped: snapshot.pages_skipped,
            max_depth_reached: snapshot.max_depth_reached,
            duration_ms: (snapshot.finished_at - snapshot.started_at).num_milliseconds(),
            abort_reason,
        }
    }
}

/// The document handed back for one audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub domain: String,
    /// UTC, serialized as ISO-8601
    pub timestamp: DateTime<Utc>,
    /// One entry per selected check
    pub modules: BTreeMap<String, CheckResult>,
    /// Issue counts across all modules
    pub summary: SeverityCounts,
    #[serde(default)]
    pub crawl: CrawlSummary,
    /// Requested names that were unknown or disabled
    #[serde(default)]
    pub skipped_checks: Vec<String>,
    #[serde(default)]
    pub config_hash: String,
    /// Set when the crawl aborted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditReport {
    /// Number of modules per status
    pub fn status_counts(&self) -> BTreeMap<CheckStatus, usize> {
        let mut counts = BTreeMap::new();
        for result in self.modules.values() {
            *counts.entry(result.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn module(&self, name: &str) -> Option<&CheckResult> {
        self.modules.get(name)
    }
}

/// Merges per-check results into one report
///
/// Pure: severity counts come from scanning every result's issues, and the
/// run metadata (`crawl`, `skipped_checks`, `config_hash`, `error`) is left
/// at its defaults for the caller to fill in.
pub fn assemble(
    domain: &str,
    timestamp: DateTime<Utc>,
    results: BTreeMap<String, CheckResult>,
) -> AuditReport {
    AuditReport {
        domain: domain.to_string(),
        timestamp,
        summary: count_severities(results.values()),
        modules: results,
        crawl: CrawlSummary::default(),
        skipped_checks: Vec::new(),
        config_hash: String::new(),
        error: None,
    }
}
