//! Analytics and marketing tag detection

use super::common::percent;
use super::*;
use regex::Regex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static GA4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:gtag/js\?id=|gtag\(\s*['"]config['"]\s*,\s*['"])(G-[A-Z0-9]{4,12})"#)
        .expect("valid ga4 regex")
});

static UA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bUA-\d{4,10}-\d{1,4}\b").expect("valid ua regex"));

static GTM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bGTM-[A-Z0-9]{4,8}\b").expect("valid gtm regex"));

static FB_PIXEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"fbq\(\s*['"]init['"]\s*,\s*['"](\d{6,20})['"]"#).expect("valid pixel regex")
});

static GTAG_LOADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"googletagmanager\.com/gtag/js\?id=([A-Z0-9-]+)").expect("valid loader regex")
});

/// Trackers recognised by a script host or snippet marker
const SCRIPT_TRACKERS: &[(&str, &str)] = &[
    ("hotjar", "static.hotjar.com"),
    ("linkedin_insight", "snap.licdn.com"),
    ("microsoft_clarity", "clarity.ms/tag"),
    ("plausible", "plausible.io/js"),
    ("matomo", "matomo.js"),
    ("segment", "cdn.segment.com"),
];

/// Trackers found on one page
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct PageTags {
    pub ga4: BTreeSet<String>,
    pub universal: BTreeSet<String>,
    pub gtm: BTreeSet<String>,
    pub facebook_pixel: BTreeSet<String>,
    pub other: BTreeSet<&'static str>,
    /// gtag loader IDs included more than once
    pub duplicate_loaders: Vec<String>,
}

impl PageTags {
    pub fn is_empty(&self) -> bool {
        self.ga4.is_empty()
            && self.universal.is_empty()
            && self.gtm.is_empty()
            && self.facebook_pixel.is_empty()
            && self.other.is_empty()
    }

    fn tracker_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if !self.ga4.is_empty() {
            names.push("ga4");
        }
        if !self.universal.is_empty() {
            names.push("universal_analytics");
        }
        if !self.gtm.is_empty() {
            names.push("google_tag_manager");
        }
        if !self.facebook_pixel.is_empty() {
            names.push("facebook_pixel");
        }
        names.extend(self.other.iter().copied());
        names
    }
}

/// GA4 measurement IDs referenced by a page
pub(crate) fn ga4_ids(html: &str) -> BTreeSet<String> {
    GA4_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

pub(crate) fn detect_tags(html: &str) -> PageTags {
    let collect = |re: &Regex| -> BTreeSet<String> {
        re.find_iter(html).map(|m| m.as_str().to_string()).collect()
    };

    let mut loaders: BTreeMap<String, usize> = BTreeMap::new();
    for cap in GTAG_LOADER_RE.captures_iter(html) {
        if let Some(id) = cap.get(1) {
            *loaders.entry(id.as_str().to_string()).or_default() += 1;
        }
    }

    PageTags {
        ga4: ga4_ids(html),
        universal: collect(&UA_RE),
        gtm: collect(&GTM_RE),
        facebook_pixel: FB_PIXEL_RE
            .captures_iter(html)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect(),
        other: SCRIPT_TRACKERS
            .iter()
            .filter(|(_, marker)| html.contains(marker))
            .map(|(name, _)| *name)
            .collect(),
        duplicate_loaders: loaders
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id)
            .collect(),
    }
}

pub struct AnalyticsTagsCheck;

#[async_trait]
impl Check for AnalyticsTagsCheck {
    fn name(&self) -> &'static str {
        "analytics_tags"
    }

    fn description(&self) -> &'static str {
        "Detects analytics and marketing tags and their coverage"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut tracker_pages: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut ids: BTreeSet<String> = BTreeSet::new();
        let mut untracked: Vec<String> = Vec::new();
        let mut pages = 0;

        for (page, doc) in snapshot.documents() {
            pages += 1;
            let tags = detect_tags(&doc.html);
            for name in tags.tracker_names() {
                *tracker_pages.entry(name).or_default() += 1;
            }
            ids.extend(tags.ga4.iter().cloned());
            ids.extend(tags.universal.iter().cloned());
            ids.extend(tags.gtm.iter().cloned());

            for id in &tags.duplicate_loaders {
                findings.issue_at(
                    Severity::Low,
                    format!("Tag {} is loaded more than once", id),
                    page.final_url.as_str(),
                );
            }
            if tags.is_empty() {
                untracked.push(page.final_url.to_string());
            }
        }

        if pages > 0 && tracker_pages.is_empty() {
            findings.issue(Severity::Medium, "No analytics tracking detected on any page");
            findings.recommend("Install an analytics tag (e.g. GA4) on every page");
        } else {
            for url in &untracked {
                findings.issue_at(Severity::Medium, "Page has no analytics tag", url.as_str());
            }
            if !untracked.is_empty() {
                findings.recommend("Add the site's analytics tag to every page template");
            }
        }

        if tracker_pages.contains_key("universal_analytics") {
            findings.issue(
                Severity::Medium,
                "Universal Analytics (UA-) tags found; Universal Analytics no longer processes data",
            );
            findings.recommend("Migrate remaining Universal Analytics tags to GA4");
        }

        let tracked = pages - untracked.len();
        let metrics = json!({
            "pages_analyzed": pages,
            "trackers": tracker_pages,
            "ids": ids,
            "pages_without_tracking": untracked.len(),
            "coverage_pct": percent(tracked, pages),
        });
        Ok(findings.into_result(metrics))
    }
}
