//! WCAG-style accessibility rules evaluated on each page's markup

use super::common::heading_skips;
use super::*;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};

struct Selectors {
    img: Selector,
    fields: Selector,
    label_for: Selector,
    buttons: Selector,
    links: Selector,
    with_id: Selector,
    with_tabindex: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            img: sel("img"),
            fields: sel("input, select, textarea"),
            label_for: sel("label[for]"),
            buttons: sel("button, input[type=submit], input[type=button]"),
            links: sel("a[href]"),
            with_id: sel("[id]"),
            with_tabindex: sel("[tabindex]"),
        }
    }
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("valid accessibility selector")
}

/// (rule id, severity, message)
type Violation = (&'static str, Severity, String);

pub struct AccessibilityCheck;

#[async_trait]
impl Check for AccessibilityCheck {
    fn name(&self) -> &'static str {
        "accessibility"
    }

    fn description(&self) -> &'static str {
        "Evaluates WCAG-style rules: language, alt text, labels, names and focus order"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut by_rule: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut pages = 0;
        let mut failing_pages = 0;

        for (page, doc) in snapshot.documents() {
            pages += 1;
            let mut violations = analyze_markup(&doc.html);
            if doc.lang.as_deref().map_or(true, |l| l.trim().is_empty()) {
                violations.push((
                    "html-lang",
                    Severity::High,
                    "Document language not set on <html>".to_string(),
                ));
            }
            for (from, to) in heading_skips(&doc.headings) {
                violations.push((
                    "heading-order",
                    Severity::Low,
                    format!("Heading level skipped (h{} to h{})", from, to),
                ));
            }

            if !violations.is_empty() {
                failing_pages += 1;
            }
            for (rule, severity, message) in violations {
                *by_rule.entry(rule).or_default() += 1;
                findings.issue_at(severity, message, page.final_url.as_str());
            }
        }

        for rule in by_rule.keys() {
            if let Some(advice) = advice(rule) {
                findings.recommend(advice);
            }
        }

        let score = if pages == 0 {
            100.0
        } else {
            ((pages - failing_pages) as f64 / pages as f64 * 100.0).round()
        };
        let metrics = json!({
            "pages_analyzed": pages,
            "pages_with_violations": failing_pages,
            "violations_by_rule": by_rule,
            "score": score,
        });
        Ok(findings.into_result(metrics))
    }
}

fn advice(rule: &str) -> Option<&'static str> {
    Some(match rule {
        "html-lang" => "Declare the page language with <html lang=\"...\">",
        "image-alt" => "Give informative images alt text and decorative ones alt=\"\"",
        "label" => "Associate every form field with a <label> or aria-label",
        "button-name" => "Give every button visible text or an aria-label",
        "link-name" => "Make sure every link has discernible text",
        "duplicate-id" => "Keep element ids unique within a page",
        "tabindex" => "Avoid positive tabindex values; rely on document order",
        "heading-order" => "Nest headings without skipping levels",
        _ => return None,
    })
}

/// Markup rules that need the DOM
fn analyze_markup(html: &str) -> Vec<Violation> {
    let dom = Html::parse_document(html);
    let s = Selectors::new();
    let mut violations = Vec::new();

    let missing_alt = dom
        .select(&s.img)
        .filter(|img| img.value().attr("alt").is_none() && !is_hidden(img))
        .count();
    if missing_alt > 0 {
        violations.push((
            "image-alt",
            Severity::High,
            format!("{} images have no alt attribute", missing_alt),
        ));
    }

    let labelled: HashSet<&str> = dom
        .select(&s.label_for)
        .filter_map(|l| l.value().attr("for"))
        .collect();
    let unlabelled = dom
        .select(&s.fields)
        .filter(|field| {
            let input_type = field.value().attr("type").unwrap_or("text").to_lowercase();
            !matches!(
                input_type.as_str(),
                "hidden" | "submit" | "button" | "image" | "reset"
            )
        })
        .filter(|field| {
            let el = field.value();
            let by_id = el.attr("id").is_some_and(|id| labelled.contains(id));
            !(by_id || has_aria_name(field) || el.attr("title").is_some() || inside_label(field))
        })
        .count();
    if unlabelled > 0 {
        violations.push((
            "label",
            Severity::High,
            format!("{} form fields have no label", unlabelled),
        ));
    }

    let unnamed_buttons = dom
        .select(&s.buttons)
        .filter(|b| {
            let value = b.value().attr("value").unwrap_or("").trim().is_empty();
            text_of(b).is_empty() && value && !has_aria_name(b) && b.value().attr("title").is_none()
        })
        .count();
    if unnamed_buttons > 0 {
        violations.push((
            "button-name",
            Severity::High,
            format!("{} buttons have no accessible name", unnamed_buttons),
        ));
    }

    let unnamed_links = dom
        .select(&s.links)
        .filter(|a| {
            let img_alt = a
                .select(&s.img)
                .any(|img| img.value().attr("alt").is_some_and(|alt| !alt.trim().is_empty()));
            text_of(a).is_empty()
                && !img_alt
                && !has_aria_name(a)
                && a.value().attr("title").is_none()
        })
        .count();
    if unnamed_links > 0 {
        violations.push((
            "link-name",
            Severity::Medium,
            format!("{} links have no discernible text", unnamed_links),
        ));
    }

    let mut ids: HashMap<&str, usize> = HashMap::new();
    for el in dom.select(&s.with_id) {
        if let Some(id) = el.value().attr("id") {
            *ids.entry(id).or_default() += 1;
        }
    }
    let mut duplicates: Vec<&str> =
        ids.into_iter().filter(|(_, n)| *n > 1).map(|(id, _)| id).collect();
    duplicates.sort_unstable();
    if !duplicates.is_empty() {
        violations.push((
            "duplicate-id",
            Severity::Medium,
            format!("Duplicate element ids: {}", duplicates.join(", ")),
        ));
    }

    let positive_tabindex = dom
        .select(&s.with_tabindex)
        .filter(|el| {
            el.value()
                .attr("tabindex")
                .and_then(|t| t.trim().parse::<i32>().ok())
                .is_some_and(|t| t > 0)
        })
        .count();
    if positive_tabindex > 0 {
        violations.push((
            "tabindex",
            Severity::Low,
            format!("{} elements use a positive tabindex", positive_tabindex),
        ));
    }

    violations
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn has_aria_name(el: &ElementRef) -> bool {
    let value = el.value();
    value.attr("aria-label").is_some_and(|l| !l.trim().is_empty())
        || value.attr("aria-labelledby").is_some()
}

fn is_hidden(el: &ElementRef) -> bool {
    el.value().attr("aria-hidden") == Some("true")
        || el.value().attr("role") == Some("presentation")
}

fn inside_label(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "label")
}
