//! Mobile friendliness

use super::common::percent;
use super::*;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

static FONT_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)font-size\s*:\s*(\d+(?:\.\d+)?)px").expect("valid font-size regex")
});

static FIXED_WIDTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[;\s{"'])(?:min-)?width\s*:\s*(\d+)px"#).expect("valid width regex")
});

static PLUGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:object|embed|applet)\b").expect("valid plugin regex"));

const MIN_FONT_PX: f64 = 12.0;
const MAX_FIXED_WIDTH_PX: u32 = 480;

pub struct MobileCheck;

#[async_trait]
impl Check for MobileCheck {
    fn name(&self) -> &'static str {
        "mobile"
    }

    fn description(&self) -> &'static str {
        "Checks viewport configuration, zoom, font sizes and fixed layouts"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        _ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut pages = 0;
        let mut with_viewport = 0;
        let mut zoom_disabled = 0;
        let mut small_fonts = 0;
        let mut fixed_widths = 0;
        let mut friendly = 0;

        for (page, doc) in snapshot.documents() {
            pages += 1;
            let url = page.final_url.as_str();
            let mut problems = 0;

            match doc.meta("viewport") {
                None => {
                    problems += 1;
                    findings.issue_at(Severity::High, "Missing viewport meta tag", url);
                }
                Some(viewport) => {
                    with_viewport += 1;
                    let viewport = parse_viewport(viewport);
                    if !viewport.device_width {
                        problems += 1;
                        findings.issue_at(
                            Severity::Medium,
                            "Viewport does not set width=device-width",
                            url,
                        );
                    }
                    if viewport.zoom_disabled {
                        zoom_disabled += 1;
                        problems += 1;
                        findings.issue_at(Severity::Medium, "Viewport disables zooming", url);
                    }
                }
            }

            let tiny = FONT_SIZE_RE
                .captures_iter(&doc.html)
                .filter_map(|c| c[1].parse::<f64>().ok())
                .filter(|px| *px < MIN_FONT_PX)
                .count();
            if tiny > 0 {
                small_fonts += tiny;
                findings.issue_at(
                    Severity::Low,
                    format!("{} font sizes below {}px", tiny, MIN_FONT_PX),
                    url,
                );
            }

            let wide = FIXED_WIDTH_RE
                .captures_iter(&doc.html)
                .filter_map(|c| c[1].parse::<u32>().ok())
                .filter(|px| *px > MAX_FIXED_WIDTH_PX)
                .count();
            if wide > 0 {
                fixed_widths += wide;
                problems += 1;
                findings.issue_at(
                    Severity::Low,
                    format!("{} fixed widths wider than {}px", wide, MAX_FIXED_WIDTH_PX),
                    url,
                );
            }

            if PLUGIN_RE.is_match(&doc.html) {
                problems += 1;
                findings.issue_at(
                    Severity::Medium,
                    "Uses embedded plugins (object/embed) that mobile browsers do not support",
                    url,
                );
            }

            if problems == 0 {
                friendly += 1;
            }
        }

        if with_viewport < pages {
            findings.recommend(
                "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"> to every page",
            );
        }
        if zoom_disabled > 0 {
            findings.recommend("Allow users to zoom: drop user-scalable=no and maximum-scale=1");
        }
        if fixed_widths > 0 {
            findings.recommend(
                "Use relative widths or media queries instead of fixed pixel widths",
            );
        }

        let metrics = json!({
            "pages_analyzed": pages,
            "pages_with_viewport": with_viewport,
            "zoom_disabled_pages": zoom_disabled,
            "small_font_declarations": small_fonts,
            "fixed_width_declarations": fixed_widths,
            "mobile_friendly_pages": friendly,
            "mobile_friendly_pct": percent(friendly, pages),
        });
        Ok(findings.into_result(metrics))
    }
}

#[derive(Debug, Default, PartialEq)]
struct Viewport {
    device_width: bool,
    zoom_disabled: bool,
}

fn parse_viewport(content: &str) -> Viewport {
    let mut viewport = Viewport::default();
    for part in content.split([',', ';']) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_lowercase();
        match key.as_str() {
            "width" => viewport.device_width = value == "device-width",
            "user-scalable" => {
                if value == "no" || value == "0" {
                    viewport.zoom_disabled = true;
                }
            }
            "maximum-scale" => {
                if value.parse::<f64>().is_ok_and(|v| v <= 1.0) {
                    viewport.zoom_disabled = true;
                }
            }
            _ => {}
        }
    }
    viewport
}
