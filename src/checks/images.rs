//! Image optimization

use super::*;
use crate::url::get_url_extension;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Images above the fold are exempt from the lazy-loading rule
const EAGER_IMAGES_PER_PAGE: usize = 2;

pub struct ImagesCheck;

#[async_trait]
impl Check for ImagesCheck {
    fn name(&self) -> &'static str {
        "images"
    }

    fn description(&self) -> &'static str {
        "Checks alt text, formats, lazy loading, dimensions and file sizes"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let settings = &ctx.config.images;
        let mut findings = Findings::new();
        let mut total = 0;
        let mut unique: BTreeSet<&str> = BTreeSet::new();
        let mut missing_alt = 0;
        let mut unsupported = 0;
        let mut missing_lazy = 0;
        let mut missing_dimensions = 0;
        let mut formats: BTreeMap<String, usize> = BTreeMap::new();

        for (page, doc) in snapshot.documents() {
            let url = page.final_url.as_str();
            let mut page_missing_alt = 0;
            let mut page_missing_lazy = 0;
            let mut page_missing_dimensions = 0;

            for (i, image) in doc.images.iter().enumerate() {
                total += 1;
                unique.insert(image.src.as_str());

                if image.alt.is_none() {
                    page_missing_alt += 1;
                }

                let ext = get_url_extension(&image.src);
                if !ext.is_empty() {
                    *formats.entry(ext.clone()).or_default() += 1;
                    if !settings.supported_formats.iter().any(|f| f.eq_ignore_ascii_case(&ext)) {
                        unsupported += 1;
                        findings.issue_at(
                            Severity::Low,
                            format!(
                                "Image format .{} is not in the supported list: {}",
                                ext,
                                image.src,
                            ),
                            url,
                        );
                    }
                }

                if i >= EAGER_IMAGES_PER_PAGE && image.loading.as_deref() != Some("lazy") {
                    page_missing_lazy += 1;
                }
                if image.width.is_none() || image.height.is_none() {
                    page_missing_dimensions += 1;
                }
            }

            if page_missing_alt > 0 {
                findings.issue_at(
                    Severity::Medium,
                    format!("{} images missing alt attribute", page_missing_alt),
                    url,
                );
            }
            if page_missing_lazy > 0 {
                findings.issue_at(
                    Severity::Low,
                    format!("{} below-the-fold images without loading=\"lazy\"", page_missing_lazy),
                    url,
                );
            }
            if page_missing_dimensions > 0 {
                findings.issue_at(
                    Severity::Low,
                    format!("{} images without width and height", page_missing_dimensions),
                    url,
                );
            }
            missing_alt += page_missing_alt;
            missing_lazy += page_missing_lazy;
            missing_dimensions += page_missing_dimensions;
        }

        let mut oversized = 0;
        let mut probed = 0;
        if settings.probe_sizes {
            let probe_targets = unique
                .iter()
                .filter(|s| s.starts_with("http"))
                .take(settings.max_size_probes);
            for src in probe_targets {
                if ctx.cancel.is_cancelled() {
                    return Err(CheckError::Cancelled);
                }
                probed += 1;
                match image_size(ctx, src).await {
                    Some(bytes) if bytes > settings.max_image_bytes => {
                        oversized += 1;
                        findings.issue_at(
                            Severity::Medium,
                            format!(
                                "Image is {} KB (limit {} KB)",
                                bytes / 1024,
                                settings.max_image_bytes / 1024,
                            ),
                            *src,
                        );
                    }
                    _ => {}
                }
            }
        }

        if missing_alt > 0 {
            findings.recommend("Describe every content image with alt text");
        }
        if unsupported > 0 {
            findings.recommend("Serve images in modern formats such as WebP or AVIF");
        }
        if missing_lazy > 0 {
            findings.recommend("Add loading=\"lazy\" to images below the fold");
        }
        if missing_dimensions > 0 {
            findings.recommend("Set width and height on images to prevent layout shift");
        }
        if oversized > 0 {
            findings.recommend("Compress or resize oversized images");
        }

        let metrics = json!({
            "total_images": total,
            "unique_images": unique.len(),
            "missing_alt": missing_alt,
            "unsupported_format": unsupported,
            "missing_lazy_loading": missing_lazy,
            "missing_dimensions": missing_dimensions,
            "sizes_probed": probed,
            "oversized": oversized,
            "formats": formats,
        });
        Ok(findings.into_result(metrics))
    }
}

/// Content-Length from a HEAD request; failures are treated as unknown
async fn image_size(ctx: &CheckContext, url: &str) -> Option<u64> {
    let response = ctx.client.head(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{ctx, ctx_with, snapshot};
    use crate::config::AuditConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_markup_rules() {
        let html = r#"<img src="/a.webp" alt="a" width="10" height="10">
<img src="/b.bmp" width="10" height="10">
<img src="/c.png" alt="c">
<img src="/d.jpg" alt="d" loading="lazy" width="1" height="1">"#;
        let snap = snapshot(&[("https://example.com/", html)]);

        let result = ImagesCheck.run(&snap, &ctx()).await.unwrap();
        assert_eq!(result.metrics["total_images"], 4);
        assert_eq!(result.metrics["missing_alt"], 1);
        assert_eq!(result.metrics["unsupported_format"], 1);
        assert_eq!(result.metrics["missing_lazy_loading"], 1);
        assert_eq!(result.metrics["missing_dimensions"], 1);
        assert_eq!(result.metrics["sizes_probed"], 0);
    }

    #[tokio::test]
    async fn test_size_probing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/big.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 900_000]))
            .mount(&server)
            .await;

        let mut config = AuditConfig::default();
        config.images.probe_sizes = true;
        let html = format!(r#"<img src="{}/big.jpg" alt="big">"#, server.uri());
        let snap = snapshot(&[("https://example.com/", html.as_str())]);

        let result = ImagesCheck.run(&snap, &ctx_with(config)).await.unwrap();
        assert_eq!(result.metrics["sizes_probed"], 1);
        assert_eq!(result.metrics["oversized"], 1);
    }
}
