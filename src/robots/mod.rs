//! Robots.txt and sitemap handling
//!
//! This module parses robots.txt files (URL permissions, crawl delays and a
//! directive summary for reporting) and XML sitemaps.

mod parser;
mod sitemap;

pub use parser::{ParsedRobots, RobotsGroup, RobotsTxt};
pub use sitemap::{parse_sitemap, Sitemap, SitemapEntry, SitemapKind, MAX_SITEMAP_URLS};

/// The product token robots.txt groups are matched against
///
/// `SEOAuditBot/1.0 (+https://…)` matches as `SEOAuditBot`.
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(['/', ' '])
        .next()
        .unwrap_or(user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_token() {
        assert_eq!(
            product_token("SEOAuditBot/1.0 (+https://example.com/bot)"),
            "SEOAuditBot"
        );
        assert_eq!(product_token("Plain"), "Plain");
    }
}
