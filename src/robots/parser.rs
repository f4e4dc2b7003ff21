//! Robots.txt parser implementation
//!
//! Path matching is delegated to the robotstxt crate. The directive summary
//! (groups, sitemaps, syntax problems) is parsed here because checks report
//! on the file's structure, not just on individual URLs.

use robotstxt::DefaultMatcher;

/// Directives that apply to one set of user agents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsGroup {
    /// Lowercased agent tokens; `*` is the wildcard group
    pub user_agents: Vec<String>,
    pub allow: Vec<String>,
    pub disallow: Vec<String>,
    pub crawl_delay: Option<f64>,
}

impl RobotsGroup {
    pub fn is_wildcard(&self) -> bool {
        self.user_agents.iter().any(|ua| ua == "*")
    }

    /// `Disallow: /` with nothing re-allowed
    pub fn blocks_everything(&self) -> bool {
        self.disallow.iter().any(|d| d == "/") && self.allow.is_empty()
    }

    fn matches_agent(&self, user_agent: &str) -> bool {
        let agent = user_agent.to_lowercase();
        self.user_agents
            .iter()
            .any(|ua| ua != "*" && agent.contains(ua.as_str()))
    }
}

/// Structured view of a robots.txt file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsTxt {
    pub groups: Vec<RobotsGroup>,
    pub sitemaps: Vec<String>,
    /// Human-readable syntax problems, with line numbers
    pub errors: Vec<String>,
}

impl RobotsTxt {
    /// Parses robots.txt content, collecting rather than rejecting bad lines
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current: Option<RobotsGroup> = None;
        // Consecutive User-agent lines share one group
        let mut last_was_agent = false;

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                robots
                    .errors
                    .push(format!("line {}: missing ':' in '{}'", line_no, line));
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !last_was_agent {
                        if let Some(group) = current.take() {
                            robots.groups.push(group);
                        }
                        current = Some(RobotsGroup::default());
                    }
                    if let Some(group) = current.as_mut() {
                        group.user_agents.push(value.to_lowercase());
                    }
                    last_was_agent = true;
                    continue;
                }
                "allow" | "disallow" | "crawl-delay" => {
                    let Some(group) = current.as_mut() else {
                        robots.errors.push(format!(
                            "line {}: '{}' appears before any User-agent",
                            line_no, directive
                        ));
                        last_was_agent = false;
                        continue;
                    };
                    match directive.as_str() {
                        "allow" if !value.is_empty() => group.allow.push(value.to_string()),
                        "disallow" if !value.is_empty() => group.disallow.push(value.to_string()),
                        "crawl-delay" => match value.parse::<f64>() {
                            Ok(delay) if delay >= 0.0 => group.crawl_delay = Some(delay),
                            _ => robots.errors.push(format!(
                                "line {}: invalid Crawl-delay '{}'",
                                line_no, value
                            )),
                        },
                        _ => {}
                    }
                }
                "sitemap" => {
                    if value.starts_with("http://") || value.starts_with("https://") {
                        robots.sitemaps.push(value.to_string());
                    } else {
                        robots.errors.push(format!(
                            "line {}: Sitemap must be an absolute URL, got '{}'",
                            line_no, value
                        ));
                    }
                }
                "host" | "clean-param" => {}
                other => robots
                    .errors
                    .push(format!("line {}: unknown directive '{}'", line_no, other)),
            }
            last_was_agent = false;
        }

        if let Some(group) = current {
            robots.groups.push(group);
        }
        robots
    }

    /// The group that governs `user_agent`: a named match first, then `*`
    pub fn group_for(&self, user_agent: &str) -> Option<&RobotsGroup> {
        self.groups
            .iter()
            .find(|g| g.matches_agent(user_agent))
            .or_else(|| self.groups.iter().find(|g| g.is_wildcard()))
    }

    pub fn wildcard_group(&self) -> Option<&RobotsGroup> {
        self.groups.iter().find(|g| g.is_wildcard())
    }
}

/// Parsed robots.txt data
///
/// This is a wrapper around the robotstxt crate's matcher, providing a
/// simplified interface for checking if URLs are allowed.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all (true = allow all, false = parse content)
    allow_all: bool,
    summary: RobotsTxt,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
            summary: RobotsTxt::parse(content),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
            summary: RobotsTxt::default(),
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn summary(&self) -> &RobotsTxt {
        &self.summary
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - An absolute URL or a path (e.g., "/page.html")
    /// * `user_agent` - The user agent product token
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed
    /// * `false` - If the URL is disallowed
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay for a specific user agent, in seconds
    ///
    /// A group naming the agent takes precedence over the wildcard group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all {
            return None;
        }

        self.summary
            .groups
            .iter()
            .filter(|g| g.matches_agent(user_agent))
            .find_map(|g| g.crawl_delay)
            .or_else(|| {
                self.summary
                    .groups
                    .iter()
                    .filter(|g| g.is_wildcard())
                    .find_map(|g| g.crawl_delay)
            })
    }
}
