//! The check registry
//!
//! Built once at startup and handed to the coordinator by reference. Holds
//! every known check in registration order plus the set of enabled names.

use super::*;
use std::collections::HashSet;

/// Ordered collection of checks with per-name enablement
#[derive(Clone, Default)]
pub struct CheckRegistry {
    checks: Vec<Arc<dyn Check>>,
    disabled: HashSet<&'static str>,
}

impl CheckRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in checks, all enabled
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: Vec<Arc<dyn Check>> = vec![
            Arc::new(Ga4Check),
            Arc::new(GscCheck),
            Arc::new(LighthouseCheck),
            Arc::new(SitemapCheck),
            Arc::new(OnPageCheck),
            Arc::new(BacklinksCheck),
            Arc::new(KeywordsCheck),
            Arc::new(CrawlabilityCheck),
            Arc::new(AccessibilityCheck),
            Arc::new(MobileCheck),
            Arc::new(SecurityCheck),
            Arc::new(StructuredDataCheck),
            Arc::new(ContentCheck),
            Arc::new(BrokenLinksCheck),
            Arc::new(RedirectsCheck),
            Arc::new(ImagesCheck),
            Arc::new(RobotsCheck),
            Arc::new(CanonicalCheck),
            Arc::new(LocalSeoCheck),
            Arc::new(HreflangCheck),
            Arc::new(AmpCheck),
            Arc::new(AnalyticsTagsCheck),
            Arc::new(CustomChecks::new()),
            Arc::new(CompetitiveCheck),
        ];
        for check in defaults {
            registry.register(check);
        }
        registry
    }

    /// Built-in checks with only the configured `enabled_checks` enabled
    pub fn from_config(config: &AuditConfig) -> Self {
        let mut registry = Self::with_defaults();
        let enabled: HashSet<&str> = config
            .audit
            .enabled_checks
            .iter()
            .map(String::as_str)
            .collect();
        registry.disabled = registry
            .checks
            .iter()
            .map(|c| c.name())
            .filter(|name| !enabled.contains(name))
            .collect();
        registry
    }

    /// Adds a check, replacing any registered check with the same name
    pub fn register(&mut self, check: Arc<dyn Check>) {
        match self.checks.iter().position(|c| c.name() == check.name()) {
            Some(i) => self.checks[i] = check,
            None => self.checks.push(check),
        }
    }

    /// Returns false when no check has that name
    pub fn enable(&mut self, name: &str) -> bool {
        match self.get(name) {
            Some(check) => {
                self.disabled.remove(check.name());
                true
            }
            None => false,
        }
    }

    pub fn disable(&mut self, name: &str) -> bool {
        match self.get(name) {
            Some(check) => {
                self.disabled.insert(check.name());
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some() && !self.disabled.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Check>> {
        self.checks.iter().find(|c| c.name() == name).cloned()
    }

    /// Every registered name, in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn enabled_names(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .map(|c| c.name())
            .filter(|n| !self.disabled.contains(n))
            .collect()
    }

    /// Selects the checks for one run
    ///
    /// # Arguments
    ///
    /// * `requested` - Explicit check names, or `None` for every enabled check
    ///
    /// # Returns
    ///
    /// The selected checks (registration order when `requested` is `None`,
    /// request order otherwise, duplicates dropped) and the requested names
    /// that are unknown or disabled.
    pub fn resolve(&self, requested: Option<&[String]>) -> (Vec<Arc<dyn Check>>, Vec<String>) {
        let Some(requested) = requested else {
            let selected = self
                .checks
                .iter()
                .filter(|c| !self.disabled.contains(c.name()))
                .cloned()
                .collect();
            return (selected, Vec::new());
        };

        let mut selected: Vec<Arc<dyn Check>> = Vec::new();
        let mut skipped = Vec::new();
        for name in requested {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match self.get(name) {
                Some(check) if self.is_enabled(name) => {
                    if !selected.iter().any(|c| c.name() == check.name()) {
                        selected.push(check);
                    }
                }
                _ => {
                    if !skipped.iter().any(|s: &String| s == name) {
                        skipped.push(name.to_string());
                    }
                }
            }
        }
        (selected, skipped)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.names())
            .field("enabled", &self.enabled_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_builtin_names() {
        let registry = CheckRegistry::with_defaults();
        assert_eq!(registry.names(), ALL_CHECK_NAMES.to_vec());
        assert_eq!(registry.enabled_names().len(), 24);
    }

    #[test]
    fn test_from_config_disables_unlisted() {
        let mut config = AuditConfig::default();
        config.audit.enabled_checks = vec!["onpage".to_string(), "security".to_string()];
        let registry = CheckRegistry::from_config(&config);

        assert_eq!(registry.enabled_names(), vec!["onpage", "security"]);
        assert_eq!(registry.len(), 24);
    }

    #[test]
    fn test_resolve_explicit_skips_unknown_and_disabled() {
        let mut registry = CheckRegistry::with_defaults();
        registry.disable("mobile");

        let requested: Vec<String> = ["security", "nope", "mobile", "security", "onpage"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (selected, skipped) = registry.resolve(Some(&requested));

        let names: Vec<&str> = selected.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["security", "onpage"]);
        assert_eq!(skipped, vec!["nope", "mobile"]);
    }

    #[test]
    fn test_enable_disable() {
        let mut registry = CheckRegistry::with_defaults();
        assert!(registry.disable("amp"));
        assert!(!registry.is_enabled("amp"));
        assert!(registry.enable("amp"));
        assert!(registry.is_enabled("amp"));
        assert!(!registry.enable("nope"));
    }
}
