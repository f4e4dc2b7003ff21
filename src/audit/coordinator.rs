//! Audit coordinator - one crawl, many checks, one report
//!
//! This module contains the run loop that coordinates:
//! - Domain validation and the process-wide audit limit
//! - The run-level timeout (a cancellation token shared by crawl and checks)
//! - A single crawl producing the frozen snapshot
//! - Concurrent, isolated check execution under a semaphore
//! - Report assembly
//!
//! A failing or panicking check only ever affects its own entry in the
//! report.

use super::report::{assemble, AuditReport, CrawlSummary};
use crate::checks::{Check, CheckContext, CheckRegistry, CheckResult};
use crate::config::{hash_config, AuditConfig};
use crate::crawler::{build_http_client, CrawlEngine, HttpFetcher, PageFetcher};
use crate::snapshot::CrawlSnapshot;
use crate::url::validate_domain;
use crate::{AuditError, Result, UrlError};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Runs audits: crawl once, then every selected check against the snapshot
///
/// Cloning shares the audit limit, so clones count against the same
/// `max-concurrent-audits` budget.
#[derive(Clone)]
pub struct AuditCoordinator {
    config: Arc<AuditConfig>,
    registry: Arc<CheckRegistry>,
    fetcher: Arc<dyn PageFetcher>,
    /// For checks that call external services
    client: reqwest::Client,
    audit_permits: Arc<Semaphore>,
    config_hash: String,
}

impl AuditCoordinator {
    /// Creates a coordinator that crawls over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - Process-wide settings, read-only from here on
    /// * `registry` - The checks this coordinator may run
    ///
    /// # Returns
    ///
    /// * `Ok(AuditCoordinator)` - Ready to run audits
    /// * `Err(AuditError)` - The HTTP client could not be built
    pub fn new(config: AuditConfig, registry: CheckRegistry) -> Result<Self> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        let fetcher = Arc::new(HttpFetcher::new(client.clone(), config.crawler.max_redirects));
        let audit_permits = Arc::new(Semaphore::new(config.audit.max_concurrent_audits.max(1)));
        let config_hash = hash_config(&config);

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            fetcher,
            client,
            audit_permits,
            config_hash,
        })
    }

    /// Replaces the crawl transport (e.g. with an in-memory site)
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Shares an audit limit with other coordinators
    pub fn with_audit_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.audit_permits = permits;
        self
    }

    /// Stamps reports with this hash instead of the in-memory config hash
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Audits `https://<domain>/`
    ///
    /// `modules` selects checks by name; `None` runs every enabled check.
    /// Only an invalid domain is an error: crawl aborts and check failures
    /// are reported inside the returned report.
    pub async fn run_audit(&self, domain: &str, modules: Option<&[String]>) -> Result<AuditReport> {
        let domain = validate_domain(domain)?;
        let seed = Url::parse(&format!("https://{}/", domain))
            .map_err(|e| UrlError::Parse(e.to_string()))?;
        self.run_audit_from(&domain, seed, modules).await
    }

    /// Audits `domain` starting the crawl at an explicit seed URL
    pub async fn run_audit_from(
        &self,
        domain: &str,
        seed: Url,
        modules: Option<&[String]>,
    ) -> Result<AuditReport> {
        let _permit = self
            .audit_permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AuditError::QueueClosed)?;

        let timestamp = Utc::now();
        let (checks, skipped) = self.registry.resolve(modules);
        for name in &skipped {
            tracing::warn!("Skipping unknown or disabled check '{}'", name);
        }
        tracing::info!("Auditing {} with {} checks", domain, checks.len());

        let cancel = CancellationToken::new();
        let timeout = self.config.audit.timeout();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!("Audit timeout of {:?} reached", timeout);
                cancel.cancel();
            })
        };

        let mut engine = CrawlEngine::new(
            &self.config.crawler,
            &self.config.user_agent,
            self.fetcher.clone(),
        );
        let snapshot = Arc::new(engine.crawl(domain, seed, &cancel).await);

        let results = match snapshot.abort_reason() {
            Some(reason) => checks
                .iter()
                .map(|c| {
                    let result = CheckResult::failed(format!("Crawl aborted: {}", reason));
                    (c.name().to_string(), result)
                })
                .collect(),
            None => self.run_checks(&checks, snapshot.clone(), &cancel).await,
        };
        timer.abort();

        let mut report = assemble(domain, timestamp, results);
        report.crawl = CrawlSummary::from(snapshot.as_ref());
        report.skipped_checks = skipped;
        report.config_hash = self.config_hash.clone();
        report.error = snapshot.abort_reason().map(|reason| {
            AuditError::CrawlAbort {
                domain: domain.to_string(),
                reason: reason.to_string(),
            }
            .to_string()
        });

        tracing::info!(
            "Audit of {} finished: {} modules, {} issues ({} critical)",
            domain,
            report.modules.len(),
            report.summary.total(),
            report.summary.critical
        );
        Ok(report)
    }

    /// Runs checks concurrently, at most `max-concurrent-checks` at a time
    async fn run_checks(
        &self,
        checks: &[Arc<dyn Check>],
        snapshot: Arc<CrawlSnapshot>,
        cancel: &CancellationToken,
    ) -> BTreeMap<String, CheckResult> {
        let permits = Arc::new(Semaphore::new(self.config.audit.max_concurrent_checks.max(1)));
        let ctx = CheckContext::new(self.config.clone(), self.client.clone(), cancel.clone());
        let mut tasks = JoinSet::new();

        for check in checks {
            let check = check.clone();
            let snapshot = snapshot.clone();
            let ctx = ctx.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = execute(check.as_ref(), &snapshot, &ctx).await;
                (check.name(), result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    results.insert(name.to_string(), result);
                }
                Err(e) => tracing::error!("Check task failed to complete: {}", e),
            }
        }

        // Every selected check gets an entry, even if its task vanished
        for check in checks {
            results
                .entry(check.name().to_string())
                .or_insert_with(|| CheckResult::failed("Check did not complete"));
        }
        results
    }
}

/// Runs one check, converting errors, panics and cancellation into results
async fn execute(check: &dyn Check, snapshot: &CrawlSnapshot, ctx: &CheckContext) -> CheckResult {
    let name = check.name();
    if ctx.cancel.is_cancelled() {
        return CheckResult::failed("Audit timed out before the check ran");
    }

    let started = Instant::now();
    let run = AssertUnwindSafe(check.run(snapshot, ctx)).catch_unwind();
    let outcome = tokio::select! {
        outcome = run => outcome,
        _ = ctx.cancel.cancelled() => {
            tracing::warn!("Check {} cancelled by the audit timeout", name);
            return CheckResult::failed("Audit timed out while the check was running");
        }
    };

    match outcome {
        Ok(Ok(result)) => {
            tracing::debug!(
                "Check {} finished in {:?}: {} ({} issues)",
                name,
                started.elapsed(),
                result.status,
                result.issues.len()
            );
            result
        }
        Ok(Err(e)) => {
            tracing::error!("Check {} failed: {}", name, e);
            CheckResult::failed(e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!("Check {} panicked: {}", name, message);
            CheckResult::failed(format!("Check panicked: {}", message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
