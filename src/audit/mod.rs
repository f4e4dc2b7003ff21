//! Audit runs and their reports
//!
//! [`AuditCoordinator`] drives one run: a single crawl, then every selected
//! check against the frozen snapshot. [`assemble`] turns the per-check
//! results into an [`AuditReport`].

mod coordinator;
mod report;

pub use coordinator::AuditCoordinator;
pub use report::{assemble, AuditReport, CrawlSummary};

use crate::checks::CheckRegistry;
use crate::config::config_from_env;
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;

static PROCESS_AUDIT_PERMITS: OnceLock<Arc<Semaphore>> = OnceLock::new();

/// Audit limit shared by every [`run_audit`] call in this process
///
/// Sized by the first caller; later limits are ignored.
pub fn process_audit_permits(limit: usize) -> Arc<Semaphore> {
    PROCESS_AUDIT_PERMITS
        .get_or_init(|| Arc::new(Semaphore::new(limit.max(1))))
        .clone()
}

/// Audits `domain` with the default checks and environment configuration
///
/// `modules` selects checks by name; `None` runs every enabled check.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> seo_audit::Result<()> {
/// let modules = vec!["onpage".to_string(), "security".to_string()];
/// let report = seo_audit::run_audit("example.com", Some(modules.as_slice())).await?;
/// println!("{} critical issues", report.summary.critical);
/// # Ok(())
/// # }
/// ```
pub async fn run_audit(domain: &str, modules: Option<&[String]>) -> crate::Result<AuditReport> {
    let config = config_from_env()?;
    let registry = CheckRegistry::from_config(&config);
    let permits = process_audit_permits(config.audit.max_concurrent_audits);
    AuditCoordinator::new(config, registry)?
        .with_audit_permits(permits)
        .run_audit(domain, modules)
        .await
}
