//! SEO Audit main entry point
//!
//! This is the command-line interface for the crawl-and-check website auditor.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use seo_audit::audit::{process_audit_permits, AuditCoordinator};
use seo_audit::checks::CheckRegistry;
use seo_audit::config::{
    config_from_env, hash_config, load_config_with_hash, AuditConfig, ReportFormat,
};
use seo_audit::output::write_report;
use seo_audit::url::validate_domain;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit status when the audit ran but its crawl aborted
const EXIT_CRAWL_ABORTED: i32 = 2;

/// SEO Audit: crawl a site once, then run every audit check against it
///
/// Crawls the domain while respecting robots.txt and crawl delays, then runs
/// on-page, technical, content and integration checks against the captured
/// snapshot and prints a single report.
#[derive(Parser, Debug)]
#[command(name = "seo-audit")]
#[command(version)]
#[command(about = "Crawl-and-check SEO auditor", long_about = None)]
struct Cli {
    /// Domain to audit, e.g. example.com
    #[arg(value_name = "DOMAIN", required_unless_present = "list_checks")]
    domain: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Checks to run, comma separated (default: every enabled check)
    #[arg(short, long, value_delimiter = ',')]
    modules: Vec<String>,

    /// Report format (default: the config's output.format)
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// List the registered checks and exit
    #[arg(long, conflicts_with = "dry_run")]
    list_checks: bool,

    /// Validate config and show what would be audited without crawling
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Markdown,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => ReportFormat::Json,
            FormatArg::Markdown => ReportFormat::Markdown,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load(&cli)?;
    let registry = CheckRegistry::from_config(&config);

    if cli.list_checks {
        handle_list_checks(&registry);
        return Ok(());
    }

    let domain = cli
        .domain
        .as_deref()
        .context("a domain is required")?;
    let domain = validate_domain(domain).with_context(|| format!("invalid domain '{}'", domain))?;
    let modules = (!cli.modules.is_empty()).then_some(cli.modules.as_slice());

    if cli.dry_run {
        handle_dry_run(&config, &registry, &domain, modules);
        return Ok(());
    }

    let format = cli.format.map(ReportFormat::from).unwrap_or(config.output.format);
    let permits = process_audit_permits(config.audit.max_concurrent_audits);
    let coordinator = AuditCoordinator::new(config, registry)?
        .with_audit_permits(permits)
        .with_config_hash(config_hash);

    let report = coordinator.run_audit(&domain, modules).await?;
    tracing::info!(
        "Audit of {} finished: {} issues ({} critical)",
        report.domain,
        report.summary.total(),
        report.summary.critical
    );

    write_report(&report, format, cli.output.as_deref()).context("failed to write report")?;

    if let Some(error) = &report.error {
        tracing::error!("{}", error);
        std::process::exit(EXIT_CRAWL_ABORTED);
    }
    Ok(())
}

/// Loads the config file when given, otherwise defaults plus environment
fn load(cli: &Cli) -> anyhow::Result<(AuditConfig, String)> {
    match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok((config, hash))
        }
        None => {
            let config = config_from_env().context("invalid environment configuration")?;
            let hash = hash_config(&config);
            Ok((config, hash))
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so a report on stdout stays machine-readable.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("seo_audit=info,warn"),
            1 => EnvFilter::new("seo_audit=debug,info"),
            2 => EnvFilter::new("seo_audit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn handle_list_checks(registry: &CheckRegistry) {
    for name in registry.names() {
        let description = registry.get(name).map(|c| c.description()).unwrap_or_default();
        let marker = if registry.is_enabled(name) { "" } else { " (disabled)" };
        println!("{:<18} {}{}", name, description, marker);
    }
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(
    config: &AuditConfig,
    registry: &CheckRegistry,
    domain: &str,
    modules: Option<&[String]>,
) {
    println!("=== SEO Audit Dry Run ===\n");
    println!("Domain: {}", domain);
    println!("Seed: https://{}/", domain);

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Crawl delay: {}ms", config.crawler.crawl_delay_ms);
    println!("  Concurrent fetches: {}", config.crawler.max_concurrent_fetches);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);

    println!("\nAudit:");
    println!("  Timeout: {}s", config.audit.timeout_secs);
    println!("  Concurrent checks: {}", config.audit.max_concurrent_checks);

    let (checks, skipped) = registry.resolve(modules);
    println!("\nChecks ({}):", checks.len());
    for check in &checks {
        println!("  - {}", check.name());
    }
    if !skipped.is_empty() {
        println!("\nSkipped ({}):", skipped.len());
        for name in &skipped {
            println!("  - {}", name);
        }
    }

    println!("\n✓ Configuration is valid");
}
