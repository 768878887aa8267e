//! Site-Audit main entry point
//!
//! This is the command-line interface for the Site-Audit analysis engine.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use site_audit::config::{load_config_with_hash, Config};
use site_audit::crawler::{Crawler, DiscoveryEvent};
use site_audit::pipeline::{
    AuditPipeline, DefaultExecutor, JobId, NewJob, RetrySweep, RunOutcome, Tier,
};
use site_audit::providers::{TracingNotifier, UnconfiguredProvider};
use site_audit::storage::{open_storage, JobStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Site-Audit: a retryable website analysis engine
///
/// Site-Audit crawls a site, runs technical, linking and content checks on
/// it, and scores the result. Interrupted or partially failed audits are
/// finished by later sweeps without redoing completed work.
#[derive(Parser, Debug)]
#[command(name = "site-audit")]
#[command(version = "1.0.0")]
#[command(about = "A retryable website analysis engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit an audit and run it
    Run {
        /// Root URL of the site
        url: String,

        /// Service tier: free, starter, pro or agency
        #[arg(long, default_value = "free")]
        tier: Tier,

        /// Only audit pages in this top-level section
        #[arg(long)]
        section: Option<String>,
    },

    /// Retry every job whose retry time has passed
    Sweep,

    /// Show the state of one job
    Status {
        #[arg(value_name = "JOB_ID")]
        id: i64,
    },

    /// List a site's sections without auditing it
    Sections {
        /// Root URL of the site
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Run { url, tier, section } => {
            let pipeline = build_pipeline(&config)?;
            let mut job = NewJob::new(url, tier).with_config_hash(config_hash);
            if let Some(section) = section {
                job = job.with_section(section);
            }
            let job = pipeline.submit(job).await?;
            println!("Job {} created", job.id);

            let outcome = pipeline.run(job.id).await?;
            print_outcome(job.id, &outcome);
        }
        Command::Sweep => {
            let sweep = RetrySweep::new(build_pipeline(&config)?, config.escalation.clone());
            let outcomes = sweep.run_due(Utc::now()).await?;
            if outcomes.is_empty() {
                println!("No jobs due");
            }
            for (id, outcome) in &outcomes {
                print_outcome(*id, outcome);
            }
        }
        Command::Status { id } => handle_status(&config, JobId(id)).await?,
        Command::Sections { url } => handle_sections(&config, &url).await?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_audit=info,warn"),
            1 => EnvFilter::new("site_audit=debug,info"),
            2 => EnvFilter::new("site_audit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Wires the pipeline from configuration
///
/// External data and AI providers are not configured from the CLI; the
/// components that need them fail and stay retryable.
fn build_pipeline(config: &Config) -> anyhow::Result<AuditPipeline> {
    let store = Arc::new(
        open_storage(Path::new(&config.output.database_path))
            .context("failed to open job database")?,
    );
    let crawler = Crawler::new(config).context("failed to build crawler")?;
    let provider = Arc::new(UnconfiguredProvider);
    let executor = Arc::new(DefaultExecutor::new(crawler, provider.clone(), provider));

    Ok(AuditPipeline::new(
        store.clone(),
        executor,
        Arc::new(TracingNotifier),
        store,
        &config.pipeline,
    ))
}

fn print_outcome(id: JobId, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed { score: Some(score) } => {
            println!("✓ Job {} completed, health score {}", id, score)
        }
        RunOutcome::Completed { score: None } => println!("✓ Job {} completed", id),
        RunOutcome::Failed { reason } => println!("✗ Job {} failed: {}", id, reason),
        RunOutcome::Rescheduled { at } => {
            println!("… Job {} incomplete, retry scheduled for {}", id, at)
        }
        RunOutcome::Skipped => println!("Job {} skipped", id),
    }
}

/// Prints a job's status, per-component progress and score
async fn handle_status(config: &Config, id: JobId) -> anyhow::Result<()> {
    let store = open_storage(Path::new(&config.output.database_path))
        .context("failed to open job database")?;
    let job = store
        .load_job(id)
        .await?
        .with_context(|| format!("job {} not found", id))?;

    println!("=== Job {} ===\n", job.id);
    println!("  URL: {}", job.root_url);
    println!("  Tier: {}", job.tier);
    if let Some(section) = &job.section_filter {
        println!("  Section: {}", section);
    }
    println!("  Status: {}", job.status);
    println!("  Pages found: {}", job.pages_found);
    println!("  Retries: {}", job.retry_count);
    if let Some(at) = job.next_retry_at {
        println!("  Next retry: {}", at);
    }

    println!("\nComponents:");
    for (key, progress) in job.progress.iter() {
        match &progress.last_error {
            Some(error) => println!("  {:<18} {} ({})", key.as_str(), progress.status, error),
            None => println!("  {:<18} {}", key.as_str(), progress.status),
        }
    }

    if let Some(health) = job.results.health_score() {
        println!("\nHealth score: {} ({})", health.score, health.grade);
        for sub in &health.breakdown {
            if sub.computed {
                println!("  {:<22} {:>5.1} / {}", sub.name, sub.value, sub.max);
            }
        }
    }

    Ok(())
}

/// Prints the discovery stream for a site
async fn handle_sections(config: &Config, url: &str) -> anyhow::Result<()> {
    let crawler = Crawler::new(config).context("failed to build crawler")?;
    let discovery = crawler.discover_sections(url).await?;

    for event in discovery {
        match event {
            DiscoveryEvent::SitemapCount(count) => println!("Sitemap URLs: {}", count),
            DiscoveryEvent::Sections(sections) => println!("Sections: {}\n", sections.len()),
            DiscoveryEvent::ScoredSection(section) => println!(
                "  {:<24} {:>5} URLs  {:>3}%",
                section.name, section.url_count, section.score
            ),
            DiscoveryEvent::Done => {}
        }
    }

    Ok(())
}
