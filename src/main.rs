//! Ripple-Ingest main entry point
//!
//! Command-line interface for crawl ingestion into a knowledge store.

use anyhow::{Context, Result};
use clap::Parser;
use ripple_ingest::config::{load_config_with_hash, Config};
use ripple_ingest::ingest::{Collaborators, Orchestrator, RunSummary};
use ripple_ingest::output::format_checkpoint_statistics;
use ripple_ingest::state::{Checkpoint, FailureQueue};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Ripple-Ingest: crash-recoverable crawl ingestion
///
/// Crawls a start URL through a crawl service and pushes every page into a
/// categorized knowledge store. Interrupted jobs resume from their
/// checkpoint; permanently failed pages can be re-driven later.
#[derive(Parser, Debug)]
#[command(name = "ripple-ingest")]
#[command(version)]
#[command(about = "Crash-recoverable crawl ingestion into a knowledge store", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Ignore the saved checkpoint and failure queue
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be ingested without doing it
    #[arg(long, conflicts_with_all = ["stats", "retry_failed"])]
    dry_run: bool,

    /// Show checkpoint statistics for the configured start URL and exit
    #[arg(long, conflicts_with_all = ["dry_run", "retry_failed"])]
    stats: bool,

    /// Re-drive retryable URLs from the failure queue instead of crawling
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    retry_failed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::info!("Configuration loaded (hash: {})", &config_hash[..16]);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&config);
    }

    let orchestrator = Orchestrator::new(&config, Collaborators::from_config(&config)?, cli.fresh)
        .context("starting job")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight pages");
                cancel.cancel();
            }
        });
    }

    let summary = if cli.retry_failed {
        orchestrator.redrive_failures(cancel).await?
    } else {
        orchestrator.run(cancel).await?
    };
    print_summary(&summary);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_ingest=info,warn"),
            1 => EnvFilter::new("ripple_ingest=debug,info"),
            2 => EnvFilter::new("ripple_ingest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the plan
fn handle_dry_run(config: &Config) {
    println!("=== Ripple-Ingest Dry Run ===\n");

    println!("Job:");
    println!("  Start URL: {}", config.job.start_url);
    println!("  Max pages: {}", config.job.max_pages);
    println!("  Max depth: {}", config.job.max_depth);
    println!("  Workers: {}", config.job.workers);
    match &config.job.category {
        Some(category) => println!("  Category: {} (fixed)", category),
        None if config.llm.is_some() => println!("  Category: chosen by LLM"),
        None => println!("  Category: derived from domain"),
    }

    println!("\nServices:");
    println!("  Crawler: {}", config.crawler.endpoint);
    println!("  Store: {}", config.store.base_url);
    if let Some(llm) = &config.llm {
        println!("  LLM: {} ({})", llm.endpoint, llm.model);
    }

    println!("\nProcessing mode:");
    match config.mode.manual {
        Some(mode) => println!("  Manual: {}", mode),
        None => {
            println!("  Intelligent: {}", config.mode.intelligent);
            println!("  Full-doc patterns: {}", config.mode.full_doc_patterns.join(", "));
            println!(
                "  Threshold: {} {:?}",
                config.mode.threshold, config.mode.count_unit
            );
        }
    }

    println!("\nResilience:");
    println!("  Attempts per call: {}", config.resilience.max_attempts);
    println!(
        "  Backoff: {}ms x{} up to {}ms",
        config.resilience.initial_delay_ms,
        config.resilience.exponential_base,
        config.resilience.max_delay_ms
    );
    println!(
        "  Breaker: {} failures, {}s recovery",
        config.resilience.failure_threshold, config.resilience.recovery_timeout_secs
    );

    let checkpoint = Checkpoint::new(
        Path::new(&config.output.checkpoint_dir),
        &config.job.start_url,
        config.job.max_pages,
    );
    println!("\nOutput:");
    println!("  Checkpoint: {}", checkpoint.path().display());
    println!("  Failure queue: {}", config.output.failure_queue_path);
    println!("  Failure report: {}", config.output.failure_report_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows checkpoint statistics
fn handle_stats(config: &Config) -> Result<()> {
    let mut checkpoint = Checkpoint::new(
        Path::new(&config.output.checkpoint_dir),
        &config.job.start_url,
        config.job.max_pages,
    );
    println!("Checkpoint: {}\n", checkpoint.path().display());

    if !checkpoint.try_load()? {
        println!("No checkpoint for {}", config.job.start_url);
        return Ok(());
    }

    println!("Started: {}", checkpoint.started_at().to_rfc3339());
    print!("{}", format_checkpoint_statistics(&checkpoint.statistics()));

    let failures = FailureQueue::open(&config.output.failure_queue_path)?;
    let retryable = failures.get_retryable(config.output.max_retries).len();
    println!(
        "\nFailure queue: {} URL(s), {} retryable",
        failures.len(),
        retryable
    );

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== Ripple-Ingest Summary ===\n");
    println!(
        "{}: {} ingested, {} failed, {} skipped ({} already processed)",
        if summary.cancelled { "Cancelled" } else { "Completed" },
        summary.successful,
        summary.failed,
        summary.skipped,
        summary.already_processed
    );
    for (reason, count) in &summary.skip_reasons {
        println!("  {}: {}", reason, count);
    }
    println!("Remaining pending: {}", summary.remaining());
    println!("Elapsed: {:.1}s", summary.elapsed.as_secs_f64());

    if let Some(error) = &summary.crawl_error {
        println!("Crawl error: {}", error);
    }
    if let Some(report) = &summary.failure_report {
        println!("Failure report: {}", report.display());
    }
}
