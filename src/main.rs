//! Squad-Scout main entry point
//!
//! Command-line interface for running configured crawl jobs.

use clap::Parser;
use squad_scout::config::{load_config_with_hash, Config};
use squad_scout::control::{JobController, StartOutcome};
use squad_scout::crawl::{JsonFileTargets, RawBodyParser};
use squad_scout::fetch::{ResilientFetcher, SessionPool};
use squad_scout::progress::{HubMessage, ProgressHub};
use squad_scout::{CancelRegistry, CheckpointStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Squad-Scout: a resilient roster crawler
///
/// Runs the crawl jobs declared in the configuration file, resuming
/// from their checkpoints and reporting live progress. Ctrl-C requests
/// cooperative cancellation; completed work is checkpointed before
/// exit.
#[derive(Parser, Debug)]
#[command(name = "squad-scout")]
#[command(version = "1.0.0")]
#[command(about = "A resilient roster crawler", long_about = None)]
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

    /// Run only this job kind instead of all configured jobs
    #[arg(long, value_name = "KIND")]
    job: Option<String>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show checkpoint statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, cli.job).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("squad_scout=info,warn"),
            1 => EnvFilter::new("squad_scout=debug,info"),
            2 => EnvFilter::new("squad_scout=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the job plan
fn handle_dry_run(config: &Config) {
    println!("=== Squad-Scout Dry Run ===\n");

    println!("Fetch Configuration:");
    println!("  Max retries: {}", config.fetch.max_retries);
    println!("  Request timeout: {}s", config.fetch.request_timeout_secs);
    println!("  Session pool size: {}", config.fetch.pool_size);
    println!(
        "  Backoff bases: 429={}s, 403={}s, transient={}s (cap {}s)",
        config.fetch.rate_limit_delay_secs,
        config.fetch.block_delay_secs,
        config.fetch.error_delay_secs,
        config.fetch.max_delay_secs
    );

    println!("\nJobs ({}):", config.job.len());
    for job in &config.job {
        println!("  - {}", job.kind);
        println!("    Targets: {}", job.targets_path);
        println!("    Checkpoint: {}", job.checkpoint_path);
        println!(
            "    Workers: {}, save every {} items",
            job.workers, job.save_every
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: summarizes each job's checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use squad_scout::ResultStatus;

    for job in &config.job {
        let store = CheckpointStore::load(Path::new(&job.checkpoint_path))?;

        let mut succeeded = 0usize;
        let mut not_found = 0usize;
        let mut errored = 0usize;
        for result in store.results() {
            match &result.status {
                ResultStatus::Success => succeeded += 1,
                ResultStatus::NotFound => not_found += 1,
                ResultStatus::Error(_) => errored += 1,
            }
        }

        println!("Job: {}", job.kind);
        println!("  Checkpoint: {}", job.checkpoint_path);
        println!("  Results: {}", store.len());
        println!("  Succeeded: {}", succeeded);
        println!("  Not found: {}", not_found);
        println!("  Errors: {}", errored);
        println!();
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, only_kind: Option<String>) -> anyhow::Result<()> {
    let cancel = Arc::new(CancelRegistry::new());
    let pool = Arc::new(SessionPool::new(
        config.fetch.pool_size,
        config.fetch.request_timeout(),
    ));
    let fetcher = Arc::new(ResilientFetcher::new(
        pool,
        cancel.clone(),
        config.fetch.clone(),
    ));

    let job_intervals: HashMap<String, Duration> = config
        .job
        .iter()
        .filter_map(|job| {
            job.min_interval_ms
                .map(|ms| (job.kind.clone(), Duration::from_millis(ms)))
        })
        .collect();
    let hub = Arc::new(ProgressHub::new(config.progress.clone(), job_intervals));

    let controller = Arc::new(JobController::new(fetcher, cancel.clone(), hub.clone()));
    for job in &config.job {
        controller.register(
            job.clone(),
            Arc::new(JsonFileTargets::new(&job.targets_path)),
            Arc::new(RawBodyParser),
        );
    }

    let kinds: Vec<String> = match only_kind {
        Some(kind) => {
            if !controller.kinds().contains(&kind) {
                anyhow::bail!("unknown job kind: {}", kind);
            }
            vec![kind]
        }
        None => controller.kinds(),
    };

    // Ctrl-C flips every cancel flag; jobs wind down cooperatively
    {
        let cancel = cancel.clone();
        let kinds = kinds.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling running jobs");
                for kind in &kinds {
                    cancel.set(kind);
                }
            }
        });
    }

    // Mirror hub events to the log so progress is visible on the CLI
    let mut subscription = hub.subscribe();
    tokio::spawn(async move {
        while let Some(message) = subscription.next().await {
            if let HubMessage::Event(event) = message {
                tracing::info!(
                    "[{}] {:?} {}/{} ({:.1}%){}",
                    event.job_kind,
                    event.status,
                    event.current,
                    event.total,
                    event.percentage,
                    event
                        .message
                        .as_deref()
                        .map(|m| format!(" - {}", m))
                        .unwrap_or_default()
                );
            }
        }
    });

    for kind in &kinds {
        match controller.start(kind) {
            StartOutcome::Started => {}
            StartOutcome::AlreadyRunning => {
                tracing::warn!("Job {} is already running, skipping", kind)
            }
            StartOutcome::UnknownKind => {
                tracing::error!("Job {} is not registered, skipping", kind)
            }
        }
    }

    // Wait until every started job reaches a terminal state
    loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        if kinds.iter().all(|kind| !controller.status(kind).running) {
            break;
        }
    }

    tracing::info!("All jobs finished");
    Ok(())
}
