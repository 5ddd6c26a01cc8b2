//! CAAC Document Update Monitor CLI
//!
//! One invocation performs one fetch → detect → act → persist cycle and
//! exits: 0 on success (including "no changes"), 1 on failure, 130 when
//! interrupted.

use std::path::PathBuf;
use std::process::ExitCode;

use caac_monitor::{
    config::Config,
    models::CATEGORIES,
    pipeline::{self, RunOptions},
    services::{CaacSource, Notifier, PdfDownloader},
    storage::SnapshotStore,
    utils::http,
};
use clap::Parser;

/// CAAC document update monitor
#[derive(Parser, Debug)]
#[command(name = "caac-monitor", version, about = "CAAC document update monitor")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Snapshot file path (overrides the config file)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Only report documents from the last N days (snapshot is not updated)
    #[arg(long, value_name = "N")]
    days: Option<i64>,

    /// Comma-separated category IDs to monitor (default: all)
    #[arg(long, value_name = "IDS")]
    categories: Option<String>,

    /// List all available category IDs and exit
    #[arg(long)]
    list_categories: bool,

    /// Skip PDF download
    #[arg(long)]
    no_download: bool,

    /// Skip sending notifications
    #[arg(long)]
    no_notify: bool,

    /// Detect changes without updating the snapshot or notifying
    #[arg(long)]
    dry_run: bool,

    /// Send a notification even if no new documents were found
    #[arg(long)]
    force_notify: bool,

    /// Number of documents to fetch per category (overrides the config file)
    #[arg(long, value_name = "N")]
    per_page: Option<usize>,

    /// Drop snapshot records absent from this fetch
    #[arg(long)]
    prune: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolve the day window from the flag or the `DAYS` environment variable.
///
/// `0` means incremental detection mode, same as no value.
fn resolve_days(arg: Option<i64>) -> Result<Option<u64>, String> {
    let value = match arg {
        Some(v) => Some(v),
        None => std::env::var("DAYS")
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok()),
    };

    match value {
        None | Some(0) => Ok(None),
        Some(v) if v < 0 => Err("--days must be >= 0".to_string()),
        Some(v) => Ok(Some(v as u64)),
    }
}

fn print_categories() {
    println!("\nAvailable categories:");
    println!("{}", "-".repeat(50));
    let mut categories: Vec<_> = CATEGORIES.iter().collect();
    categories.sort_by_key(|c| c.id.parse::<u32>().unwrap_or(u32::MAX));
    for category in &categories {
        println!("  {:>3}: {}", category.id, category.name);
    }
    println!("{}", "-".repeat(50));
    println!("Total: {} categories", CATEGORIES.len());
    println!("\nUsage: --categories 9,13,14,15");
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list_categories {
        print_categories();
        return ExitCode::SUCCESS;
    }

    let days = match resolve_days(cli.days) {
        Ok(days) => days,
        Err(message) => {
            log::error!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();
    if let Some(state) = &cli.state {
        config.paths.state_file = state.to_string_lossy().to_string();
    }
    if let Some(per_page) = cli.per_page {
        config.fetch.per_page = per_page;
    }
    if let Err(e) = config.validate() {
        log::error!("{e}");
        return ExitCode::FAILURE;
    }

    let categories = cli.categories.as_deref().map(|s| {
        s.split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
    });

    let options = RunOptions {
        categories,
        days,
        download: !cli.no_download,
        notify: !cli.no_notify,
        force_notify: cli.force_notify,
        dry_run: cli.dry_run,
        prune_missing: cli.prune,
    };

    let client = match http::create_client(&config.fetch) {
        Ok(client) => client,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let source = CaacSource::new(client.clone(), config.retry.clone());
    let store = SnapshotStore::new(&config.paths.state_file);
    let downloader = PdfDownloader::new(client.clone(), config.retry.clone());
    let notifier = Notifier::new(config.notify.clone(), client);

    log::info!("==================================================");
    log::info!("CAAC Document Update Monitor - Starting");
    match options.days {
        Some(n) => log::info!("Mode: report documents from last {n} days"),
        None => log::info!("Mode: detect new documents"),
    }
    match &options.categories {
        Some(ids) => log::info!("Categories: {}", ids.join(", ")),
        None => log::info!("Categories: all ({})", CATEGORIES.len()),
    }
    log::info!("==================================================");

    let outcome = tokio::select! {
        result = pipeline::run(&config, &source, &store, &downloader, &notifier, &options) => result,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted by user");
            return ExitCode::from(130);
        }
    };

    match outcome {
        Ok(summary) => {
            log::info!("==================================================");
            log::info!("CAAC Document Update Monitor - Complete");
            log::info!(
                "New documents: {}, updated: {}, PDFs downloaded: {}",
                summary.report.added_count(),
                summary.report.updated_count(),
                summary.downloaded.len()
            );
            if !summary.failed_categories.is_empty() {
                log::warn!("Failed categories: {}", summary.failed_categories.join(", "));
            }
            log::info!("==================================================");

            if summary.notification_failed() && config.notify.require_delivery {
                log::error!("All notification channels failed");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
