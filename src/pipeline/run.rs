// src/pipeline/run.rs

//! Run orchestrator.
//!
//! One invocation performs one fetch → detect → act → persist cycle:
//!
//! 1. Load the previous snapshot (absent or quarantined state starts empty).
//! 2. Fetch every selected category; one category's failure never aborts
//!    the others.
//! 3. Diff each fetched category against the snapshot and build the merged
//!    record sets.
//! 4. Download PDFs for newly reported documents, send notifications.
//! 5. Persist the merged snapshot atomically — unless the fetch produced
//!    nothing (a failed fetch must never wipe a good snapshot), a day
//!    window was requested, or this is a dry run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, Utc};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{CATEGORIES, Category, Document, find_category};
use crate::pipeline::detect::{CategoryChanges, ChangeReport, DiffOptions, diff_category};
use crate::services::notify::{NotifyOutcome, format_message};
use crate::services::{DocumentSource, Notifier, PdfDownloader};
use crate::storage::SnapshotStore;
use crate::utils::date::filter_recent;

/// Options for one monitor run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Category ids to monitor; `None` means all
    pub categories: Option<Vec<String>>,

    /// Day-window mode: report every document published in the last N
    /// days instead of diffing, and skip persistence
    pub days: Option<u64>,

    /// Download PDF attachments for newly reported documents
    pub download: bool,

    /// Send notifications
    pub notify: bool,

    /// Notify even when nothing changed
    pub force_notify: bool,

    /// Detect changes but suppress both persistence and notification
    pub dry_run: bool,

    /// Drop snapshot records absent from the current fetch
    pub prune_missing: bool,
}

/// Outcome of one monitor run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Documents fetched across all categories
    pub fetched_documents: usize,

    /// Names of categories whose fetch failed
    pub failed_categories: Vec<String>,

    /// Changes found this run (already day-filtered for reporting)
    pub report: ChangeReport,

    /// PDFs written to disk
    pub downloaded: Vec<PathBuf>,

    /// Per-channel notification results, when notification ran
    pub notify_outcome: Option<NotifyOutcome>,

    /// Whether the snapshot file was replaced
    pub persisted: bool,
}

impl RunSummary {
    /// True when notification was attempted and no channel delivered.
    pub fn notification_failed(&self) -> bool {
        self.notify_outcome
            .as_ref()
            .map(NotifyOutcome::all_failed)
            .unwrap_or(false)
    }
}

/// Execute one monitor cycle.
pub async fn run(
    config: &Config,
    source: &dyn DocumentSource,
    store: &SnapshotStore,
    downloader: &PdfDownloader,
    notifier: &Notifier,
    options: &RunOptions,
) -> Result<RunSummary> {
    let started_at = Utc::now();
    let categories = resolve_categories(options.categories.as_deref())?;

    log::info!("Step 1/5: Loading snapshot...");
    let mut snapshot = store.load().await?;

    log::info!("Step 2/5: Fetching {} categories...", categories.len());
    let delay = Duration::from_millis(config.fetch.category_delay_ms);
    let mut fetched: Vec<(&'static Category, Vec<Document>)> = Vec::new();
    let mut failed_categories = Vec::new();

    for (i, &category) in categories.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match source.fetch_category(category, config.fetch.per_page).await {
            Ok(documents) => fetched.push((category, documents)),
            Err(e) => {
                log::warn!("{e}");
                failed_categories.push(category.name.to_string());
            }
        }
    }

    let fetched_documents: usize = fetched.iter().map(|(_, docs)| docs.len()).sum();
    if fetched_documents == 0 {
        // Every category failed or the site served empty pages. Nothing
        // trustworthy arrived, so the snapshot file stays untouched.
        return Err(AppError::fetch(
            "all categories",
            "no documents fetched, possibly blocked",
        ));
    }
    log::info!(
        "Fetch complete: {} documents from {} categories ({} failed)",
        fetched_documents,
        fetched.len(),
        failed_categories.len()
    );

    log::info!("Step 3/5: Detecting changes...");
    let diff_options = DiffOptions {
        prune_missing: options.prune_missing,
    };
    let today = Local::now().date_naive();
    let mut report = ChangeReport::default();

    for (category, documents) in &fetched {
        let diff = diff_category(snapshot.documents(category.id), documents, diff_options);
        if diff.has_changes() {
            log::info!(
                "{}: {} added, {} updated",
                category.name,
                diff.added.len(),
                diff.updated.len()
            );
        }

        let (added, updated) = match options.days {
            // Day-window mode reports everything recent, diff or not.
            Some(days) => (filter_recent(documents, days, today), Vec::new()),
            None => (
                filter_recent(&diff.added, config.fetch.max_report_days, today),
                diff.updated,
            ),
        };
        report.push(CategoryChanges::new(category.id, added, updated));

        // Failed categories never reach this point, so their previous
        // records survive in the snapshot as-is.
        snapshot.set_documents(category.id, diff.merged);
    }

    if report.has_changes() {
        log::info!(
            "Changes to report: {} added, {} updated",
            report.added_count(),
            report.updated_count()
        );
    } else {
        log::info!("No changes to report");
    }

    let mut downloaded = Vec::new();
    if options.download && report.has_changes() {
        log::info!("Step 4/5: Downloading PDFs...");
        let dir = Path::new(&config.paths.download_dir);
        let mut with_pdf = 0usize;
        let mut total = 0usize;
        for changes in &report.categories {
            for doc in &changes.added {
                total += 1;
                match downloader.fetch_pdf(doc, dir).await {
                    Ok(Some(pdf)) => {
                        snapshot.annotate_pdf(&changes.category_id, &doc.url, &pdf.pdf_url);
                        downloaded.push(pdf.path);
                        with_pdf += 1;
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("PDF download failed for {}: {e}", doc.url),
                }
            }
        }
        log::info!("Download complete: {with_pdf}/{total} files with PDF");
    } else {
        log::info!("Step 4/5: Skipping PDF download");
    }

    let mut notify_outcome = None;
    if options.notify && !options.dry_run && (report.has_changes() || options.force_notify) {
        log::info!("Step 5/5: Sending notifications...");
        let message = format_message(&report, started_at);
        let outcome = notifier.send_all(&message, &downloaded).await;
        if outcome.attempted() > 0 {
            log::info!(
                "Notification complete: {}/{} channels succeeded",
                outcome.succeeded(),
                outcome.attempted()
            );
        }
        notify_outcome = Some(outcome);
    } else {
        log::info!("Step 5/5: Skipping notifications");
    }

    let mut persisted = false;
    if options.days.is_some() {
        log::info!("Day-window mode, snapshot not updated");
    } else if options.dry_run {
        log::info!("Dry run, snapshot not updated");
    } else {
        snapshot.last_check = Some(started_at);
        store.save(&snapshot).await?;
        persisted = true;
    }

    Ok(RunSummary {
        fetched_documents,
        failed_categories,
        report,
        downloaded,
        notify_outcome,
        persisted,
    })
}

/// Resolve requested category ids against the registry.
fn resolve_categories(ids: Option<&[String]>) -> Result<Vec<&'static Category>> {
    match ids {
        None => Ok(CATEGORIES.iter().collect()),
        Some(ids) => {
            let mut categories = Vec::with_capacity(ids.len());
            let mut invalid = Vec::new();
            for id in ids {
                match find_category(id) {
                    Some(category) => categories.push(category),
                    None => invalid.push(id.as_str()),
                }
            }
            if !invalid.is_empty() {
                return Err(AppError::config(format!(
                    "Invalid category IDs: {}. Use --list-categories to see available IDs.",
                    invalid.join(", ")
                )));
            }
            Ok(categories)
        }
    }
}
