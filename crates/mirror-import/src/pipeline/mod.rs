//! Scraper → checker → transfer pipeline
//!
//! Each stage runs as its own task and talks to the next one through a
//! bounded channel, so enumeration can never get more than `queue_depth`
//! files ahead of the stage behind it. Every send, receive and loop head is
//! also a cancellation point.
//!
//! Stages own their counters and hand them back when their task finishes;
//! the orchestrator only reads them after joining.

use crate::config::PipelineConfig;
use crate::file::{needs_transfer, perform_transfer, File, TransferResult};
use crate::job::Job;
use crate::storage::ObjectStore;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod scraper;

pub use self::scraper::Scraper;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScraperStats {
    pub directories_scanned: u64,
    pub files_found: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckerStats {
    pub files_need_transfer: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub files_transferred: u64,
    pub files_unchanged: u64,
    pub files_failed: u64,
}

/// Final counters of one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub scraper: ScraperStats,
    pub checker: CheckerStats,
    pub transfer: TransferStats,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dirs scanned, {} files found, {}/{} files transferred",
            self.scraper.directories_scanned,
            self.scraper.files_found,
            self.checker.files_need_transfer,
            self.transfer.files_transferred,
        )?;
        if self.transfer.files_unchanged > 0 || self.transfer.files_failed > 0 {
            write!(
                f,
                " ({} unchanged, {} failed)",
                self.transfer.files_unchanged, self.transfer.files_failed
            )?;
        }
        Ok(())
    }
}

/// Next real work item, or `None` on cancellation, closed input, or sentinel
async fn next_file(input: &mut mpsc::Receiver<File>, cancel: &CancellationToken) -> Option<File> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        file = input.recv() => file.filter(|file| !file.is_end_of_stream()),
    }
}

/// Push `file` downstream; `false` when cancelled or the receiver is gone
async fn forward(output: &mpsc::Sender<File>, file: File, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = output.send(file) => sent.is_ok(),
    }
}

/// Enumerate every job and feed discovered files to `output`
pub async fn run_scraper(
    mut scraper: Scraper,
    output: mpsc::Sender<File>,
    cancel: CancellationToken,
) -> ScraperStats {
    let mut stats = ScraperStats::default();

    'units: while !cancel.is_cancelled() && !scraper.is_done() {
        let files = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            files = scraper.next() => files,
        };
        stats.directories_scanned += 1;

        for file in files {
            stats.files_found += 1;
            if !forward(&output, file, &cancel).await {
                break 'units;
            }
        }
    }

    debug!(?stats, "Scraper finished");
    stats
}

/// Forward the files whose destination copy is stale
pub async fn run_checker(
    store: Arc<dyn ObjectStore>,
    mut input: mpsc::Receiver<File>,
    output: mpsc::Sender<File>,
    cancel: CancellationToken,
) -> CheckerStats {
    let mut stats = CheckerStats::default();

    while let Some(mut file) = next_file(&mut input, &cancel).await {
        let stale = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            stale = needs_transfer(&mut file, store.as_ref()) => stale,
        };
        if !stale {
            continue;
        }

        stats.files_need_transfer += 1;
        if !forward(&output, file, &cancel).await {
            break;
        }
    }

    debug!(?stats, "Checker finished");
    stats
}

/// Copy every incoming file, retrying failures up to `retries` times
pub async fn run_transfer(
    store: Arc<dyn ObjectStore>,
    mut input: mpsc::Receiver<File>,
    retries: u32,
    cancel: CancellationToken,
) -> TransferStats {
    let mut stats = TransferStats::default();

    'files: while let Some(mut file) = next_file(&mut input, &cancel).await {
        let mut attempt = 0;
        let outcome = loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'files,
                outcome = perform_transfer(&mut file, store.as_ref()) => outcome,
            };
            if outcome != TransferResult::Failed || attempt >= retries {
                break outcome;
            }
            attempt += 1;
            warn!(job = %file.job.name, path = %file.path(), attempt, "Retrying transfer");
        };

        match outcome {
            TransferResult::Transferred => stats.files_transferred += 1,
            TransferResult::Unchanged => stats.files_unchanged += 1,
            TransferResult::Failed => stats.files_failed += 1,
        }
    }

    debug!(?stats, "Transfer finished");
    stats
}

fn joined<T: Default>(stage: &str, result: Result<T, JoinError>) -> T {
    result.unwrap_or_else(|e| {
        error!(stage, error = %e, "Pipeline stage did not finish");
        T::default()
    })
}

/// Run all jobs through one pipeline and wait for every stage to finish
pub async fn run(
    jobs: Vec<Arc<Job>>,
    store: Arc<dyn ObjectStore>,
    config: &PipelineConfig,
    cancel: CancellationToken,
) -> RunStats {
    let depth = config.queue_depth.max(1);
    let (found_tx, found_rx) = mpsc::channel(depth);
    let (stale_tx, stale_rx) = mpsc::channel(depth);

    info!(jobs = jobs.len(), queue_depth = depth, "Starting pipeline");

    let scraper = tokio::spawn(run_scraper(Scraper::new(&jobs), found_tx, cancel.clone()));
    let checker = tokio::spawn(run_checker(Arc::clone(&store), found_rx, stale_tx, cancel.clone()));
    let transfer = tokio::spawn(run_transfer(store, stale_rx, config.transfer_retries, cancel.clone()));

    let (scraper, checker, transfer) = tokio::join!(scraper, checker, transfer);
    let stats = RunStats {
        scraper: joined("scraper", scraper),
        checker: joined("checker", checker),
        transfer: joined("transfer", transfer),
    };

    if cancel.is_cancelled() {
        warn!("Pipeline was cancelled before completion");
    }
    info!("{stats}");
    stats
}
