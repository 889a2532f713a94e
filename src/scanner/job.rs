//! Running a scan or bulk job over an upload tree.
//!
//! Documents are processed in parallel. Each one is read, checked against
//! the store, matched, and its results appended in a single store call.
//! Cancellation is checked before each document; a document that has started
//! is always finished.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ConfigError, StoreError};
use crate::license_detection::models::{BulkId, BulkRequest, Document};
use crate::license_detection::tokenize::NormalizeOptions;
use crate::license_detection::{BulkMatcher, LicenseMatcher};
use crate::scanner::progress::ProgressSink;
use crate::scanner::upload::{UploadItem, UploadTree};
use crate::scanner::{DocumentFailure, RunReport, RunStatus};
use crate::storage::{BulkRecord, ProcessedKey, ResultStore, ScanRecord};
use crate::utils::hash::{Fingerprint, calculate_sha1};

/// What a run does. Built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    CorpusScan,
    BulkScan(BulkRequest),
}

/// Cooperative cancellation flag shared between a run and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fingerprint of a corpus scan: changes whenever the corpus or any setting
/// affecting its results changes.
pub fn scan_fingerprint(matcher: &LicenseMatcher) -> String {
    let mut fingerprint = Fingerprint::new();
    fingerprint
        .field(b"scan")
        .field(matcher.corpus().fingerprint().as_bytes())
        .field(&matcher.threshold().to_bits().to_le_bytes())
        .field(&matcher.align_options().max_work.to_le_bytes());
    fingerprint.finish()
}

pub fn bulk_fingerprint(bulk: BulkId) -> String {
    let mut fingerprint = Fingerprint::new();
    fingerprint.field(b"bulk").field(&bulk.0.to_le_bytes());
    fingerprint.finish()
}

/// Matches every file of `upload` against the corpus of `matcher`.
pub fn run_scan(
    upload: &UploadTree,
    matcher: &LicenseMatcher,
    store: &dyn ResultStore,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> RunReport {
    let files: Vec<&UploadItem> = upload.files().collect();
    info!(
        "Scanning {} files against {} reference licenses",
        files.len(),
        matcher.corpus().len()
    );

    let run = DocumentRun {
        fingerprint: scan_fingerprint(matcher),
        options: *matcher.corpus().options(),
        store,
        progress,
        cancel,
    };

    run.execute(&files, |document, key| match matcher.detect(document) {
        Some(found) => {
            store.append_scan(ScanRecord {
                key,
                license_match: found.license_match,
                highlights: found.highlights,
            })?;
            Ok(true)
        }
        None => {
            store.mark_processed(key)?;
            Ok(false)
        }
    })
}

/// Applies a bulk reclassification to the files of its subtree.
pub fn run_bulk(
    upload: &UploadTree,
    matcher: &BulkMatcher,
    store: &dyn ResultStore,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<RunReport, ConfigError> {
    let request = matcher.request();
    let files = upload
        .subtree_files(request.subtree)
        .ok_or(ConfigError::UnknownItem(request.subtree))?;
    info!(
        "Applying bulk {} ({} snippet tokens) to {} files",
        request.bulk,
        matcher.snippet_len(),
        files.len()
    );

    let run = DocumentRun {
        fingerprint: bulk_fingerprint(request.bulk),
        options: *matcher.normalize_options(),
        store,
        progress,
        cancel,
    };

    Ok(run.execute(&files, |document, key| match matcher.check(document) {
        Some(outcome) => {
            let event = store.append_bulk(BulkRecord {
                key,
                event: outcome.event,
                highlight: outcome.highlight,
            })?;
            Ok(event.is_some())
        }
        None => {
            store.mark_processed(key)?;
            Ok(false)
        }
    }))
}

enum DocumentOutcome {
    Done { matched: bool },
    Skipped,
    Cancelled,
    Unreadable(String),
    Failed(DocumentFailure),
}

struct DocumentRun<'a> {
    fingerprint: String,
    options: NormalizeOptions,
    store: &'a dyn ResultStore,
    progress: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
}

/// Delivers ticks in order: the counter is held while the sink is called.
struct Ticker<'a> {
    done: Mutex<usize>,
    total: usize,
    progress: &'a dyn ProgressSink,
}

impl Ticker<'_> {
    fn tick(&self) {
        let mut done = match self.done.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *done += 1;
        self.progress.tick(*done, self.total);
    }
}

impl DocumentRun<'_> {
    fn execute<F>(&self, files: &[&UploadItem], process: F) -> RunReport
    where
        F: Fn(&Document, ProcessedKey) -> Result<bool, StoreError> + Sync,
    {
        let ticker = Ticker {
            done: Mutex::new(0),
            total: files.len(),
            progress: self.progress,
        };

        let outcomes: Vec<DocumentOutcome> = files
            .par_iter()
            .map(|item| self.process_one(item, &ticker, &process))
            .collect();

        let report = self.summarize(files, outcomes);
        self.progress.finish(&report.status);
        report
    }

    fn process_one<F>(&self, item: &UploadItem, ticker: &Ticker<'_>, process: &F) -> DocumentOutcome
    where
        F: Fn(&Document, ProcessedKey) -> Result<bool, StoreError> + Sync,
    {
        if self.cancel.is_cancelled() {
            return DocumentOutcome::Cancelled;
        }

        let bytes = match fs::read(&item.full_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot read {}: {}", item.full_path.display(), e);
                ticker.tick();
                return DocumentOutcome::Unreadable(format!("{}: {}", item.path, e));
            }
        };

        let key = ProcessedKey {
            file: item.id,
            content_sha1: calculate_sha1(&bytes),
            fingerprint: self.fingerprint.clone(),
        };

        let result = match self.store.is_processed(&key) {
            Ok(true) => {
                debug!("Skipping already processed {}", item.path);
                return DocumentOutcome::Skipped;
            }
            Ok(false) => process(&Document::new(item.id, bytes, &self.options), key),
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(matched) => DocumentOutcome::Done { matched },
            Err(e) => {
                warn!("Failed to store results for {}: {}", item.path, e);
                DocumentOutcome::Failed(DocumentFailure {
                    file: item.id,
                    path: item.path.clone(),
                    message: e.to_string(),
                })
            }
        };
        ticker.tick();
        outcome
    }

    fn summarize(&self, files: &[&UploadItem], outcomes: Vec<DocumentOutcome>) -> RunReport {
        let mut report = RunReport {
            processed: 0,
            skipped: 0,
            matched: 0,
            failures: Vec::new(),
            diagnostics: Vec::new(),
            cancelled: false,
            status: RunStatus::Success,
        };

        for outcome in outcomes {
            match outcome {
                DocumentOutcome::Done { matched } => {
                    report.processed += 1;
                    if matched {
                        report.matched += 1;
                    }
                }
                DocumentOutcome::Skipped => report.skipped += 1,
                DocumentOutcome::Cancelled => report.cancelled = true,
                DocumentOutcome::Unreadable(message) => {
                    report.processed += 1;
                    report.diagnostics.push(message);
                }
                DocumentOutcome::Failed(failure) => {
                    report.processed += 1;
                    report.failures.push(failure);
                }
            }
        }

        if let Err(e) = self.store.flush() {
            warn!("Failed to flush result store: {}", e);
            report.diagnostics.push(format!("store flush failed: {}", e));
            report.status = RunStatus::Failure {
                message: format!("store flush failed: {}", e),
            };
        }

        if report.cancelled {
            report.status = RunStatus::Failure {
                message: format!(
                    "cancelled after {} of {} documents",
                    report.processed + report.skipped,
                    files.len()
                ),
            };
        } else if !report.failures.is_empty() {
            report.status = RunStatus::Failure {
                message: format!("{} documents could not be stored", report.failures.len()),
            };
        }

        info!(
            "Run finished: {} processed, {} skipped, {} matched, {} failed",
            report.processed,
            report.skipped,
            report.matched,
            report.failures.len()
        );
        report
    }
}
