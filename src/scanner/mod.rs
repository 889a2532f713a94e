mod job;
pub mod progress;
pub mod upload;

use serde::Serialize;
use std::fmt;

use crate::license_detection::models::FileId;

pub use self::job::{CancellationToken, RunMode, run_bulk, run_scan};
pub use self::progress::{
    CountingProgress, HeartbeatProgress, IndicatifProgress, NoProgress, ProgressSink,
};
pub use self::upload::{ItemKind, ItemTreeBounds, UploadItem, UploadTree};

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure { message: String },
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failure { message } => write!(f, "failure: {}", message),
        }
    }
}

/// A document whose results could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub file: FileId,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Documents worked on in this run (one progress tick each).
    pub processed: usize,
    /// Documents skipped as already processed.
    pub skipped: usize,
    /// Documents that produced a match or a clearing event.
    pub matched: usize,
    pub failures: Vec<DocumentFailure>,
    /// Non-fatal problems, such as unreadable files.
    pub diagnostics: Vec<String>,
    pub cancelled: bool,
    pub status: RunStatus,
}
