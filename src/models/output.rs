use serde::Serialize;

use crate::error::StoreError;
use crate::license_detection::models::{FileId, Highlight, LicenseId, LicenseMatch};
use crate::scanner::{DocumentFailure, ItemKind, RunStatus, UploadTree};
use crate::storage::{ResultStore, StoredEvent};

pub const LICENSEMONK_OUTPUT_FORMAT_VERSION: &str = "1.0.0";

#[derive(Serialize, Debug)]
pub struct Output {
    pub headers: Vec<Header>,
    pub files: Vec<FileResult>,
}

#[derive(Serialize, Debug)]
pub struct Header {
    pub tool_name: String,
    /// `scan` or `bulk`.
    pub mode: String,
    pub start_timestamp: String,
    pub end_timestamp: String,
    pub duration: f64,
    pub status: RunStatus,
    pub extra_data: ExtraData,
    pub errors: Vec<String>,
    pub failures: Vec<DocumentFailure>,
    pub output_format_version: String,
}

#[derive(Serialize, Debug)]
pub struct ExtraData {
    pub files_count: usize,
    pub directories_count: usize,
    pub excluded_count: usize,
    pub processed_count: usize,
    pub skipped_count: usize,
    pub matched_count: usize,
    pub cancelled: bool,
    pub system_environment: SystemEnvironment,
}

#[derive(Serialize, Debug)]
pub struct SystemEnvironment {
    pub operating_system: String,
    pub cpu_architecture: String,
}

/// A license match without its alignment details.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FileLicense {
    pub license: LicenseId,
    pub short_name: String,
    pub agent: String,
    pub score: f64,
    pub low_confidence: bool,
}

impl From<&LicenseMatch> for FileLicense {
    fn from(m: &LicenseMatch) -> Self {
        Self {
            license: m.license,
            short_name: m.short_name.clone(),
            agent: m.agent.clone(),
            score: m.score,
            low_confidence: m.low_confidence,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FileResult {
    pub id: FileId,
    pub path: String,
    pub licenses: Vec<FileLicense>,
    pub highlights: Vec<Highlight>,
    pub clearing_events: Vec<StoredEvent>,
}

/// Stored results of every file of `upload`, in upload order.
///
/// Files without any result are left out.
pub fn collect_file_results(
    upload: &UploadTree,
    store: &dyn ResultStore,
) -> Result<Vec<FileResult>, StoreError> {
    let matches = store.license_matches()?;

    let mut results = Vec::new();
    for item in upload.items().iter().filter(|item| item.kind == ItemKind::File) {
        let licenses: Vec<FileLicense> = matches
            .iter()
            .filter(|m| m.file == item.id)
            .map(FileLicense::from)
            .collect();
        let highlights = store.highlights(item.id)?;
        let clearing_events = store.clearing_events(item.id)?;

        if licenses.is_empty() && highlights.is_empty() && clearing_events.is_empty() {
            continue;
        }
        results.push(FileResult {
            id: item.id,
            path: item.path.clone(),
            licenses,
            highlights,
            clearing_events,
        });
    }
    Ok(results)
}
