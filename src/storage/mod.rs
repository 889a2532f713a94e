//! Result storage.
//!
//! Scan and bulk runs hand their per-document results to a [`ResultStore`].
//! Every append is all-or-nothing and idempotent: storing the same document
//! twice under the same [`ProcessedKey`] leaves the store unchanged.

mod json_file;
mod memory;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::license_detection::models::{
    ClearingEvent, EventId, FileId, Highlight, LicenseMatch,
};

pub use json_file::JsonFileStore;
pub use memory::{MemoryStore, StoreState, StoredHighlight};

/// Identifies one document processed by one run configuration.
///
/// A changed file (content hash) or a changed run (fingerprint) is processed
/// again; anything else is skipped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessedKey {
    pub file: FileId,
    pub content_sha1: String,
    pub fingerprint: String,
}

/// Everything a corpus scan stores for one matching document.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub key: ProcessedKey,
    pub license_match: LicenseMatch,
    pub highlights: Vec<Highlight>,
}

/// Everything a bulk run stores for one clearing document.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRecord {
    pub key: ProcessedKey,
    pub event: ClearingEvent,
    pub highlight: Highlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: EventId,
    pub event: ClearingEvent,
}

pub trait ResultStore: Send + Sync {
    fn is_processed(&self, key: &ProcessedKey) -> Result<bool, StoreError>;

    /// Stores a match with its highlights and marks the document processed.
    ///
    /// Returns `false` if the key was already processed.
    fn append_scan(&self, record: ScanRecord) -> Result<bool, StoreError>;

    /// Stores a clearing event with its highlight and marks the document
    /// processed.
    ///
    /// Returns the new event id, or `None` if the key was already processed or
    /// the bulk already has an event for the file.
    fn append_bulk(&self, record: BulkRecord) -> Result<Option<EventId>, StoreError>;

    /// Marks a document without results as processed.
    fn mark_processed(&self, key: ProcessedKey) -> Result<(), StoreError>;

    fn license_matches(&self) -> Result<Vec<LicenseMatch>, StoreError>;

    /// All highlights of a file, sorted by start offset.
    fn highlights(&self, file: FileId) -> Result<Vec<Highlight>, StoreError>;

    /// `BULK` highlights of a file, optionally restricted to one event.
    fn bulk_highlights(
        &self,
        file: FileId,
        event: Option<EventId>,
    ) -> Result<Vec<Highlight>, StoreError>;

    fn clearing_events(&self, file: FileId) -> Result<Vec<StoredEvent>, StoreError>;

    /// Makes appended results durable. A no-op for in-memory stores.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
