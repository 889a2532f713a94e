use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;
use crate::license_detection::models::{EventId, FileId, Highlight, HighlightKind, LicenseMatch};
use crate::storage::{BulkRecord, ProcessedKey, ResultStore, ScanRecord, StoredEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHighlight {
    /// Clearing event the highlight belongs to, for `BULK` highlights.
    pub event: Option<EventId>,
    pub highlight: Highlight,
}

/// The full content of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreState {
    pub processed: BTreeSet<ProcessedKey>,
    pub matches: Vec<LicenseMatch>,
    pub highlights: Vec<StoredHighlight>,
    pub events: Vec<StoredEvent>,
    pub next_event_id: u64,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            processed: BTreeSet::new(),
            matches: Vec::new(),
            highlights: Vec::new(),
            events: Vec::new(),
            next_event_id: 1,
        }
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// A copy of the current content.
    pub fn snapshot(&self) -> Result<StoreState, StoreError> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

impl ResultStore for MemoryStore {
    fn is_processed(&self, key: &ProcessedKey) -> Result<bool, StoreError> {
        Ok(self.read()?.processed.contains(key))
    }

    fn append_scan(&self, record: ScanRecord) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        if state.processed.contains(&record.key) {
            return Ok(false);
        }

        state.processed.insert(record.key);
        state.matches.push(record.license_match);
        state
            .highlights
            .extend(record.highlights.into_iter().map(|highlight| StoredHighlight {
                event: None,
                highlight,
            }));
        Ok(true)
    }

    fn append_bulk(&self, record: BulkRecord) -> Result<Option<EventId>, StoreError> {
        let mut state = self.write()?;
        let already_cleared = state.events.iter().any(|stored| {
            stored.event.bulk == record.event.bulk && stored.event.file == record.event.file
        });
        if already_cleared || state.processed.contains(&record.key) {
            return Ok(None);
        }

        let id = EventId(state.next_event_id);
        state.next_event_id += 1;
        state.processed.insert(record.key);
        state.events.push(StoredEvent {
            id,
            event: record.event,
        });
        state.highlights.push(StoredHighlight {
            event: Some(id),
            highlight: record.highlight,
        });
        Ok(Some(id))
    }

    fn mark_processed(&self, key: ProcessedKey) -> Result<(), StoreError> {
        self.write()?.processed.insert(key);
        Ok(())
    }

    fn license_matches(&self) -> Result<Vec<LicenseMatch>, StoreError> {
        let mut matches = self.read()?.matches.clone();
        matches.sort_by_key(|m| (m.file, m.license));
        Ok(matches)
    }

    fn highlights(&self, file: FileId) -> Result<Vec<Highlight>, StoreError> {
        let mut highlights: Vec<Highlight> = self
            .read()?
            .highlights
            .iter()
            .filter(|stored| stored.highlight.file == file)
            .map(|stored| stored.highlight.clone())
            .collect();
        highlights.sort_by_key(|h| (h.start, h.end, h.kind));
        Ok(highlights)
    }

    fn bulk_highlights(
        &self,
        file: FileId,
        event: Option<EventId>,
    ) -> Result<Vec<Highlight>, StoreError> {
        let mut highlights: Vec<Highlight> = self
            .read()?
            .highlights
            .iter()
            .filter(|stored| {
                stored.highlight.file == file
                    && stored.highlight.kind == HighlightKind::Bulk
                    && event.is_none_or(|id| stored.event == Some(id))
            })
            .map(|stored| stored.highlight.clone())
            .collect();
        highlights.sort_by_key(|h| (h.start, h.end));
        Ok(highlights)
    }

    fn clearing_events(&self, file: FileId) -> Result<Vec<StoredEvent>, StoreError> {
        Ok(self
            .read()?
            .events
            .iter()
            .filter(|stored| stored.event.file == file)
            .cloned()
            .collect())
    }
}
