use log::{debug, info};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::license_detection::models::{EventId, FileId, Highlight, LicenseMatch};
use crate::storage::memory::{MemoryStore, StoreState};
use crate::storage::{BulkRecord, ProcessedKey, ResultStore, ScanRecord, StoredEvent};

/// A [`MemoryStore`] persisted as a JSON document.
///
/// The file is read on open and rewritten on [`ResultStore::flush`], so
/// results of earlier runs are visible to later ones.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let state = match fs::read_to_string(path) {
            Ok(content) => {
                let state: StoreState = serde_json::from_str(&content)?;
                info!(
                    "Loaded {} processed entries from {}",
                    state.processed.len(),
                    path.display()
                );
                state
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Starting new result store at {}", path.display());
                StoreState::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryStore::from_state(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultStore for JsonFileStore {
    fn is_processed(&self, key: &ProcessedKey) -> Result<bool, StoreError> {
        self.inner.is_processed(key)
    }

    fn append_scan(&self, record: ScanRecord) -> Result<bool, StoreError> {
        self.inner.append_scan(record)
    }

    fn append_bulk(&self, record: BulkRecord) -> Result<Option<EventId>, StoreError> {
        self.inner.append_bulk(record)
    }

    fn mark_processed(&self, key: ProcessedKey) -> Result<(), StoreError> {
        self.inner.mark_processed(key)
    }

    fn license_matches(&self) -> Result<Vec<LicenseMatch>, StoreError> {
        self.inner.license_matches()
    }

    fn highlights(&self, file: FileId) -> Result<Vec<Highlight>, StoreError> {
        self.inner.highlights(file)
    }

    fn bulk_highlights(
        &self,
        file: FileId,
        event: Option<EventId>,
    ) -> Result<Vec<Highlight>, StoreError> {
        self.inner.bulk_highlights(file, event)
    }

    fn clearing_events(&self, file: FileId) -> Result<Vec<StoredEvent>, StoreError> {
        self.inner.clearing_events(file)
    }

    /// Writes to a sibling temporary file, then renames it over the store.
    fn flush(&self) -> Result<(), StoreError> {
        let state = self.inner.snapshot()?;
        let json = serde_json::to_string_pretty(&state)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Flushed result store to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(&dir.path().join("state.json")).unwrap();
        assert!(store.license_matches().unwrap().is_empty());
    }

    #[test]
    fn test_flush_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let key = ProcessedKey {
            file: FileId(4),
            content_sha1: "abc".to_string(),
            fingerprint: "def".to_string(),
        };

        let store = JsonFileStore::open(&path).unwrap();
        store.mark_processed(key.clone()).unwrap();
        store.flush().unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(reopened.is_processed(&key).unwrap());
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn test_open_corrupt_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::Serde(_))
        ));
    }
}
