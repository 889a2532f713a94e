//! Error types of the library.
//!
//! Configuration errors are fatal and raised before any document is touched.
//! Storage errors are per document: the run records them and moves on.

use std::path::PathBuf;

use thiserror::Error;

use crate::license_detection::models::{FileId, LicenseId};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("match threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("alignment work budget must be greater than zero")]
    ZeroWorkBudget,

    #[error("reference corpus is empty")]
    EmptyCorpus,

    #[error("reference corpus directory not found: {}", .0.display())]
    MissingCorpus(PathBuf),

    #[error("duplicate reference license id {0}")]
    DuplicateReference(LicenseId),

    #[error("upload item {0} does not exist")]
    UnknownItem(FileId),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store rejected results for file {file}: {reason}")]
    Rejected { file: FileId, reason: String },

    #[error("store I/O failed")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed")]
    Serde(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::InvalidThreshold(1.5).to_string(),
            "match threshold must be in (0, 1], got 1.5"
        );
        assert_eq!(
            ConfigError::DuplicateReference(LicenseId(7)).to_string(),
            "duplicate reference license id 7"
        );
    }

    #[test]
    fn test_store_error_from_io() {
        let err: StoreError = std::io::Error::other("disk full").into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
