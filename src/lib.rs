pub mod cli;
pub mod config;
pub mod error;
pub mod license_detection;
pub mod models;
pub mod scanner;
pub mod storage;
pub mod utils;

pub use config::MatchConfig;
pub use error::{ConfigError, StoreError};
pub use license_detection::{DocumentMatch, LicenseMatcher};
pub use models::{ExtraData, FileResult, Header, Output};
pub use scanner::{RunMode, RunReport, RunStatus, UploadTree, run_bulk, run_scan};
pub use storage::{JsonFileStore, MemoryStore, ResultStore};
