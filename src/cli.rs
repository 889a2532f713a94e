use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::MatchConfig;
use crate::license_detection::models::{BulkId, BulkRequest, FileId, GroupId, LicenseId, UserId};
use crate::scanner::RunMode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Match every file against a reference license corpus
    Scan {
        #[command(flatten)]
        common: CommonArgs,

        /// Directory of `.LICENSE` reference files
        #[arg(long)]
        corpus: PathBuf,
    },

    /// Apply a license decision to every file containing a text snippet
    Bulk {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        bulk: BulkArgs,
    },
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Directory path to scan
    pub dir_path: PathBuf,

    /// Output file path
    #[arg(default_value = "output.json", short, long)]
    pub output_file: PathBuf,

    /// Maximum recursion depth (0 means no recursion)
    #[arg(short, long, default_value = "50")]
    pub max_depth: usize,

    /// Exclude patterns (glob patterns like "*.tmp" or "node_modules")
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// YAML file with match settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Minimum similarity in (0, 1]; overrides the config file
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Alignment work budget per document and reference; overrides the config file
    #[arg(long)]
    pub max_alignment_work: Option<u64>,

    /// JSON file keeping results between runs; already processed files are skipped
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Print a `HEART: <n>` line per processed file instead of a progress bar
    #[arg(long)]
    pub heartbeat: bool,
}

#[derive(Args, Debug)]
pub struct BulkArgs {
    /// Snippet text
    #[arg(long, required_unless_present = "snippet_file", conflicts_with = "snippet_file")]
    pub snippet: Option<String>,

    /// File holding the snippet text
    #[arg(long)]
    pub snippet_file: Option<PathBuf>,

    /// License the decision applies to
    #[arg(long)]
    pub license_id: u64,

    /// Remove the license instead of adding it
    #[arg(long)]
    pub remove: bool,

    #[arg(long)]
    pub actor: u64,

    #[arg(long, default_value = "0")]
    pub group: u64,

    /// Upload item the bulk applies to (defaults to the upload root)
    #[arg(long)]
    pub subtree: Option<u64>,

    #[arg(long, default_value = "1")]
    pub bulk_id: u64,
}

impl Cli {
    pub fn common(&self) -> &CommonArgs {
        match &self.command {
            Command::Scan { common, .. } | Command::Bulk { common, .. } => common,
        }
    }

    /// Settings from the config file, if any, with command line overrides.
    pub fn match_config(&self) -> Result<MatchConfig> {
        let common = self.common();
        let mut config = match &common.config {
            Some(path) => MatchConfig::from_yaml_file(path)?,
            None => MatchConfig::default(),
        };
        if let Some(threshold) = common.threshold {
            config.threshold = threshold;
        }
        if let Some(work) = common.max_alignment_work {
            config.max_alignment_work = work;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn run_mode(&self, upload_root: FileId) -> Result<RunMode> {
        match &self.command {
            Command::Scan { .. } => Ok(RunMode::CorpusScan),
            Command::Bulk { bulk, .. } => Ok(RunMode::BulkScan(bulk.request(upload_root)?)),
        }
    }

    pub fn corpus_dir(&self) -> Option<&Path> {
        match &self.command {
            Command::Scan { corpus, .. } => Some(corpus),
            Command::Bulk { .. } => None,
        }
    }
}

impl BulkArgs {
    fn request(&self, upload_root: FileId) -> Result<BulkRequest> {
        let snippet = match (&self.snippet, &self.snippet_file) {
            (Some(snippet), _) => snippet.clone(),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read snippet file: {}", path.display()))?,
            (None, None) => String::new(),
        };

        Ok(BulkRequest {
            bulk: BulkId(self.bulk_id),
            snippet,
            license: LicenseId(self.license_id),
            removing: self.remove,
            actor: UserId(self.actor),
            group: GroupId(self.group),
            subtree: self.subtree.map_or(upload_root, FileId),
        })
    }
}
