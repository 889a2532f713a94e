//! Parse `.LICENSE` reference files.
//!
//! A reference file is YAML frontmatter between two `---` lines followed by
//! the license text:
//!
//! ```text
//! ---
//! id: 3
//! short_name: GPL-3.0
//! precedence: 10
//! ---
//!                     GNU GENERAL PUBLIC LICENSE
//! ```
//!
//! The text is kept byte for byte so that reference offsets in highlights
//! point at the file's own text.

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::license_detection::corpus::{Corpus, ReferenceEntry};
use crate::license_detection::models::LicenseId;
use crate::license_detection::tokenize::NormalizeOptions;

const REFERENCE_EXTENSION: &str = "LICENSE";

#[derive(Debug, Deserialize)]
struct ReferenceFrontmatter {
    id: u64,

    short_name: String,

    #[serde(default)]
    #[allow(dead_code)]
    name: Option<String>,

    #[serde(default)]
    precedence: Option<u32>,
}

/// Splits a reference file into its YAML frontmatter and its text.
///
/// The closing delimiter must be a line consisting of `---` only, so dashes
/// inside the license text are left alone.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

pub fn parse_reference_file(path: &Path) -> Result<ReferenceEntry> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference file: {}", path.display()))?;

    let (yaml_content, text) = split_frontmatter(&content).ok_or_else(|| {
        anyhow!(
            "Reference file missing frontmatter delimiters '---': {}",
            path.display()
        )
    })?;

    let fm: ReferenceFrontmatter = serde_yaml::from_str(yaml_content).with_context(|| {
        format!(
            "Failed to parse reference frontmatter YAML in {}",
            path.display()
        )
    })?;

    if text.trim().is_empty() {
        return Err(anyhow!(
            "Reference file has empty text content: {}",
            path.display()
        ));
    }

    Ok(ReferenceEntry {
        id: LicenseId(fm.id),
        short_name: fm.short_name,
        text: text.to_string(),
        precedence: fm.precedence,
    })
}

/// Parses every `*.LICENSE` file of `dir`, in file name order.
///
/// Files that fail to parse are logged and skipped.
pub fn load_references_from_directory(dir: &Path) -> Result<Vec<ReferenceEntry>> {
    if !dir.is_dir() {
        return Err(ConfigError::MissingCorpus(dir.to_path_buf()).into());
    }

    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read reference directory: {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read directory entry in: {}", dir.display()))?;
        let path = entry.path();
        if path.is_file()
            && path.extension().and_then(|s| s.to_str()) == Some(REFERENCE_EXTENSION)
        {
            paths.push(path);
        }
    }
    paths.sort();

    let mut references = Vec::with_capacity(paths.len());
    for path in paths {
        match parse_reference_file(&path) {
            Ok(reference) => {
                debug!("Loaded reference {} from {}", reference.short_name, path.display());
                references.push(reference);
            }
            Err(e) => warn!("Failed to parse reference file {}: {:#}", path.display(), e),
        }
    }

    Ok(references)
}

/// Loads and builds the corpus of `dir`.
pub fn load_corpus_from_directory(dir: &Path, options: NormalizeOptions) -> Result<Corpus> {
    let references = load_references_from_directory(dir)?;
    let corpus = Corpus::build(references, options)
        .with_context(|| format!("Invalid reference corpus in {}", dir.display()))?;
    Ok(corpus)
}
