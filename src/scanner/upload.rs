//! The upload tree: a directory walked once into numbered items.
//!
//! Items are numbered in depth-first preorder with entries sorted by name, so
//! walking an unchanged directory twice yields the same ids. Each item also
//! carries nested-set bounds: an item lies in the subtree of another exactly
//! when its bounds lie within the other's.

use anyhow::{Context, Result, anyhow};
use glob::Pattern;
use log::warn;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::license_detection::models::FileId;
use crate::utils::file::is_path_excluded;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemTreeBounds {
    pub lft: u64,
    pub rgt: u64,
}

impl ItemTreeBounds {
    pub fn contains(&self, other: &ItemTreeBounds) -> bool {
        self.lft <= other.lft && other.rgt <= self.rgt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadItem {
    pub id: FileId,
    /// Path relative to the upload root, `/`-separated. Empty for the root.
    pub path: String,
    #[serde(skip)]
    pub full_path: PathBuf,
    pub kind: ItemKind,
    pub bounds: ItemTreeBounds,
}

#[derive(Debug, Clone)]
pub struct UploadTree {
    root: PathBuf,
    items: Vec<UploadItem>,
    excluded_count: usize,
}

impl UploadTree {
    /// Walks `root`, descending at most `max_depth` directory levels below it.
    ///
    /// Paths matching one of `exclude_patterns` are left out with everything
    /// below them.
    pub fn scan(root: &Path, max_depth: usize, exclude_patterns: &[Pattern]) -> Result<Self> {
        let metadata = fs::metadata(root)
            .with_context(|| format!("Failed to read upload root: {}", root.display()))?;

        let mut walker = Walker {
            items: Vec::new(),
            next_bound: 1,
            excluded_count: 0,
            exclude_patterns,
        };

        if metadata.is_dir() {
            walker.walk_directory(root, String::new(), Some(max_depth))?;
        } else if metadata.is_file() {
            let name = root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            walker.push_file(root.to_path_buf(), name);
        } else {
            return Err(anyhow!("Unsupported upload root: {}", root.display()));
        }

        Ok(Self {
            root: root.to_path_buf(),
            items: walker.items,
            excluded_count: walker.excluded_count,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_id(&self) -> FileId {
        FileId(1)
    }

    /// All items in preorder.
    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn get(&self, id: FileId) -> Option<&UploadItem> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.items.get(index)
    }

    pub fn files(&self) -> impl Iterator<Item = &UploadItem> {
        self.items.iter().filter(|item| item.kind == ItemKind::File)
    }

    /// Files in the subtree rooted at `id`, including `id` itself if it is a
    /// file. `None` if there is no such item.
    pub fn subtree_files(&self, id: FileId) -> Option<Vec<&UploadItem>> {
        let root = self.get(id)?;
        Some(
            self.files()
                .filter(|item| root.bounds.contains(&item.bounds))
                .collect(),
        )
    }

    pub fn files_count(&self) -> usize {
        self.files().count()
    }

    pub fn directories_count(&self) -> usize {
        self.items.len() - self.files_count()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded_count
    }
}

struct Walker<'a> {
    items: Vec<UploadItem>,
    next_bound: u64,
    excluded_count: usize,
    exclude_patterns: &'a [Pattern],
}

impl Walker<'_> {
    fn next_bound(&mut self) -> u64 {
        let bound = self.next_bound;
        self.next_bound += 1;
        bound
    }

    fn next_id(&self) -> FileId {
        FileId(self.items.len() as u64 + 1)
    }

    fn push_file(&mut self, full_path: PathBuf, path: String) {
        let lft = self.next_bound();
        let rgt = self.next_bound();
        self.items.push(UploadItem {
            id: self.next_id(),
            path,
            full_path,
            kind: ItemKind::File,
            bounds: ItemTreeBounds { lft, rgt },
        });
    }

    /// `depth` is `None` once the depth limit is reached: the directory is
    /// recorded but not entered.
    fn walk_directory(&mut self, dir: &Path, path: String, depth: Option<usize>) -> Result<()> {
        let entries = match depth {
            Some(_) => {
                let mut entries: Vec<PathBuf> = fs::read_dir(dir)
                    .with_context(|| format!("Failed to read directory: {}", dir.display()))?
                    .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                    .collect();
                entries.sort();
                entries
            }
            None => Vec::new(),
        };

        let index = self.items.len();
        let lft = self.next_bound();
        self.items.push(UploadItem {
            id: self.next_id(),
            path: path.clone(),
            full_path: dir.to_path_buf(),
            kind: ItemKind::Directory,
            bounds: ItemTreeBounds { lft, rgt: lft },
        });

        if let Some(remaining) = depth {
            for entry_path in entries {
                if is_path_excluded(&entry_path, self.exclude_patterns) {
                    self.excluded_count += 1;
                    continue;
                }

                let name = entry_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let child = if path.is_empty() {
                    name
                } else {
                    format!("{}/{}", path, name)
                };

                match fs::metadata(&entry_path) {
                    Ok(metadata) if metadata.is_file() => self.push_file(entry_path, child),
                    Ok(metadata) if metadata.is_dir() => {
                        let child_depth = remaining.checked_sub(1);
                        if let Err(e) = self.walk_directory(&entry_path, child, child_depth) {
                            warn!("Error processing directory {}: {:#}", entry_path.display(), e);
                        }
                    }
                    Ok(_) => continue,
                    Err(e) => warn!("Cannot stat {}: {}", entry_path.display(), e),
                }
            }
        }

        let rgt = self.next_bound();
        self.items[index].bounds.rgt = rgt;
        Ok(())
    }
}
