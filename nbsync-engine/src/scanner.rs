//! Tree scanning.
//!
//! A scan never fails as a whole: a missing root gives an empty snapshot and
//! unreadable entries are skipped with a warning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::Span;
use walkdir::WalkDir;

use nbsync_core::Tree;

use crate::classifier::PathClassifier;

/// Modification time and size of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileStamp {
    /// Modification time since the Unix epoch.
    pub modified: Duration,
    pub size: u64,
}

impl FileStamp {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> std::io::Result<Self> {
        Ok(Self {
            modified: unix_duration(metadata.modified()?),
            size: metadata.len(),
        })
    }

    /// Stamp of the file at `path`, `None` if it cannot be read.
    pub fn read(path: &Path) -> Option<Self> {
        std::fs::metadata(path)
            .and_then(|meta| Self::from_metadata(&meta))
            .ok()
    }
}

pub(crate) fn unix_duration(timestamp: SystemTime) -> Duration {
    timestamp.duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// Immutable view of one tree: relative path → stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeSnapshot {
    tree: Tree,
    entries: BTreeMap<PathBuf, FileStamp>,
}

impl TreeSnapshot {
    pub fn empty(tree: Tree) -> Self {
        Self {
            tree,
            entries: BTreeMap::new(),
        }
    }

    pub fn from_entries(tree: Tree, entries: impl IntoIterator<Item = (PathBuf, FileStamp)>) -> Self {
        Self {
            tree,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn tree(&self) -> Tree {
        self.tree
    }

    pub fn get(&self, relative: &Path) -> Option<&FileStamp> {
        self.entries.get(relative)
    }

    pub fn contains(&self, relative: &Path) -> bool {
        self.entries.contains_key(relative)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileStamp)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Walks a tree root and records every tracked file.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    classifier: PathClassifier,
    span: Span,
}

impl TreeScanner {
    pub fn new(classifier: PathClassifier, span: Span) -> Self {
        Self { classifier, span }
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    /// Snapshot of `tree`.
    ///
    /// Directories whose name matches an ignore pattern are pruned before
    /// descent.
    pub fn scan(&self, tree: Tree) -> TreeSnapshot {
        let _guard = self.span.enter();
        let root = self.classifier.root(tree);
        let mut snapshot = TreeSnapshot::empty(tree);

        if !root.is_dir() {
            tracing::warn!(tree = %tree, root = %root.display(), "tree root missing, empty snapshot");
            return snapshot;
        }

        let ignore = self.classifier.ignore();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !ignore.matches_name(&entry.file_name().to_string_lossy())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(tree = %tree, error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if !self.classifier.classify_relative(relative, tree) {
                continue;
            }
            match entry.metadata().map_err(std::io::Error::from).and_then(|m| FileStamp::from_metadata(&m)) {
                Ok(stamp) => {
                    snapshot.entries.insert(relative.to_path_buf(), stamp);
                }
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skipping file, metadata unavailable");
                }
            }
        }

        tracing::debug!(tree = %tree, files = snapshot.len(), "scanned");
        snapshot
    }
}
