//! Path classification and mirror-path mapping.
//!
//! Pure functions over paths: nothing here touches the filesystem except
//! [`PathClassifier::existing_mirror`], which probes candidate mirrors.

use std::path::{Path, PathBuf};

use nbsync_core::config::normalize_extension;
use nbsync_core::{ConfigError, IgnorePatterns, SyncConfig, Tree};

/// Decides which tree a path belongs to and where its counterpart lives.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    a_root: PathBuf,
    b_root: PathBuf,
    a_extensions: Vec<String>,
    b_extensions: Vec<String>,
    ignore: IgnorePatterns,
}

impl PathClassifier {
    pub fn new(
        a_root: impl Into<PathBuf>,
        b_root: impl Into<PathBuf>,
        a_extensions: Vec<String>,
        b_extensions: Vec<String>,
        ignore: IgnorePatterns,
    ) -> Self {
        Self {
            a_root: a_root.into(),
            b_root: b_root.into(),
            a_extensions: a_extensions.iter().map(|e| normalize_extension(e)).collect(),
            b_extensions: b_extensions.iter().map(|e| normalize_extension(e)).collect(),
            ignore,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            &config.source_dir,
            &config.target_dir,
            config.a_extensions.clone(),
            config.b_extensions.clone(),
            config.ignore()?,
        ))
    }

    pub fn root(&self, tree: Tree) -> &Path {
        match tree {
            Tree::A => &self.a_root,
            Tree::B => &self.b_root,
        }
    }

    pub fn extensions(&self, tree: Tree) -> &[String] {
        match tree {
            Tree::A => &self.a_extensions,
            Tree::B => &self.b_extensions,
        }
    }

    pub fn ignore(&self) -> &IgnorePatterns {
        &self.ignore
    }

    /// Which tree `path` belongs to, if any.
    ///
    /// A path belongs to a tree when it lies under that tree's root, carries
    /// one of its extensions, and no component below the root is ignored.
    pub fn classify(&self, path: &Path) -> Option<Tree> {
        [Tree::A, Tree::B].into_iter().find(|&tree| {
            path.strip_prefix(self.root(tree))
                .ok()
                .is_some_and(|relative| self.classify_relative(relative, tree))
        })
    }

    /// Whether `relative` (relative to the root of `tree`) is a tracked file.
    pub fn classify_relative(&self, relative: &Path, tree: Tree) -> bool {
        let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.matched_extension(name, tree).is_some()
            && !self.ignore.matches_any_component(relative)
    }

    /// Mirror of an absolute `path` living in tree `from`, using the primary
    /// extension of the other tree. `None` when `path` is not under the root.
    pub fn mirror(&self, path: &Path, from: Tree) -> Option<PathBuf> {
        let relative = path.strip_prefix(self.root(from)).ok()?;
        let mirrored = self.mirror_relative(relative, from)?;
        Some(self.root(from.other()).join(mirrored))
    }

    /// Relative mirror path using the primary extension of the other tree.
    pub fn mirror_relative(&self, relative: &Path, from: Tree) -> Option<PathBuf> {
        self.mirror_candidates(relative, from).into_iter().next()
    }

    /// Every relative path in the other tree that counts as a mirror of
    /// `relative`, primary extension first.
    pub fn mirror_candidates(&self, relative: &Path, from: Tree) -> Vec<PathBuf> {
        let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        let Some(ext) = self.matched_extension(name, from) else {
            return Vec::new();
        };
        let stem = &name[..name.len() - ext.len()];
        self.extensions(from.other())
            .iter()
            .map(|target_ext| relative.with_file_name(format!("{stem}{target_ext}")))
            .collect()
    }

    /// The first candidate mirror of `path` that exists on disk, or the
    /// primary mirror when none does.
    pub fn existing_mirror(&self, path: &Path, from: Tree) -> Option<PathBuf> {
        let relative = path.strip_prefix(self.root(from)).ok()?;
        let target_root = self.root(from.other());
        let candidates: Vec<PathBuf> = self
            .mirror_candidates(relative, from)
            .into_iter()
            .map(|candidate| target_root.join(candidate))
            .collect();
        candidates
            .iter()
            .find(|candidate| candidate.exists())
            .or_else(|| candidates.first())
            .cloned()
    }

    /// The extension of `tree` that `name` ends with, matched case-insensitively.
    fn matched_extension<'a>(&self, name: &'a str, tree: Tree) -> Option<&'a str> {
        self.extensions(tree).iter().find_map(|ext| {
            let split = name.len().checked_sub(ext.len()).filter(|&at| at > 0)?;
            let tail = name.get(split..)?;
            tail.eq_ignore_ascii_case(ext).then_some(tail)
        })
    }
}
