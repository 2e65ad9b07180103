//! Ignore patterns: shell-style globs matched against basenames.
//!
//! A pattern such as `.git` or `*.tmp` is compared with a single path
//! component, never with a full path. The scanner prunes a directory whose
//! name matches; the classifier rejects a path if any component below the
//! tree root matches, so live events from inside a pruned directory are
//! dropped the same way.

use std::path::{Component, Path};

use glob::Pattern;

use crate::error::ConfigError;

/// Default patterns: hidden entries, Python caches, notebook checkpoints,
/// version control and editor directories.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".*",
    "__pycache__",
    ".ipynb_checkpoints",
    ".git",
    ".vscode",
    "node_modules",
];

/// A compiled set of basename globs.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Pattern>,
}

impl IgnorePatterns {
    /// Compile `patterns`. The first invalid pattern aborts with
    /// [`ConfigError::Pattern`].
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let raw = raw.as_ref();
            let pattern = Pattern::new(raw).map_err(|source| ConfigError::Pattern {
                pattern: raw.to_string(),
                source,
            })?;
            compiled.push(pattern);
        }
        Ok(Self { patterns: compiled })
    }

    /// True when `name` (a single file or directory name) matches any pattern.
    pub fn matches_name(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }

    /// True when any normal component of `relative` matches.
    ///
    /// `relative` must already be relative to a tree root; the root's own
    /// name is never tested.
    pub fn matches_any_component(&self, relative: &Path) -> bool {
        relative.components().any(|component| match component {
            Component::Normal(name) => self.matches_name(&name.to_string_lossy()),
            _ => false,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
