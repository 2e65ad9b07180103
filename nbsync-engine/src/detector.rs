//! Polling change detection.
//!
//! The detector keeps one rolling snapshot per tree and reports the delta on
//! every poll. It is the authoritative change source; native filesystem
//! notifications only shorten the time until a change is queued.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::Span;

use nbsync_core::Tree;

use crate::scanner::{TreeScanner, TreeSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    /// The path is the destination of a rename.
    Moved,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Moved => write!(f, "moved"),
        }
    }
}

/// A single observed change. `path` is absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub observed_at: Instant,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind, observed_at: Instant) -> Self {
        Self {
            path: path.into(),
            kind,
            observed_at,
        }
    }
}

/// Delta between two snapshots of the tree rooted at `root`.
///
/// New paths are `Created`, paths whose size or mtime changed are `Modified`,
/// vanished paths are `Deleted`.
pub fn diff_snapshots(
    root: &Path,
    prior: &TreeSnapshot,
    current: &TreeSnapshot,
    observed_at: Instant,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for (relative, stamp) in current.iter() {
        let kind = match prior.get(relative) {
            None => ChangeKind::Created,
            Some(old) if old != stamp => ChangeKind::Modified,
            Some(_) => continue,
        };
        events.push(ChangeEvent::new(root.join(relative), kind, observed_at));
    }
    for (relative, _) in prior.iter() {
        if !current.contains(relative) {
            events.push(ChangeEvent::new(
                root.join(relative),
                ChangeKind::Deleted,
                observed_at,
            ));
        }
    }
    events
}

/// Rolling per-tree snapshots plus the scanner that refreshes them.
#[derive(Debug)]
pub struct ChangeDetector {
    scanner: TreeScanner,
    snapshot_a: TreeSnapshot,
    snapshot_b: TreeSnapshot,
    span: Span,
}

impl ChangeDetector {
    pub fn new(scanner: TreeScanner, span: Span) -> Self {
        Self {
            scanner,
            snapshot_a: TreeSnapshot::empty(Tree::A),
            snapshot_b: TreeSnapshot::empty(Tree::B),
            span,
        }
    }

    /// Take baseline snapshots of both trees without reporting anything.
    pub fn prime(&mut self) {
        let _guard = self.span.enter();
        self.snapshot_a = self.scanner.scan(Tree::A);
        self.snapshot_b = self.scanner.scan(Tree::B);
        tracing::debug!(
            a_files = self.snapshot_a.len(),
            b_files = self.snapshot_b.len(),
            "change detector primed"
        );
    }

    pub fn snapshot(&self, tree: Tree) -> &TreeSnapshot {
        match tree {
            Tree::A => &self.snapshot_a,
            Tree::B => &self.snapshot_b,
        }
    }

    /// Rescan `tree` and diff against `prior`.
    pub fn poll_tree(
        &self,
        tree: Tree,
        prior: &TreeSnapshot,
        now: Instant,
    ) -> (TreeSnapshot, Vec<ChangeEvent>) {
        let current = self.scanner.scan(tree);
        let events = diff_snapshots(self.scanner.classifier().root(tree), prior, &current, now);
        (current, events)
    }

    /// Rescan both trees, replace the rolling snapshots, return all changes.
    pub fn poll(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let _guard = self.span.enter();
        let (next_a, mut events) = self.poll_tree(Tree::A, &self.snapshot_a, now);
        let (next_b, events_b) = self.poll_tree(Tree::B, &self.snapshot_b, now);
        self.snapshot_a = next_a;
        self.snapshot_b = next_b;
        events.extend(events_b);
        for event in &events {
            tracing::debug!(path = %event.path.display(), kind = %event.kind, "poll detected change");
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PathClassifier;
    use crate::scanner::FileStamp;
    use nbsync_core::IgnorePatterns;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn stamp(secs: u64, size: u64) -> FileStamp {
        FileStamp {
            modified: Duration::from_secs(secs),
            size,
        }
    }

    #[test]
    fn diff_reports_created_modified_deleted() {
        let prior = TreeSnapshot::from_entries(
            Tree::A,
            [
                (PathBuf::from("same.md"), stamp(1, 1)),
                (PathBuf::from("touched.md"), stamp(1, 1)),
                (PathBuf::from("grown.md"), stamp(1, 1)),
                (PathBuf::from("gone.md"), stamp(1, 1)),
            ],
        );
        let current = TreeSnapshot::from_entries(
            Tree::A,
            [
                (PathBuf::from("same.md"), stamp(1, 1)),
                (PathBuf::from("touched.md"), stamp(2, 1)),
                (PathBuf::from("grown.md"), stamp(1, 9)),
                (PathBuf::from("new.md"), stamp(3, 1)),
            ],
        );
        let now = Instant::now();
        let mut events: Vec<_> = diff_snapshots(Path::new("/r"), &prior, &current, now)
            .into_iter()
            .map(|e| (e.path, e.kind))
            .collect();
        events.sort();
        assert_eq!(
            events,
            vec![
                (PathBuf::from("/r/gone.md"), ChangeKind::Deleted),
                (PathBuf::from("/r/grown.md"), ChangeKind::Modified),
                (PathBuf::from("/r/new.md"), ChangeKind::Created),
                (PathBuf::from("/r/touched.md"), ChangeKind::Modified),
            ]
        );
    }

    #[test]
    fn poll_after_prime_reports_only_new_changes() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("old.md"), "x").unwrap();

        let classifier = PathClassifier::new(
            &a,
            &b,
            vec![".md".into()],
            vec![".ipynb".into()],
            IgnorePatterns::default(),
        );
        let mut detector =
            ChangeDetector::new(TreeScanner::new(classifier, Span::none()), Span::none());
        detector.prime();
        assert_eq!(detector.snapshot(Tree::A).len(), 1);

        fs::write(b.join("fresh.ipynb"), "{}").unwrap();
        let events = detector.poll(Instant::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, b.join("fresh.ipynb"));
        assert_eq!(events[0].kind, ChangeKind::Created);

        assert!(detector.poll(Instant::now()).is_empty());
    }
}
