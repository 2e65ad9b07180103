//! Per-path coalescing of change notifications.
//!
//! Every path has at most one pending action. A later event replaces the
//! earlier one and restarts its quiet period, with two exceptions:
//!
//! - a deletion is due immediately, so it fires ahead of modifications;
//! - a `Modified` never replaces a pending deletion (a stale write event
//!   must not resurrect a file that is gone). `Created` and `Moved` do.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::Span;

use crate::detector::{ChangeEvent, ChangeKind};

/// The single action waiting to fire for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub path: PathBuf,
    pub kind: ChangeKind,
    /// Instant at which the action becomes due.
    pub due_at: Instant,
}

#[derive(Debug)]
pub struct DebounceQueue {
    delay: Duration,
    pending: HashMap<PathBuf, PendingAction>,
    /// Deletions already handed out; repeats are dropped until the next cleanup.
    delivered_deletes: HashSet<PathBuf>,
    span: Span,
}

impl DebounceQueue {
    pub fn new(delay: Duration, span: Span) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
            delivered_deletes: HashSet::new(),
            span,
        }
    }

    /// Queue `kind` for `path`. Returns false when the event was dropped.
    pub fn enqueue(&mut self, path: impl Into<PathBuf>, kind: ChangeKind, now: Instant) -> bool {
        let _guard = self.span.enter();
        let path = path.into();

        match kind {
            ChangeKind::Deleted => {
                if self.delivered_deletes.contains(&path) {
                    tracing::trace!(path = %path.display(), "deletion already delivered, dropped");
                    return false;
                }
            }
            ChangeKind::Modified => {
                if matches!(self.pending.get(&path), Some(p) if p.kind == ChangeKind::Deleted) {
                    tracing::trace!(path = %path.display(), "modification behind pending deletion, dropped");
                    return false;
                }
            }
            ChangeKind::Created | ChangeKind::Moved => {
                self.delivered_deletes.remove(&path);
            }
        }

        let due_at = match kind {
            ChangeKind::Deleted => now,
            _ => now + self.delay,
        };
        tracing::trace!(path = %path.display(), kind = %kind, "queued");
        self.pending.insert(path.clone(), PendingAction { path, kind, due_at });
        true
    }

    pub fn enqueue_event(&mut self, event: ChangeEvent) -> bool {
        self.enqueue(event.path, event.kind, event.observed_at)
    }

    /// Remove and return every action due at `now`, deletions first.
    pub fn drain_due(&mut self, now: Instant) -> Vec<PendingAction> {
        let due: Vec<PathBuf> = self
            .pending
            .values()
            .filter(|action| action.due_at <= now)
            .map(|action| action.path.clone())
            .collect();

        let mut actions: Vec<PendingAction> = due
            .into_iter()
            .filter_map(|path| self.pending.remove(&path))
            .collect();
        for action in &actions {
            if action.kind == ChangeKind::Deleted {
                self.delivered_deletes.insert(action.path.clone());
            }
        }
        actions.sort_by(|x, y| {
            (x.kind != ChangeKind::Deleted, &x.path).cmp(&(y.kind != ChangeKind::Deleted, &y.path))
        });
        actions
    }

    /// Forget delivered deletions. Called on the periodic cleanup cycle.
    pub fn cleanup(&mut self) {
        let _guard = self.span.enter();
        if !self.delivered_deletes.is_empty() {
            tracing::debug!(
                cleared = self.delivered_deletes.len(),
                "cleared delivered deletions"
            );
        }
        self.delivered_deletes.clear();
    }

    pub fn pending(&self, path: &Path) -> Option<&PendingAction> {
        self.pending.get(path)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
