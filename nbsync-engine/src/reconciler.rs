//! Snapshot reconciliation: what must move where to make two trees agree.

use std::path::{Path, PathBuf};

use serde::Serialize;

use nbsync_core::{Direction, SyncPolicy, Tree};

use crate::classifier::PathClassifier;
use crate::scanner::TreeSnapshot;

/// One propagation: `source` is converted and written to `target`.
/// Both paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPair {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Result of a single reconciliation pass. Built, executed, discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    /// A → B propagations.
    pub forward: Vec<SyncPair>,
    /// B → A propagations.
    pub reverse: Vec<SyncPair>,
    /// Files in A with no mirror and no scheduled propagation.
    pub orphans_a: Vec<PathBuf>,
    /// Files in B with no mirror and no scheduled propagation.
    pub orphans_b: Vec<PathBuf>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
            && self.reverse.is_empty()
            && self.orphans_a.is_empty()
            && self.orphans_b.is_empty()
    }

    pub fn action_count(&self) -> usize {
        self.forward.len() + self.reverse.len() + self.orphans_a.len() + self.orphans_b.len()
    }

    fn schedule(&mut self, direction: Direction, source: PathBuf, target: PathBuf) {
        let pair = SyncPair { source, target };
        match direction {
            Direction::Forward => self.forward.push(pair),
            Direction::Reverse => self.reverse.push(pair),
        }
    }

    fn orphan(&mut self, tree: Tree, path: PathBuf) {
        match tree {
            Tree::A => self.orphans_a.push(path),
            Tree::B => self.orphans_b.push(path),
        }
    }
}

/// Diff the two snapshots into a plan.
///
/// Mirrored pairs closer than the proximity threshold are left alone; pairs
/// further apart go to whichever side `policy` picks. Unmirrored files are
/// propagated when their tree may propagate, otherwise they are orphans
/// (reported only when `policy.delete_orphaned` is set).
pub fn reconcile(
    a: &TreeSnapshot,
    b: &TreeSnapshot,
    classifier: &PathClassifier,
    policy: &SyncPolicy,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    for (relative, stamp_a) in a.iter() {
        let candidates = classifier.mirror_candidates(relative, Tree::A);
        if candidates.is_empty() {
            tracing::warn!(path = %relative.display(), "cannot map path to tree B, skipping");
            continue;
        }
        let mirrored = candidates
            .iter()
            .find_map(|candidate| b.get(candidate).map(|stamp| (candidate, stamp)));
        let source = classifier.root(Tree::A).join(relative);
        match mirrored {
            Some((candidate, stamp_b)) => {
                let target = classifier.root(Tree::B).join(candidate);
                match policy.resolve(stamp_a.modified, stamp_b.modified) {
                    Some(Direction::Forward) => plan.schedule(Direction::Forward, source, target),
                    Some(Direction::Reverse) => plan.schedule(Direction::Reverse, target, source),
                    None => {}
                }
            }
            None => {
                let target = classifier.root(Tree::B).join(&candidates[0]);
                unmatched(&mut plan, Tree::A, source, target, policy);
            }
        }
    }

    for (relative, _) in b.iter() {
        let candidates = classifier.mirror_candidates(relative, Tree::B);
        if candidates.is_empty() {
            tracing::warn!(path = %relative.display(), "cannot map path to tree A, skipping");
            continue;
        }
        if candidates.iter().any(|candidate| a.contains(candidate)) {
            continue;
        }
        let source = classifier.root(Tree::B).join(relative);
        let target = classifier.root(Tree::A).join(&candidates[0]);
        unmatched(&mut plan, Tree::B, source, target, policy);
    }

    plan
}

fn unmatched(
    plan: &mut ReconciliationPlan,
    tree: Tree,
    source: PathBuf,
    target: PathBuf,
    policy: &SyncPolicy,
) {
    if policy.propagates_from(tree) {
        plan.schedule(Direction::from_source(tree), source, target);
    } else if policy.delete_orphaned {
        plan.orphan(tree, source);
    }
}

/// Relative display of a planned path, for reports.
pub fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
