//! Domain types shared by every nbsync crate.
//!
//! Tree A holds text documents (Markdown), tree B holds structured notebook
//! documents. Nothing in the engine is specific to those formats beyond the
//! configured extension sets, so the types here speak of A and B only.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Trees and directions
// ---------------------------------------------------------------------------

/// One of the two mirrored directory trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tree {
    /// Text documents.
    A,
    /// Structured notebook documents.
    B,
}

impl Tree {
    /// The opposite tree.
    pub fn other(self) -> Tree {
        match self {
            Tree::A => Tree::B,
            Tree::B => Tree::A,
        }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tree::A => write!(f, "A"),
            Tree::B => write!(f, "B"),
        }
    }
}

/// Direction of a single propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// A → B (text converted to a notebook).
    Forward,
    /// B → A (notebook rendered back to text).
    Reverse,
}

impl Direction {
    /// Direction of a propagation whose source lives in `tree`.
    pub fn from_source(tree: Tree) -> Direction {
        match tree {
            Tree::A => Direction::Forward,
            Tree::B => Direction::Reverse,
        }
    }

    pub fn source_tree(self) -> Tree {
        match self {
            Direction::Forward => Tree::A,
            Direction::Reverse => Tree::B,
        }
    }

    pub fn target_tree(self) -> Tree {
        self.source_tree().other()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "A → B"),
            Direction::Reverse => write!(f, "B → A"),
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict policy
// ---------------------------------------------------------------------------

/// How to pick a winner when both copies exist and their timestamps are
/// further apart than the proximity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// The copy with the larger modification time wins.
    #[default]
    Newer,
    /// Tree A always wins.
    #[serde(alias = "md")]
    ForceA,
    /// Tree B always wins.
    #[serde(alias = "ipynb")]
    ForceB,
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictResolution::Newer => write!(f, "newer"),
            ConflictResolution::ForceA => write!(f, "force_a"),
            ConflictResolution::ForceB => write!(f, "force_b"),
        }
    }
}

/// The subset of configuration that drives sync decisions.
///
/// Shared verbatim by the reconciler (startup pass) and the engine (live
/// events) so both make the same call for the same pair of timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    pub conflict_resolution: ConflictResolution,
    /// Timestamps closer than this are "the same moment".
    pub proximity_threshold: Duration,
    pub delete_orphaned: bool,
    /// When false only A → B propagation ever happens.
    pub bidirectional: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::Newer,
            proximity_threshold: Duration::from_secs(3),
            delete_orphaned: true,
            bidirectional: true,
        }
    }
}

impl SyncPolicy {
    /// Decide which direction (if any) a mirrored pair should propagate in.
    ///
    /// `a_modified` / `b_modified` are the copies' modification times as
    /// durations since the Unix epoch. Returns `None` when the copies are
    /// within the proximity threshold, or when the winner would be tree B
    /// and the policy is one-way.
    pub fn resolve(&self, a_modified: Duration, b_modified: Duration) -> Option<Direction> {
        let delta = if a_modified > b_modified {
            a_modified - b_modified
        } else {
            b_modified - a_modified
        };
        if delta < self.proximity_threshold {
            return None;
        }

        let direction = match self.conflict_resolution {
            ConflictResolution::ForceA => Direction::Forward,
            ConflictResolution::ForceB => Direction::Reverse,
            ConflictResolution::Newer if a_modified > b_modified => Direction::Forward,
            ConflictResolution::Newer => Direction::Reverse,
        };

        if direction == Direction::Reverse && !self.bidirectional {
            return None;
        }
        Some(direction)
    }

    /// Whether changes originating in `tree` may propagate at all.
    pub fn propagates_from(&self, tree: Tree) -> bool {
        tree == Tree::A || self.bidirectional
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn tree_other_flips() {
        assert_eq!(Tree::A.other(), Tree::B);
        assert_eq!(Tree::B.other(), Tree::A);
    }

    #[test]
    fn direction_trees_are_consistent() {
        assert_eq!(Direction::from_source(Tree::A), Direction::Forward);
        assert_eq!(Direction::Reverse.source_tree(), Tree::B);
        assert_eq!(Direction::Reverse.target_tree(), Tree::A);
    }

    #[test]
    fn within_threshold_never_syncs() {
        let policy = SyncPolicy {
            proximity_threshold: secs(5),
            ..SyncPolicy::default()
        };
        assert_eq!(policy.resolve(secs(100), secs(101)), None);
        assert_eq!(policy.resolve(secs(101), secs(100)), None);
        assert_eq!(policy.resolve(secs(100), secs(100)), None);
    }

    #[test]
    fn newer_side_wins_outside_threshold() {
        let policy = SyncPolicy {
            proximity_threshold: secs(5),
            ..SyncPolicy::default()
        };
        assert_eq!(policy.resolve(secs(100), secs(110)), Some(Direction::Reverse));
        assert_eq!(policy.resolve(secs(110), secs(100)), Some(Direction::Forward));
        // Exactly at the threshold counts as distinct.
        assert_eq!(policy.resolve(secs(105), secs(100)), Some(Direction::Forward));
    }

    #[test]
    fn forced_side_wins_regardless_of_age() {
        let force_a = SyncPolicy {
            conflict_resolution: ConflictResolution::ForceA,
            ..SyncPolicy::default()
        };
        assert_eq!(force_a.resolve(secs(0), secs(60)), Some(Direction::Forward));

        let force_b = SyncPolicy {
            conflict_resolution: ConflictResolution::ForceB,
            ..SyncPolicy::default()
        };
        assert_eq!(force_b.resolve(secs(60), secs(0)), Some(Direction::Reverse));
    }

    #[test]
    fn one_way_policy_never_resolves_reverse() {
        let policy = SyncPolicy {
            bidirectional: false,
            ..SyncPolicy::default()
        };
        assert_eq!(policy.resolve(secs(0), secs(60)), None);
        assert_eq!(policy.resolve(secs(60), secs(0)), Some(Direction::Forward));
        assert!(policy.propagates_from(Tree::A));
        assert!(!policy.propagates_from(Tree::B));
    }

    #[test]
    fn conflict_resolution_accepts_legacy_labels() {
        let md: ConflictResolution = serde_yaml::from_str("md").expect("md");
        let ipynb: ConflictResolution = serde_yaml::from_str("ipynb").expect("ipynb");
        let newer: ConflictResolution = serde_yaml::from_str("newer").expect("newer");
        assert_eq!(md, ConflictResolution::ForceA);
        assert_eq!(ipynb, ConflictResolution::ForceB);
        assert_eq!(newer, ConflictResolution::Newer);
    }
}
