//! The sync decision core.
//!
//! [`SyncEngine`] turns one debounced action into at most one filesystem
//! write or delete. Every per-path failure is returned as
//! [`SyncOutcome::Failed`] and logged; nothing here aborts the caller except
//! [`SyncEngine::ensure_roots`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::Span;

use nbsync_convert::{Converter, MarkdownConverter, Notebook};
use nbsync_core::{Direction, SyncConfig, SyncPolicy, Tree};

use crate::classifier::PathClassifier;
use crate::debounce::PendingAction;
use crate::detector::ChangeKind;
use crate::echo::EchoGuard;
use crate::error::{io_err, SyncError};
use crate::reconciler::{reconcile, ReconciliationPlan};
use crate::scanner::{FileStamp, TreeScanner};
use crate::writer::{remove_mirror, write_mirror, WriteResult};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Propagated {
        source: PathBuf,
        target: PathBuf,
        direction: Direction,
    },
    /// Dry-run: the propagation would have happened.
    WouldPropagate {
        source: PathBuf,
        target: PathBuf,
        direction: Direction,
    },
    Skipped { path: PathBuf, reason: SkipReason },
    /// The event was the echo of an engine write.
    Suppressed { path: PathBuf },
    Deleted { path: PathBuf },
    WouldDelete { path: PathBuf },
    /// A mirror was kept because orphan deletion is disabled.
    Retained { path: PathBuf },
    Failed {
        source: PathBuf,
        target: PathBuf,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Untracked,
    OneWay,
    InSync,
    MirrorWins,
    SourceMissing,
    SourceExists,
    NoMirror,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Untracked => "not part of either tree",
            SkipReason::OneWay => "one-way mode ignores tree B changes",
            SkipReason::InSync => "timestamps within proximity threshold",
            SkipReason::MirrorWins => "conflict policy keeps the mirror",
            SkipReason::SourceMissing => "source no longer exists",
            SkipReason::SourceExists => "source exists again",
            SkipReason::NoMirror => "no mirror to delete",
        };
        f.write_str(text)
    }
}

/// Aggregated outcomes of a plan execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub outcomes: Vec<SyncOutcome>,
}

impl ExecutionReport {
    pub fn propagated(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                SyncOutcome::Propagated { .. } | SyncOutcome::WouldPropagate { .. }
            )
        })
    }

    pub fn deleted(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Deleted { .. } | SyncOutcome::WouldDelete { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SyncEngine {
    classifier: PathClassifier,
    scanner: TreeScanner,
    policy: SyncPolicy,
    converter: Box<dyn Converter>,
    echo: EchoGuard,
    dry_run: bool,
    span: Span,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("classifier", &self.classifier)
            .field("policy", &self.policy)
            .field("echo", &self.echo)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        classifier: PathClassifier,
        policy: SyncPolicy,
        converter: Box<dyn Converter>,
        echo: EchoGuard,
        span: Span,
    ) -> Self {
        let scanner = TreeScanner::new(
            classifier.clone(),
            tracing::debug_span!(parent: &span, "scanner"),
        );
        Self {
            classifier,
            scanner,
            policy,
            converter,
            echo,
            dry_run: false,
            span,
        }
    }

    /// Engine with the Markdown converter, configured from `config`.
    pub fn from_config(config: &SyncConfig, span: Span) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self::new(
            PathClassifier::from_config(config)?,
            config.policy(),
            Box::new(MarkdownConverter::from_config(config)?),
            EchoGuard::new(config.echo_window()),
            span,
        ))
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    pub fn scanner(&self) -> &TreeScanner {
        &self.scanner
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Create missing roots; fail when a root exists but is not a directory.
    /// Dry-run only checks.
    pub fn ensure_roots(&self) -> Result<(), SyncError> {
        let _guard = self.span.enter();
        for tree in [Tree::A, Tree::B] {
            ensure_root(self.classifier.root(tree), !self.dry_run)?;
        }
        Ok(())
    }

    /// Scan both trees and compute the reconciliation plan. No writes.
    pub fn reconcile(&self) -> ReconciliationPlan {
        let a = self.scanner.scan(Tree::A);
        let b = self.scanner.scan(Tree::B);
        reconcile(&a, &b, &self.classifier, &self.policy)
    }

    /// Reconcile and execute the plan.
    pub fn initial_sync(&mut self, now: Instant) -> ExecutionReport {
        let plan = self.reconcile();
        {
            let _guard = self.span.enter();
            tracing::info!(
                forward = plan.forward.len(),
                reverse = plan.reverse.len(),
                orphans_a = plan.orphans_a.len(),
                orphans_b = plan.orphans_b.len(),
                "initial reconciliation"
            );
        }
        self.execute_plan(&plan, now)
    }

    /// Execute every action of `plan`, isolating failures.
    pub fn execute_plan(&mut self, plan: &ReconciliationPlan, now: Instant) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        for pair in &plan.forward {
            report
                .outcomes
                .push(self.propagate(&pair.source, &pair.target, Direction::Forward, now));
        }
        for pair in &plan.reverse {
            report
                .outcomes
                .push(self.propagate(&pair.source, &pair.target, Direction::Reverse, now));
        }
        for orphan in plan.orphans_a.iter().chain(&plan.orphans_b) {
            report.outcomes.push(self.delete_orphan(orphan, now));
        }
        report
    }

    /// Handle one debounced action.
    pub fn handle(&mut self, action: &PendingAction, now: Instant) -> SyncOutcome {
        self.handle_change(&action.path, action.kind, now)
    }

    pub fn handle_change(&mut self, path: &Path, kind: ChangeKind, now: Instant) -> SyncOutcome {
        let span = self.span.clone();
        let _guard = span.enter();

        let Some(tree) = self.classifier.classify(path) else {
            return skipped(path, SkipReason::Untracked);
        };
        if !self.policy.propagates_from(tree) {
            tracing::debug!(path = %path.display(), "one-way mode, ignoring tree B change");
            return skipped(path, SkipReason::OneWay);
        }

        match kind {
            // Deletion echoes resolve to SourceExists or NoMirror on their own.
            ChangeKind::Deleted => self.handle_deletion(path, tree, now),
            ChangeKind::Created | ChangeKind::Modified | ChangeKind::Moved => {
                if self.echo.is_echo(path, now) {
                    tracing::debug!(path = %path.display(), kind = %kind, "suppressed echo of own write");
                    return SyncOutcome::Suppressed {
                        path: path.to_path_buf(),
                    };
                }
                self.sync_if_needed(path, tree, now)
            }
        }
    }

    /// `path` (in `tree`) was deleted: delete or retain its mirror.
    pub fn handle_deletion(&mut self, path: &Path, tree: Tree, now: Instant) -> SyncOutcome {
        if path.exists() {
            return skipped(path, SkipReason::SourceExists);
        }
        let mirror = match self.classifier.existing_mirror(path, tree) {
            Some(mirror) if mirror.exists() => mirror,
            _ => return skipped(path, SkipReason::NoMirror),
        };
        if !self.policy.delete_orphaned {
            tracing::info!(
                source = %path.display(),
                mirror = %mirror.display(),
                "source deleted, mirror retained (delete_orphaned is off)"
            );
            return SyncOutcome::Retained { path: mirror };
        }
        self.remove(path, &mirror, now)
    }

    /// `path` (in `tree`) was created or modified: propagate if the policy says so.
    pub fn sync_if_needed(&mut self, path: &Path, tree: Tree, now: Instant) -> SyncOutcome {
        let Some(source_stamp) = FileStamp::read(path) else {
            return skipped(path, SkipReason::SourceMissing);
        };
        let Some(target) = self.classifier.existing_mirror(path, tree) else {
            return skipped(path, SkipReason::Untracked);
        };
        let direction = Direction::from_source(tree);

        let Some(target_stamp) = FileStamp::read(&target) else {
            return self.propagate(path, &target, direction, now);
        };
        let (a, b) = match tree {
            Tree::A => (source_stamp, target_stamp),
            Tree::B => (target_stamp, source_stamp),
        };
        match self.policy.resolve(a.modified, b.modified) {
            Some(resolved) if resolved == direction => self.propagate(path, &target, direction, now),
            Some(_) => {
                tracing::debug!(
                    source = %path.display(),
                    target = %target.display(),
                    policy = %self.policy.conflict_resolution,
                    "mirror kept by conflict policy"
                );
                skipped(path, SkipReason::MirrorWins)
            }
            None => skipped(path, SkipReason::InSync),
        }
    }

    /// Convert `source` and write it to `target`.
    pub fn propagate(
        &mut self,
        source: &Path,
        target: &Path,
        direction: Direction,
        now: Instant,
    ) -> SyncOutcome {
        let span = self.span.clone();
        let _guard = span.enter();

        let content = match self.convert(source, direction) {
            Ok(content) => content,
            Err(err) => return self.failed(source, target, err),
        };
        if !self.dry_run {
            self.echo.record(target, now);
        }
        match write_mirror(target, &content, source, self.dry_run) {
            Ok(WriteResult::Written { .. }) => {
                tracing::info!(
                    source = %source.display(),
                    target = %target.display(),
                    direction = %direction,
                    "propagated"
                );
                SyncOutcome::Propagated {
                    source: source.to_path_buf(),
                    target: target.to_path_buf(),
                    direction,
                }
            }
            Ok(WriteResult::WouldWrite { .. }) => SyncOutcome::WouldPropagate {
                source: source.to_path_buf(),
                target: target.to_path_buf(),
                direction,
            },
            Err(err) => self.failed(source, target, err),
        }
    }

    /// Drop expired echo-guard entries.
    pub fn sweep_echoes(&mut self, now: Instant) -> usize {
        self.echo.sweep(now)
    }

    pub fn echo_guard(&self) -> &EchoGuard {
        &self.echo
    }

    fn convert(&self, source: &Path, direction: Direction) -> Result<String, SyncError> {
        let raw = std::fs::read_to_string(source).map_err(|e| io_err(source, e))?;
        let content = match direction {
            Direction::Forward => self.converter.to_structured(&raw)?.to_json()?,
            Direction::Reverse => self.converter.to_text(&Notebook::parse(&raw)?)?,
        };
        Ok(content)
    }

    fn delete_orphan(&mut self, orphan: &Path, now: Instant) -> SyncOutcome {
        let span = self.span.clone();
        let _guard = span.enter();
        if !self.policy.delete_orphaned {
            tracing::info!(path = %orphan.display(), "orphan retained (delete_orphaned is off)");
            return SyncOutcome::Retained {
                path: orphan.to_path_buf(),
            };
        }
        tracing::info!(path = %orphan.display(), "orphan");
        self.remove(orphan, orphan, now)
    }

    fn remove(&mut self, cause: &Path, victim: &Path, now: Instant) -> SyncOutcome {
        if self.dry_run {
            tracing::info!(cause = %cause.display(), path = %victim.display(), "[dry-run] would delete");
            return SyncOutcome::WouldDelete {
                path: victim.to_path_buf(),
            };
        }
        self.echo.record(victim, now);
        match remove_mirror(victim, false) {
            Ok(_) => {
                tracing::info!(cause = %cause.display(), path = %victim.display(), "deleted");
                SyncOutcome::Deleted {
                    path: victim.to_path_buf(),
                }
            }
            Err(err) => self.failed(cause, victim, err),
        }
    }

    fn failed(&self, source: &Path, target: &Path, err: SyncError) -> SyncOutcome {
        tracing::error!(
            source = %source.display(),
            target = %target.display(),
            error = %err,
            "sync failed, will retry on next change"
        );
        SyncOutcome::Failed {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            error: err.to_string(),
        }
    }
}

/// Fail when `root` exists but is not a directory; create it when missing
/// and `create` is set.
pub fn ensure_root(root: &Path, create: bool) -> Result<(), SyncError> {
    if root.exists() {
        if !root.is_dir() {
            return Err(SyncError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
    } else if create {
        std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
        tracing::info!(root = %root.display(), "created tree root");
    }
    Ok(())
}

fn skipped(path: &Path, reason: SkipReason) -> SyncOutcome {
    tracing::trace!(path = %path.display(), reason = %reason, "skipped");
    SyncOutcome::Skipped {
        path: path.to_path_buf(),
        reason,
    }
}
