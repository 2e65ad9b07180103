//! # nbsync-engine
//!
//! Change detection, reconciliation, and propagation between tree A (text
//! documents) and tree B (notebooks).
//!
//! Data flow:
//!
//! ```text
//! TreeScanner ──► reconcile() ──► SyncEngine::execute_plan      (startup)
//! ChangeDetector ─┐
//! native hints ───┴► DebounceQueue ──► SyncEngine::handle       (steady state)
//! ```

pub mod classifier;
pub mod debounce;
pub mod detector;
pub mod echo;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod scanner;
pub mod writer;

pub use classifier::PathClassifier;
pub use debounce::{DebounceQueue, PendingAction};
pub use detector::{diff_snapshots, ChangeDetector, ChangeEvent, ChangeKind};
pub use echo::EchoGuard;
pub use engine::{ensure_root, ExecutionReport, SkipReason, SyncEngine, SyncOutcome};
pub use error::SyncError;
pub use reconciler::{reconcile, ReconciliationPlan, SyncPair};
pub use scanner::{FileStamp, TreeScanner, TreeSnapshot};
pub use writer::WriteResult;
