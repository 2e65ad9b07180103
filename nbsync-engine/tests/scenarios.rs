use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use filetime::{set_file_mtime, FileTime};
use nbsync_core::{ConflictResolution, Direction, SyncConfig, Tree};
use nbsync_engine::{
    ChangeDetector, ChangeKind, DebounceQueue, SyncEngine, SyncOutcome, SyncPair, TreeScanner,
};
use tempfile::TempDir;
use tracing::Span;

struct Trees {
    _tmp: TempDir,
    a: PathBuf,
    b: PathBuf,
    config: SyncConfig,
}

fn trees(configure: impl FnOnce(&mut SyncConfig)) -> Trees {
    let tmp = TempDir::new().expect("tempdir");
    let a = tmp.path().join("notes");
    let b = tmp.path().join("notebooks");
    let mut config = SyncConfig {
        source_dir: a.clone(),
        target_dir: b.clone(),
        ..SyncConfig::default()
    };
    configure(&mut config);
    Trees {
        _tmp: tmp,
        a,
        b,
        config,
    }
}

fn engine(trees: &Trees) -> SyncEngine {
    let engine = SyncEngine::from_config(&trees.config, Span::none()).expect("engine");
    engine.ensure_roots().expect("roots");
    engine
}

fn write_at(path: &Path, content: &str, secs: i64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
    set_file_mtime(path, FileTime::from_unix_time(secs, 0)).expect("mtime");
}

fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&fs::metadata(path).expect("metadata"))
}

const T: i64 = 1_700_000_000;

// ---------------------------------------------------------------------------
// 1. Initial reconciliation
// ---------------------------------------------------------------------------

#[test]
fn single_text_file_is_forwarded_with_matching_mtime() {
    let trees = trees(|c| {
        c.conflict_resolution = ConflictResolution::Newer;
        c.delete_orphaned = true;
    });
    let mut engine = engine(&trees);
    let source = trees.a.join("notes.md");
    write_at(&source, "hello", T);

    let plan = engine.reconcile();
    assert_eq!(
        plan.forward,
        vec![SyncPair {
            source: source.clone(),
            target: trees.b.join("notes.ipynb"),
        }]
    );
    assert!(plan.reverse.is_empty());
    assert!(plan.orphans_a.is_empty() && plan.orphans_b.is_empty());

    let report = engine.execute_plan(&plan, Instant::now());
    assert_eq!(report.propagated(), 1);
    assert_eq!(report.failed(), 0);

    let target = trees.b.join("notes.ipynb");
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&target).expect("read")).expect("json");
    assert_eq!(json["cells"][0]["cell_type"], "markdown");
    assert_eq!(json["cells"][0]["source"][0], "hello");
    assert_eq!(mtime(&target), mtime(&source));
}

#[test]
fn second_reconciliation_is_empty() {
    let trees = trees(|_| {});
    let mut engine = engine(&trees);
    write_at(&trees.a.join("one.md"), "# One", T);
    write_at(&trees.a.join("deep/two.md"), "```python\nx = 1\n```", T - 100);
    write_at(&trees.b.join("three.ipynb"), "", T - 50);

    let first = engine.initial_sync(Instant::now());
    assert_eq!(first.propagated(), 3);
    assert!(trees.a.join("three.md").exists());

    assert!(engine.reconcile().is_empty());
}

#[test]
fn close_timestamps_produce_no_action() {
    let trees = trees(|c| c.proximity_threshold = 5.0);
    let engine = engine(&trees);
    write_at(&trees.a.join("n.md"), "a", T);
    write_at(&trees.b.join("n.ipynb"), "{}", T + 1);

    assert!(engine.reconcile().is_empty());
}

#[test]
fn newer_notebook_produces_one_reverse_action() {
    let trees = trees(|c| {
        c.proximity_threshold = 5.0;
        c.conflict_resolution = ConflictResolution::Newer;
    });
    let mut engine = engine(&trees);
    let md = trees.a.join("n.md");
    let nb = trees.b.join("n.ipynb");
    write_at(&md, "stale", T);
    write_at(
        &nb,
        r##"{"cells":[{"cell_type":"markdown","metadata":{},"source":["fresh"]}],"metadata":{},"nbformat":4,"nbformat_minor":4}"##,
        T + 10,
    );

    let plan = engine.reconcile();
    assert_eq!(plan.action_count(), 1);
    assert_eq!(plan.reverse.len(), 1);

    engine.execute_plan(&plan, Instant::now());
    assert_eq!(fs::read_to_string(&md).expect("read"), "fresh\n");
    assert_eq!(mtime(&md), mtime(&nb));
}

#[test]
fn one_way_mode_deletes_stray_notebooks() {
    let trees = trees(|c| c.bidirectional = false);
    let mut engine = engine(&trees);
    write_at(&trees.b.join("stray.ipynb"), "{}", T);

    let plan = engine.reconcile();
    assert_eq!(plan.orphans_b, vec![trees.b.join("stray.ipynb")]);

    let report = engine.execute_plan(&plan, Instant::now());
    assert_eq!(report.deleted(), 1);
    assert!(!trees.b.join("stray.ipynb").exists());
    assert!(!trees.a.join("stray.md").exists());
}

// ---------------------------------------------------------------------------
// 2. Live events
// ---------------------------------------------------------------------------

#[test]
fn deleting_source_deletes_mirror_when_enabled() {
    let trees = trees(|c| c.delete_orphaned = true);
    let mut engine = engine(&trees);
    let md = trees.a.join("gone.md");
    write_at(&md, "bye", T);
    engine.initial_sync(Instant::now());
    let nb = trees.b.join("gone.ipynb");
    assert!(nb.exists());

    fs::remove_file(&md).expect("rm");
    let outcome = engine.handle_change(&md, ChangeKind::Deleted, Instant::now());
    assert_eq!(outcome, SyncOutcome::Deleted { path: nb.clone() });
    assert!(!nb.exists());
}

#[test]
fn deleting_source_retains_mirror_when_disabled() {
    let trees = trees(|c| c.delete_orphaned = false);
    let mut engine = engine(&trees);
    let md = trees.a.join("kept.md");
    write_at(&md, "stay", T);
    engine.initial_sync(Instant::now());
    let nb = trees.b.join("kept.ipynb");

    fs::remove_file(&md).expect("rm");
    let outcome = engine.handle_change(&md, ChangeKind::Deleted, Instant::now());
    assert_eq!(outcome, SyncOutcome::Retained { path: nb.clone() });
    assert!(nb.exists());
}

#[test]
fn deleting_fresh_mirror_inside_echo_window_still_deletes() {
    let trees = trees(|c| {
        c.delete_orphaned = true;
        c.echo_window = 5.0;
    });
    let mut engine = engine(&trees);
    let nb = trees.b.join("x.ipynb");
    write_at(
        &nb,
        r##"{"cells":[{"cell_type":"markdown","metadata":{},"source":["x"]}],"metadata":{},"nbformat":4,"nbformat_minor":4}"##,
        T,
    );
    let t0 = Instant::now();
    assert_eq!(engine.initial_sync(t0).propagated(), 1);
    let md = trees.a.join("x.md");
    assert!(md.exists());

    fs::remove_file(&md).expect("rm");
    let outcome = engine.handle_change(&md, ChangeKind::Deleted, t0 + Duration::from_secs(1));
    assert_eq!(outcome, SyncOutcome::Deleted { path: nb.clone() });
    assert!(!nb.exists());
}

#[test]
fn engine_converges_without_oscillation() {
    let trees = trees(|_| {});
    let mut engine = engine(&trees);
    let scanner = TreeScanner::new(engine.classifier().clone(), Span::none());
    let mut detector = ChangeDetector::new(scanner, Span::none());
    let mut queue = DebounceQueue::new(Duration::from_millis(10), Span::none());
    detector.prime();

    write_at(&trees.a.join("x.md"), "hello", T);

    let start = Instant::now();
    let mut writes = 0;
    for cycle in 0..5u64 {
        let now = start + Duration::from_secs(cycle);
        for event in detector.poll(now) {
            queue.enqueue_event(event);
        }
        for action in queue.drain_due(now + Duration::from_millis(20)) {
            if let SyncOutcome::Propagated { direction, .. } = engine.handle(&action, now) {
                assert_eq!(direction, Direction::Forward);
                writes += 1;
            }
        }
        engine.sweep_echoes(now);
    }

    assert_eq!(writes, 1, "exactly one propagation expected");
    assert!(trees.b.join("x.ipynb").exists());
    assert!(engine.reconcile().is_empty());
    assert!(queue.is_empty());
    assert_eq!(detector.snapshot(Tree::B).len(), 1);
}

#[test]
fn echo_after_window_is_judged_by_timestamps() {
    let trees = trees(|c| c.echo_window = 1.0);
    let mut engine = engine(&trees);
    let md = trees.a.join("e.md");
    write_at(&md, "text", T);
    let t0 = Instant::now();
    engine.handle_change(&md, ChangeKind::Created, t0);

    let nb = trees.b.join("e.ipynb");
    assert!(matches!(
        engine.handle_change(&nb, ChangeKind::Modified, t0),
        SyncOutcome::Suppressed { .. }
    ));
    let later = t0 + Duration::from_secs(2);
    assert!(matches!(
        engine.handle_change(&nb, ChangeKind::Modified, later),
        SyncOutcome::Skipped { .. }
    ));
}
