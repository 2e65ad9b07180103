//! The watch loop.
//!
//! ```text
//! start_blocking ──► tokio runtime + ctrl-c task ──► run(config, options, stop)
//!   poll trees ─┐
//!   drain hints ┴► DebounceQueue ──► SyncEngine::handle ──► sleep(loop_interval)
//! ```
//!
//! Everything runs on one task; the stop flag is checked once per cycle.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nbsync_core::{SyncConfig, Tree};
use nbsync_engine::{
    ensure_root, ChangeDetector, ChangeEvent, DebounceQueue, SyncEngine, SyncOutcome, TreeScanner,
};

use crate::error::{io_err, DaemonError};
use crate::hints::NativeHints;

/// Knobs the command line sets on top of the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Run the initial reconciliation before watching.
    pub initial_sync: bool,
}

impl RunOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            dry_run: false,
            initial_sync: config.sync_on_start,
        }
    }
}

/// Totals over the lifetime of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub propagated: usize,
    pub deleted: usize,
    pub suppressed: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Propagated { .. } | SyncOutcome::WouldPropagate { .. } => {
                self.propagated += 1
            }
            SyncOutcome::Deleted { .. } | SyncOutcome::WouldDelete { .. } => self.deleted += 1,
            SyncOutcome::Suppressed { .. } => self.suppressed += 1,
            SyncOutcome::Failed { .. } => self.failed += 1,
            SyncOutcome::Skipped { .. } | SyncOutcome::Retained { .. } => {}
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. Logs go to
/// stderr so stdout stays free for reports.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the watch loop on a fresh runtime until Ctrl-C.
pub fn start_blocking(config: SyncConfig, options: RunOptions) -> Result<RunSummary, DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(async move {
        let stop = Arc::new(AtomicBool::new(false));
        let signal_stop = stop.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("received ctrl-c, shutting down");
                    signal_stop.store(true, Ordering::SeqCst);
                }
                Err(err) => tracing::warn!(error = %err, "ctrl-c handler unavailable"),
            }
        });
        run(config, options, stop).await
    })
}

/// Run the watch loop until `stop` is set.
///
/// Startup: check or create both roots (a root that is a file is fatal),
/// optionally reconcile, prime the detector, start native hints. Each cycle
/// then polls when due, drains hints, fires due actions, sweeps the echo
/// guard, runs the periodic cleanup, and sleeps `loop_interval`.
pub async fn run(
    config: SyncConfig,
    options: RunOptions,
    stop: Arc<AtomicBool>,
) -> Result<RunSummary, DaemonError> {
    config.validate()?;
    let config = resolve_roots(config, !options.dry_run)?;

    let engine_span = tracing::info_span!("engine");
    let mut engine =
        SyncEngine::from_config(&config, engine_span.clone())?.with_dry_run(options.dry_run);
    let mut summary = RunSummary::default();

    if options.initial_sync {
        let report = engine.initial_sync(Instant::now());
        for outcome in &report.outcomes {
            summary.record(outcome);
        }
        tracing::info!(
            propagated = report.propagated(),
            deleted = report.deleted(),
            failed = report.failed(),
            "initial sync complete"
        );
    }

    let scanner = TreeScanner::new(
        engine.classifier().clone(),
        tracing::debug_span!(parent: &engine_span, "scanner"),
    );
    let mut detector = ChangeDetector::new(scanner, tracing::info_span!("detector"));
    detector.prime();
    let mut queue = DebounceQueue::new(config.debounce_delay(), tracing::info_span!("debounce"));

    let mut hints = if config.native_events {
        let roots = [
            engine.classifier().root(Tree::A),
            engine.classifier().root(Tree::B),
        ];
        match NativeHints::start(&roots) {
            Ok(hints) => Some(hints),
            Err(err) => {
                tracing::warn!(error = %err, "native events unavailable, polling only");
                None
            }
        }
    } else {
        None
    };

    tracing::info!(
        source = %config.source_dir.display(),
        target = %config.target_dir.display(),
        dry_run = options.dry_run,
        "watching"
    );

    let poll_interval = config.poll_interval();
    let cleanup_interval = config.cleanup_interval();
    let loop_interval = config.loop_interval().max(Duration::from_millis(10));
    let started = Instant::now();
    let mut next_poll = started;
    let mut next_cleanup = started + cleanup_interval;

    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        summary.cycles += 1;

        if now >= next_poll {
            for event in detector.poll(now) {
                enqueue(&mut queue, &engine, event);
            }
            next_poll = now + poll_interval;
        }
        if let Some(hints) = hints.as_mut() {
            for event in hints.drain(now) {
                enqueue(&mut queue, &engine, event);
            }
        }

        for action in queue.drain_due(now) {
            let outcome = engine.handle(&action, now);
            summary.record(&outcome);
        }

        engine.sweep_echoes(now);
        if now >= next_cleanup {
            queue.cleanup();
            next_cleanup = now + cleanup_interval;
        }

        tokio::time::sleep(loop_interval).await;
    }

    drop(hints.take());
    tracing::info!(
        cycles = summary.cycles,
        propagated = summary.propagated,
        deleted = summary.deleted,
        failed = summary.failed,
        "stopped"
    );
    Ok(summary)
}

/// Queue only events for tracked paths.
fn enqueue(queue: &mut DebounceQueue, engine: &SyncEngine, event: ChangeEvent) {
    if engine.classifier().classify(&event.path).is_some() {
        queue.enqueue_event(event);
    }
}

/// Ensure both roots and make them absolute, so native event paths and
/// classifier roots compare equal.
fn resolve_roots(mut config: SyncConfig, create: bool) -> Result<SyncConfig, DaemonError> {
    config.source_dir = resolve_root(&config.source_dir, create)?;
    config.target_dir = resolve_root(&config.target_dir, create)?;
    Ok(config)
}

fn resolve_root(root: &Path, create: bool) -> Result<PathBuf, DaemonError> {
    ensure_root(root, create)?;
    if !root.exists() {
        return Ok(root.to_path_buf());
    }
    std::fs::canonicalize(root).map_err(|e| io_err(root, e))
}
