//! `nbsync sync`: reconcile both trees once and exit.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use nbsync_engine::{ExecutionReport, SyncEngine, SyncOutcome};

use crate::GlobalArgs;

/// Arguments for `nbsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Show what would be written without actually writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = super::prepare(global)?;
        let mut engine = SyncEngine::from_config(&config, tracing::info_span!("sync"))
            .context("failed to build sync engine")?
            .with_dry_run(self.dry_run);
        engine.ensure_roots().context("tree roots are unusable")?;

        let report = engine.initial_sync(Instant::now());
        print_results(&report, self.dry_run);
        Ok(())
    }
}

fn print_results(report: &ExecutionReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if report.outcomes.is_empty() {
        println!("{prefix}✓ nothing to do");
        return;
    }

    println!(
        "{prefix}✓ synced ({} propagated, {} deleted, {} failed)",
        report.propagated(),
        report.deleted(),
        report.failed()
    );
    for outcome in &report.outcomes {
        match outcome {
            SyncOutcome::Propagated {
                source,
                target,
                direction,
            } => println!("  ✎  {} → {} ({direction})", source.display(), target.display()),
            SyncOutcome::WouldPropagate {
                source,
                target,
                direction,
            } => println!("  ~  {} → {} ({direction})", source.display(), target.display()),
            SyncOutcome::Deleted { path } => println!("  ✗  {}", path.display()),
            SyncOutcome::WouldDelete { path } => println!("  ~  delete {}", path.display()),
            SyncOutcome::Retained { path } => println!("  ·  {}", path.display()),
            SyncOutcome::Failed {
                source,
                target,
                error,
            } => println!(
                "  {}  {} → {}: {error}",
                "!".red().bold(),
                source.display(),
                target.display()
            ),
            SyncOutcome::Skipped { .. } | SyncOutcome::Suppressed { .. } => {}
        }
    }
}
