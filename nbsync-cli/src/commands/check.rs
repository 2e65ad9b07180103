//! `nbsync check [--json]`: reconcile without writing.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use nbsync_core::Tree;
use nbsync_engine::{reconciler::relative_to, PathClassifier, ReconciliationPlan, SyncEngine};

use crate::GlobalArgs;

/// Report what a sync would do.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Emit machine-readable JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    source_dir: String,
    target_dir: String,
    summary: CheckSummary,
    actions: Vec<CheckAction>,
}

#[derive(Debug, Serialize)]
struct CheckSummary {
    forward: usize,
    reverse: usize,
    orphans: usize,
    in_sync: bool,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct CheckAction {
    #[tabled(rename = "ACTION")]
    action: &'static str,
    #[tabled(rename = "SOURCE")]
    source: String,
    #[tabled(rename = "TARGET")]
    target: String,
}

impl CheckArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = super::prepare(global)?;
        let engine = SyncEngine::from_config(&config, tracing::info_span!("check"))
            .context("failed to build sync engine")?
            .with_dry_run(true);
        engine.ensure_roots().context("tree roots are unusable")?;

        let plan = engine.reconcile();
        let report = build_report(&plan, engine.classifier());
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize check JSON")?
            );
        } else {
            print_table(report);
        }
        Ok(())
    }
}

fn build_report(plan: &ReconciliationPlan, classifier: &PathClassifier) -> CheckReport {
    let a_root = classifier.root(Tree::A);
    let b_root = classifier.root(Tree::B);
    let show = |path: &Path, root: &Path| relative_to(path, root).display().to_string();

    let mut actions = Vec::with_capacity(plan.action_count());
    for pair in &plan.forward {
        actions.push(CheckAction {
            action: "forward",
            source: show(&pair.source, a_root),
            target: show(&pair.target, b_root),
        });
    }
    for pair in &plan.reverse {
        actions.push(CheckAction {
            action: "reverse",
            source: show(&pair.source, b_root),
            target: show(&pair.target, a_root),
        });
    }
    for orphan in &plan.orphans_a {
        actions.push(CheckAction {
            action: "orphan",
            source: show(orphan, a_root),
            target: String::new(),
        });
    }
    for orphan in &plan.orphans_b {
        actions.push(CheckAction {
            action: "orphan",
            source: show(orphan, b_root),
            target: String::new(),
        });
    }

    CheckReport {
        source_dir: a_root.display().to_string(),
        target_dir: b_root.display().to_string(),
        summary: CheckSummary {
            forward: plan.forward.len(),
            reverse: plan.reverse.len(),
            orphans: plan.orphans_a.len() + plan.orphans_b.len(),
            in_sync: plan.is_empty(),
        },
        actions,
    }
}

fn print_table(report: CheckReport) {
    println!(
        "nbsync v{} | {} ⇄ {}",
        env!("CARGO_PKG_VERSION"),
        report.source_dir,
        report.target_dir,
    );
    if report.summary.in_sync {
        println!("{} both trees are in sync", "✓".green().bold());
        return;
    }

    println!(
        "{} forward  {} reverse  {} orphans",
        report.summary.forward.to_string().green().bold(),
        report.summary.reverse.to_string().yellow().bold(),
        report.summary.orphans.to_string().magenta().bold(),
    );
    let mut table = Table::new(report.actions);
    table.with(Style::rounded());
    println!("{table}");
    println!("Run 'nbsync sync' to apply.");
}
