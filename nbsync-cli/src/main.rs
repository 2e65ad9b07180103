//! nbsync: keep a tree of Markdown notes and a tree of notebooks in sync.
//!
//! # Usage
//!
//! ```text
//! nbsync [--config PATH] [--source-dir DIR] [--target-dir DIR] [-d|-q] init [--force]
//! nbsync check [--json]
//! nbsync sync [--dry-run]
//! nbsync watch [--dry-run]        (default)
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use commands::{check::CheckArgs, init::InitArgs, sync::SyncArgs, watch::WatchArgs};
use nbsync_core::SyncConfig;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "nbsync",
    version,
    about = "Bidirectional sync between Markdown notes and Jupyter notebooks",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file.
    Init(InitArgs),

    /// Scan both trees and report what a sync would do. Never writes.
    Check(CheckArgs),

    /// Reconcile both trees once and exit.
    Sync(SyncArgs),

    /// Reconcile, then keep both trees in sync until Ctrl-C.
    Watch(WatchArgs),
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: ./nbsync.yaml, then the user config dir).
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the Markdown tree root.
    #[arg(long, global = true, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Override the notebook tree root.
    #[arg(long, global = true, value_name = "DIR")]
    pub target_dir: Option<PathBuf>,

    /// Verbose logging.
    #[arg(long, short = 'd', global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Warnings and errors only.
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(SyncConfig::discover)
    }

    /// Load the config and apply the directory overrides.
    pub fn load_config(&self) -> Result<SyncConfig> {
        let path = self.config_path();
        let mut config = SyncConfig::load_at(&path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?;
        if let Some(dir) = &self.source_dir {
            config.source_dir = dir.clone();
        }
        if let Some(dir) = &self.target_dir {
            config.target_dir = dir.clone();
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Flags win over the config's `log_level`.
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "warn"
        } else if configured.trim().is_empty() {
            "info"
        } else {
            configured
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let global = cli.global;
    match cli.command {
        Some(Commands::Init(args)) => args.run(&global),
        Some(Commands::Check(args)) => args.run(&global),
        Some(Commands::Sync(args)) => args.run(&global),
        Some(Commands::Watch(args)) => args.run(&global),
        None => WatchArgs::default().run(&global),
    }
}
