//! `nbsync watch`: the long-running sync loop. Default command.

use anyhow::{Context, Result};
use clap::Args;

use nbsync_daemon::RunOptions;

use crate::GlobalArgs;

/// Arguments for `nbsync watch`.
#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Log what would be written without touching either tree.
    #[arg(long)]
    pub dry_run: bool,
}

impl WatchArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = super::prepare(global)?;
        let options = RunOptions {
            dry_run: self.dry_run,
            ..RunOptions::from_config(&config)
        };
        let summary = nbsync_daemon::start_blocking(config, options).context("watch failed")?;
        tracing::debug!(?summary, "watch finished");
        Ok(())
    }
}
