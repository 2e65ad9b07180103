//! `nbsync init [--force]`

use anyhow::{bail, Context, Result};
use clap::Args;

use nbsync_core::SyncConfig;

use crate::GlobalArgs;

/// Write a default config file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let path = global
            .config
            .clone()
            .unwrap_or_else(SyncConfig::default_path);
        if path.exists() && !self.force {
            bail!(
                "config '{}' already exists; pass --force to overwrite",
                path.display()
            );
        }

        let mut config = SyncConfig::default();
        if let Some(dir) = &global.source_dir {
            config.source_dir = dir.clone();
        }
        if let Some(dir) = &global.target_dir {
            config.target_dir = dir.clone();
        }
        config
            .save_at(&path)
            .with_context(|| format!("failed to write config '{}'", path.display()))?;

        println!("✓ Wrote {}", path.display());
        println!(
            "  {} (.md) ⇄ {} (.ipynb)",
            config.source_dir.display(),
            config.target_dir.display()
        );
        Ok(())
    }
}
