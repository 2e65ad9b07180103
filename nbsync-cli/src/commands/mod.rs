pub mod check;
pub mod init;
pub mod sync;
pub mod watch;

use anyhow::Result;
use nbsync_core::SyncConfig;

use crate::GlobalArgs;

/// Load the config and install logging at the level it and the flags choose.
pub(crate) fn prepare(global: &GlobalArgs) -> Result<SyncConfig> {
    let config = global.load_config()?;
    nbsync_daemon::init_tracing(global.log_level(&config.log_level));
    Ok(config)
}
