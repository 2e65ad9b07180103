//! The watch loop: polling, native-event hints, debounce firing, cleanup.

mod error;
pub mod hints;
mod runtime;

pub use error::DaemonError;
pub use hints::NativeHints;
pub use runtime::{init_tracing, run, start_blocking, RunOptions, RunSummary};
