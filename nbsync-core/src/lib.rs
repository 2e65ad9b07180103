//! nbsync core library: domain types, configuration persistence, errors.
//!
//! Public API surface:
//! - [`types`]: trees, sync direction, conflict policy
//! - [`config`]: [`SyncConfig`] load / save / validate
//! - [`ignore`]: basename glob matching shared by scanner and classifier
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod ignore;
pub mod types;

pub use config::SyncConfig;
pub use error::ConfigError;
pub use ignore::IgnorePatterns;
pub use types::{ConflictResolution, Direction, SyncPolicy, Tree};
