//! YAML configuration.
//!
//! # Storage
//!
//! ```text
//! ./nbsync.yaml                       (preferred, next to the trees)
//! <config_dir>/nbsync/nbsync.yaml     (fallback, e.g. ~/.config on Linux)
//! ```
//!
//! Every key is optional; missing keys take their defaults. The engine reads
//! the config once at construction and never reloads it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::ignore::{IgnorePatterns, DEFAULT_IGNORE_PATTERNS};
use crate::types::{ConflictResolution, SyncPolicy};

/// File name used for both the local and the per-user config.
pub const CONFIG_FILE_NAME: &str = "nbsync.yaml";

/// Upper bound for every duration key, in seconds (one week).
pub const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Full runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Tree A root (text documents).
    pub source_dir: PathBuf,
    /// Tree B root (notebooks).
    pub target_dir: PathBuf,
    /// Extensions belonging to tree A; the first is used for mirror paths.
    pub a_extensions: Vec<String>,
    /// Extensions belonging to tree B; the first is used for mirror paths.
    pub b_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,

    /// Seconds of quiet before a pending change fires.
    pub debounce_delay: f64,
    /// Seconds between polling passes.
    pub poll_interval: f64,
    /// Seconds the main loop sleeps between cycles.
    pub loop_interval: f64,
    /// Seconds below which two timestamps count as equal.
    pub proximity_threshold: f64,
    /// Seconds an engine-written path stays in the echo guard.
    pub echo_window: f64,
    /// Seconds between resets of the delivered-deletion set.
    pub cleanup_interval: f64,

    pub conflict_resolution: ConflictResolution,
    pub delete_orphaned: bool,
    pub sync_on_start: bool,
    pub bidirectional: bool,
    /// Feed native filesystem notifications into the debounce queue.
    pub native_events: bool,

    /// Code language assumed for unlabelled fences and language-less notebooks.
    pub default_language: String,
    /// Render notebook cell outputs into the text copy.
    pub preserve_output: bool,

    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("notes"),
            target_dir: PathBuf::from("notebooks"),
            a_extensions: vec![".md".to_string()],
            b_extensions: vec![".ipynb".to_string()],
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            debounce_delay: 0.8,
            poll_interval: 2.0,
            loop_interval: 1.0,
            proximity_threshold: 3.0,
            echo_window: 5.0,
            cleanup_interval: 60.0,
            conflict_resolution: ConflictResolution::Newer,
            delete_orphaned: true,
            sync_on_start: true,
            bidirectional: true,
            native_events: true,
            default_language: "python".to_string(),
            preserve_output: true,
            log_level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// `./nbsync.yaml`. Pure, no I/O.
    pub fn default_path() -> PathBuf {
        PathBuf::from(CONFIG_FILE_NAME)
    }

    /// `<config_dir>/nbsync/nbsync.yaml`, if the platform has a config dir.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nbsync").join(CONFIG_FILE_NAME))
    }

    /// First existing of [`default_path`](Self::default_path) and
    /// [`user_path`](Self::user_path); falls back to the local path.
    pub fn discover() -> PathBuf {
        let local = Self::default_path();
        if local.exists() {
            return local;
        }
        match Self::user_path() {
            Some(user) if user.exists() => user,
            _ => local,
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Load / save
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Load the config at `path`.
    ///
    /// A missing file yields the defaults. Malformed YAML returns
    /// [`ConfigError::Parse`] carrying the path and serde_yaml's line context.
    pub fn load_at(path: &Path) -> Result<SyncConfig, ConfigError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(SyncConfig::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(SyncConfig::default());
        }
        let config: SyncConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Save to `path` atomically.
    ///
    /// Write flow: serialize → `.yaml.tmp` sibling → `rename`. The `.tmp` file
    /// lives next to the target so the rename never crosses filesystems.
    pub fn save_at(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let yaml = serde_yaml::to_string(self)?;
        let tmp = path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
        if let Err(err) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(path, err));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 3. Validation and derived views
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations: [(&'static str, f64); 6] = [
            ("debounce_delay", self.debounce_delay),
            ("poll_interval", self.poll_interval),
            ("loop_interval", self.loop_interval),
            ("proximity_threshold", self.proximity_threshold),
            ("echo_window", self.echo_window),
            ("cleanup_interval", self.cleanup_interval),
        ];
        for (key, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("expected a non-negative number of seconds, got {value}"),
                });
            }
            if value > MAX_DURATION_SECS || Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("{value} seconds exceeds the limit of {MAX_DURATION_SECS}"),
                });
            }
        }

        for (key, exts) in [("a_extensions", &self.a_extensions), ("b_extensions", &self.b_extensions)] {
            if exts.is_empty() {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "at least one extension is required".to_string(),
                });
            }
        }
        let b_extensions: Vec<String> =
            self.b_extensions.iter().map(|ext| normalize_extension(ext)).collect();
        let overlap = self
            .a_extensions
            .iter()
            .find(|ext| b_extensions.contains(&normalize_extension(ext)));
        if let Some(ext) = overlap {
            return Err(ConfigError::Invalid {
                key: "b_extensions",
                reason: format!("extension '{ext}' is claimed by both trees"),
            });
        }

        IgnorePatterns::new(&self.ignore_patterns)?;
        Ok(())
    }

    /// Compiled ignore patterns.
    pub fn ignore(&self) -> Result<IgnorePatterns, ConfigError> {
        IgnorePatterns::new(&self.ignore_patterns)
    }

    /// The decision-relevant subset of the config.
    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy {
            conflict_resolution: self.conflict_resolution,
            proximity_threshold: seconds(self.proximity_threshold),
            delete_orphaned: self.delete_orphaned,
            bidirectional: self.bidirectional,
        }
    }

    pub fn debounce_delay(&self) -> Duration {
        seconds(self.debounce_delay)
    }

    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval)
    }

    pub fn loop_interval(&self) -> Duration {
        seconds(self.loop_interval)
    }

    pub fn echo_window(&self) -> Duration {
        seconds(self.echo_window)
    }

    pub fn cleanup_interval(&self) -> Duration {
        seconds(self.cleanup_interval)
    }
}

/// Lower-case and ensure a leading dot: `"MD"` and `".md"` both become `".md"`.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Seconds to a `Duration`, clamped to `0..=MAX_DURATION_SECS`.
fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value.min(MAX_DURATION_SECS)).unwrap_or(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_validate() {
        SyncConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn partial_yaml_merges_over_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "proximity_threshold: 5\nconflict_resolution: force_b\n").unwrap();

        let config = SyncConfig::load_at(&path).unwrap();
        assert_eq!(config.proximity_threshold, 5.0);
        assert_eq!(config.conflict_resolution, ConflictResolution::ForceB);
        assert_eq!(config.debounce_delay, 0.8);
        assert_eq!(config.a_extensions, vec![".md".to_string()]);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = SyncConfig::load_at(&tmp.path().join("absent.yaml")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn save_and_load_roundtrip_cleans_up_tmp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join(CONFIG_FILE_NAME);
        let config = SyncConfig {
            delete_orphaned: false,
            default_language: "rust".to_string(),
            ..SyncConfig::default()
        };
        config.save_at(&path).unwrap();
        assert!(!path.with_extension("yaml.tmp").exists());

        let loaded = SyncConfig::load_at(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn policy_converts_seconds() {
        let config = SyncConfig {
            proximity_threshold: 1.5,
            bidirectional: false,
            ..SyncConfig::default()
        };
        let policy = config.policy();
        assert_eq!(policy.proximity_threshold, Duration::from_millis(1500));
        assert!(!policy.bidirectional);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let config = SyncConfig {
            debounce_delay: -1.0,
            ..SyncConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("debounce_delay"), "got: {err}");
    }

    #[test]
    fn shared_extension_is_rejected() {
        let config = SyncConfig {
            b_extensions: vec![".MD".to_string()],
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "b_extensions", .. })
        ));
    }

    #[test]
    fn shared_extension_without_dot_is_rejected() {
        let config = SyncConfig {
            a_extensions: vec!["md".to_string()],
            b_extensions: vec![".ipynb".to_string(), " .Md".to_string()],
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "b_extensions", .. })
        ));
    }

    #[test]
    fn huge_duration_is_rejected_not_panicking() {
        let config = SyncConfig {
            debounce_delay: 1e20,
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "debounce_delay", .. })
        ));
        // Accessors clamp instead of panicking even on unvalidated values.
        assert_eq!(
            config.debounce_delay(),
            Duration::from_secs_f64(MAX_DURATION_SECS)
        );
    }

    #[test]
    fn duration_at_limit_is_accepted() {
        let config = SyncConfig {
            cleanup_interval: MAX_DURATION_SECS,
            ..SyncConfig::default()
        };
        config.validate().expect("limit is inclusive");
    }

    #[test]
    fn normalize_extension_adds_dot_and_lowercases() {
        assert_eq!(normalize_extension("MD"), ".md");
        assert_eq!(normalize_extension(" .ipynb "), ".ipynb");
    }
}
