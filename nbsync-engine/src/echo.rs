//! Suppression of change events caused by the engine's own writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Target paths the engine just wrote, each with an expiry instant.
///
/// Entries survive lookups and are only removed by [`EchoGuard::sweep`],
/// which the main loop calls once per cycle.
#[derive(Debug, Clone)]
pub struct EchoGuard {
    window: Duration,
    entries: HashMap<PathBuf, Instant>,
}

impl EchoGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Mark `path` as written by the engine at `now`.
    pub fn record(&mut self, path: impl Into<PathBuf>, now: Instant) {
        self.entries.insert(path.into(), now + self.window);
    }

    /// True when an event for `path` at `now` is the echo of a recent write.
    pub fn is_echo(&self, path: &Path, now: Instant) -> bool {
        self.entries.get(path).is_some_and(|expiry| now < *expiry)
    }

    /// Drop expired entries, returning how many were removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expiry| now < *expiry);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_window_expires() {
        let mut guard = EchoGuard::new(Duration::from_secs(5));
        let t0 = Instant::now();
        guard.record("/b/x.ipynb", t0);

        assert!(guard.is_echo(Path::new("/b/x.ipynb"), t0 + Duration::from_secs(4)));
        assert!(guard.is_echo(Path::new("/b/x.ipynb"), t0 + Duration::from_secs(4)));
        assert!(!guard.is_echo(Path::new("/b/x.ipynb"), t0 + Duration::from_secs(5)));
        assert!(!guard.is_echo(Path::new("/a/x.md"), t0));
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let mut guard = EchoGuard::new(Duration::from_secs(5));
        let t0 = Instant::now();
        guard.record("/old", t0);
        guard.record("/new", t0 + Duration::from_secs(3));

        assert_eq!(guard.sweep(t0 + Duration::from_secs(6)), 1);
        assert_eq!(guard.len(), 1);
        assert!(guard.is_echo(Path::new("/new"), t0 + Duration::from_secs(6)));
    }
}
