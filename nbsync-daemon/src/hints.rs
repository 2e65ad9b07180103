//! Native filesystem notifications as a latency hint feed.
//!
//! Hints are translated into [`ChangeEvent`]s and go through the same
//! debounce queue as polled changes. Losing a hint is harmless: the next
//! poll reports the same change.

use std::path::Path;
use std::time::Instant;

use notify::event::{ModifyKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, error::TryRecvError};

use nbsync_engine::{ChangeEvent, ChangeKind};

use crate::error::DaemonError;

/// A live watcher over the tree roots plus its event channel.
pub struct NativeHints {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl NativeHints {
    /// Watch every root recursively.
    pub fn start(roots: &[&Path]) -> Result<Self, DaemonError> {
        let (tx, rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = recommended_watcher(move |event| {
            let _ = tx.send(event);
        })?;
        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            tracing::debug!(path = %root.display(), "watching tree root");
        }
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Everything received since the last call, without blocking.
    pub fn drain(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let mut changes = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => changes.extend(map_event(&event, now)),
                Ok(Err(err)) => tracing::warn!(error = %err, "watcher event error"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        changes
    }
}

/// Translate one notify event into change events.
///
/// Metadata-only modifications are dropped: the engine itself produces them
/// when it copies timestamps onto a mirror.
pub fn map_event(event: &Event, now: Instant) -> Vec<ChangeEvent> {
    let each = |kind: ChangeKind| {
        event
            .paths
            .iter()
            .map(|path| ChangeEvent::new(path.clone(), kind, now))
            .collect::<Vec<_>>()
    };
    match &event.kind {
        EventKind::Create(_) => each(ChangeKind::Created),
        EventKind::Remove(_) => each(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(ChangeKind::Moved),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::new();
            if let Some(from) = event.paths.first() {
                changes.push(ChangeEvent::new(from.clone(), ChangeKind::Deleted, now));
            }
            if let Some(to) = event.paths.get(1) {
                changes.push(ChangeEvent::new(to.clone(), ChangeKind::Moved, now));
            }
            changes
        }
        // Platforms that cannot tell the two ends of a rename apart.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                let kind = if path.exists() {
                    ChangeKind::Moved
                } else {
                    ChangeKind::Deleted
                };
                ChangeEvent::new(path.clone(), kind, now)
            })
            .collect(),
        EventKind::Modify(_) => each(ChangeKind::Modified),
        _ => Vec::new(),
    }
}
