//! File watching for detecting source file changes.
//!
//! Subscribes to the watched file's parent directory (single-file
//! subscriptions are not efficient on every platform) and filters events
//! by basename, so sibling-file activity never triggers a render. Falls
//! back to mtime polling when the native notification backend fails.
//!
//! The event channel holds at most one pending change: while a render is
//! in flight a burst of writes collapses into a single queued event, so
//! each delivered event yields at most one update.

use crate::Error;
use notify::{Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// Events emitted by the file watcher.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// The watched file changed (modified, created, or removed — editors
    /// that save via write-rename surface as create/remove pairs).
    Modified(PathBuf),
    /// The underlying notification backend reported an error.
    Error(String),
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Polling interval in milliseconds for fallback polling mode.
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

/// Keeps the active notification backend alive; dropping it ends event
/// delivery, which in turn ends any loop draining the receiver.
pub(crate) enum Backend {
    Notify(#[allow(dead_code)] RecommendedWatcher),
    Polling { shutdown: mpsc::Sender<()> },
    External,
}

impl Drop for Backend {
    fn drop(&mut self) {
        if let Backend::Polling { shutdown } = self {
            let _ = shutdown.send(());
        }
    }
}

/// A change-notification source for a single file.
///
/// Uses the platform's native mechanism when available and transparently
/// falls back to polling. [`FileWatcher::from_source`] plugs in an
/// arbitrary event source instead, keeping the downstream update loop
/// independent of any backend.
pub struct FileWatcher {
    pub(crate) events: mpsc::Receiver<WatchEvent>,
    pub(crate) backend: Backend,
}

impl FileWatcher {
    /// Start watching the given file.
    pub fn new(path: &Path, config: WatcherConfig) -> Result<Self, Error> {
        let (event_tx, event_rx) = mpsc::sync_channel(1);

        match try_notify_watcher(path, event_tx.clone()) {
            Ok(watcher) => {
                tracing::info!(path = ?path, "Started native file watcher");
                Ok(Self {
                    events: event_rx,
                    backend: Backend::Notify(watcher),
                })
            }
            Err(err) => {
                tracing::warn!(
                    ?err,
                    path = ?path,
                    "Native file watcher failed, falling back to polling"
                );
                let shutdown = spawn_polling_watcher(path.to_path_buf(), config, event_tx);
                Ok(Self {
                    events: event_rx,
                    backend: Backend::Polling { shutdown },
                })
            }
        }
    }

    /// Wrap an external event source, e.g. a fake stream in tests.
    pub fn from_source(events: mpsc::Receiver<WatchEvent>) -> Self {
        Self {
            events,
            backend: Backend::External,
        }
    }

    /// Block until the next event; `None` once the source is gone.
    pub fn recv(&self) -> Option<WatchEvent> {
        self.events.recv().ok()
    }
}

fn try_notify_watcher(
    path: &Path,
    event_tx: mpsc::SyncSender<WatchEvent>,
) -> Result<RecommendedWatcher, Error> {
    let (watch_target, file_name) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => (parent.to_path_buf(), name.to_os_string()),
        _ => {
            return Err(Error::Watch {
                path: path.to_path_buf(),
                message: "path has no parent directory".to_string(),
            })
        }
    };
    // Watching "foo.md" yields an empty parent.
    let watch_target = if watch_target.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        watch_target
    };

    let event_path = path.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<NotifyEvent, notify::Error>| match res {
            Ok(event) => {
                let is_target_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if !is_target_file {
                    return;
                }

                if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                    // A full queue means a change is already pending; the
                    // queued event covers this one too.
                    let _ = event_tx.try_send(WatchEvent::Modified(event_path.clone()));
                }
            }
            Err(err) => {
                let _ = event_tx.try_send(WatchEvent::Error(err.to_string()));
            }
        },
        notify::Config::default(),
    )
    .map_err(|err| Error::Watch {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    watcher
        .watch(&watch_target, RecursiveMode::NonRecursive)
        .map_err(|err| Error::Watch {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

    Ok(watcher)
}

fn spawn_polling_watcher(
    path: PathBuf,
    config: WatcherConfig,
    event_tx: mpsc::SyncSender<WatchEvent>,
) -> mpsc::Sender<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    std::thread::spawn(move || {
        let mut last_mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok();

        tracing::info!(
            path = ?path,
            poll_interval_ms = config.poll_interval_ms,
            "Started polling file watcher"
        );

        loop {
            match shutdown_rx.recv_timeout(poll_interval) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }

            match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(mtime) => {
                    let changed = last_mtime.map_or(true, |last| mtime > last);
                    if changed && last_mtime.is_some() {
                        let _ = event_tx.try_send(WatchEvent::Modified(path.clone()));
                    }
                    last_mtime = Some(mtime);
                }
                Err(_) => {
                    // File vanished; report once and let the consumer
                    // discover the missing source.
                    if last_mtime.take().is_some() {
                        let _ = event_tx.try_send(WatchEvent::Modified(path.clone()));
                    }
                }
            }
        }
    });

    shutdown_tx
}
