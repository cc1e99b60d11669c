use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::store_io::{CONFIG_FILE, STORE_FILE};

/// Which workspace file changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceChange {
    Store,
    Config,
}

/// Watches `tally/` for writes to the store or config made by any process.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<WorkspaceChange>,
}

impl StoreWatcher {
    pub fn start(tally_dir: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else { return };
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                for change in event.paths.iter().filter_map(|p| classify(p)) {
                    let _ = tx.send(change);
                }
            },
            Config::default(),
        )?;

        // Atomic writes replace the file, so watch the directory, not the file.
        watcher.watch(tally_dir, RecursiveMode::NonRecursive)?;
        Ok(StoreWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Drain queued changes without blocking.
    pub fn poll(&self) -> Vec<WorkspaceChange> {
        let mut changes = Vec::new();
        while let Ok(change) = self.rx.try_recv() {
            if !changes.contains(&change) {
                changes.push(change);
            }
        }
        changes
    }

    /// Block until at least one change arrives or `timeout` passes, then
    /// drain the burst that usually follows a single save.
    ///
    /// Returns `None` once the watcher has shut down.
    pub fn wait(&self, timeout: Duration) -> Option<Vec<WorkspaceChange>> {
        match self.rx.recv_timeout(timeout) {
            Ok(first) => {
                std::thread::sleep(Duration::from_millis(50));
                let mut changes = vec![first];
                for change in self.poll() {
                    if !changes.contains(&change) {
                        changes.push(change);
                    }
                }
                Some(changes)
            }
            Err(RecvTimeoutError::Timeout) => Some(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Map a path from a notify event to the workspace file it names, ignoring
/// temp files, the lock and the recovery log.
fn classify(path: &Path) -> Option<WorkspaceChange> {
    match path.file_name()?.to_str()? {
        STORE_FILE => Some(WorkspaceChange::Store),
        CONFIG_FILE => Some(WorkspaceChange::Config),
        _ => None,
    }
}
