//! File watching for incremental rebuilds.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Watches directories and reports changed paths in batches.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a watcher for `paths`.
    ///
    /// Paths touched by create, modify or remove events are collected until
    /// no event has arrived for `debounce`, then sent as one sorted batch.
    pub fn new(
        paths: &[PathBuf],
        debounce: Duration,
    ) -> Result<(Self, async_mpsc::Receiver<Vec<PathBuf>>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            }
        }

        std::thread::spawn(move || {
            let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
            loop {
                match sync_rx.recv_timeout(debounce) {
                    Ok(event) => {
                        if is_relevant(&event.kind) {
                            pending.extend(event.paths);
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if pending.is_empty() {
                            continue;
                        }
                        let batch: Vec<PathBuf> = std::mem::take(&mut pending).into_iter().collect();
                        if async_tx.blocking_send(batch).is_err() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn batches_file_changes() {
        let temp = tempdir().unwrap();
        let first = temp.path().join("a.html");
        let second = temp.path().join("b.html");

        let (watcher, mut rx) =
            FileWatcher::new(&[temp.path().to_path_buf()], Duration::from_millis(100)).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&first, "<p>a</p>").unwrap();
        fs::write(&second, "<p>b</p>").unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        let batch = batch.expect("timeout waiting for file watch event");
        let batch = batch.expect("channel should not be closed");
        assert!(!batch.is_empty());
        assert!(batch
            .iter()
            .any(|p| p.file_name() == first.file_name() || p.file_name() == second.file_name()));
    }
}
