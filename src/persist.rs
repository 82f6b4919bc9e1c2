//! Snapshot file persistence
//!
//! The snapshot is loaded once at startup and rewritten by a background task.
//! Writes go to a sibling temp file which is then renamed over the target, so
//! only one writer may touch a given path at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::state::export::{PollSnapshot, SnapshotError};
use crate::state::AppState;

/// Read a snapshot file. Returns None if the file does not exist.
pub async fn load_snapshot(path: &Path) -> Result<Option<PollSnapshot>, SnapshotError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot: PollSnapshot = serde_json::from_slice(&raw)?;
    Ok(Some(snapshot))
}

pub async fn save_snapshot(path: &Path, snapshot: &PollSnapshot) -> Result<(), SnapshotError> {
    let json = serde_json::to_vec_pretty(snapshot)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Load the snapshot at `path` into state, if there is one
pub async fn restore_from_file(state: &AppState, path: &Path) -> Result<bool, SnapshotError> {
    match load_snapshot(path).await? {
        Some(snapshot) => {
            state.import_snapshot(snapshot).await?;
            tracing::info!(path = %path.display(), "Restored state from snapshot");
            Ok(true)
        }
        None => {
            tracing::info!(path = %path.display(), "No snapshot found, starting empty");
            Ok(false)
        }
    }
}

/// Export current state and write it to `path`
pub async fn write_snapshot(state: &AppState, path: &Path) -> Result<(), SnapshotError> {
    let snapshot = state.export_snapshot().await?;
    save_snapshot(path, &snapshot).await?;
    tracing::debug!(
        path = %path.display(),
        questions = snapshot.questions.len(),
        votes = snapshot.votes.len(),
        "Snapshot written"
    );
    Ok(())
}

/// Handle to the background snapshot writer
pub struct SnapshotWriter {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SnapshotWriter {
    /// Stop the periodic writes and wait for the task's final snapshot
    pub async fn shutdown(self) {
        // Err means the task already exited
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::error!("Snapshot writer task failed: {}", e);
        }
    }
}

/// Spawn a background task that rewrites the snapshot file every `interval`.
///
/// The task owns every write to `path`, including the final one on shutdown.
pub fn spawn_snapshot_writer(
    state: Arc<AppState>,
    path: PathBuf,
    interval: Duration,
) -> SnapshotWriter {
    let (shutdown, mut shutdown_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        // First tick completes immediately; nothing has changed yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = write_snapshot(&state, &path).await {
                        tracing::error!("Failed to write snapshot: {}", e);
                    }
                }
                _ = &mut shutdown_rx => break,
            }
        }

        match write_snapshot(&state, &path).await {
            Ok(()) => tracing::info!(path = %path.display(), "Final snapshot written"),
            Err(e) => tracing::error!("Failed to write final snapshot: {}", e),
        }
    });

    SnapshotWriter { shutdown, handle }
}
