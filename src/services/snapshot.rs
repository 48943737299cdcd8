use crate::error::{AppError, Result};
use crate::models::SavedTrack;
use std::io::ErrorKind;
use std::path::PathBuf;
use uuid::Uuid;

/// Durable snapshot store, one JSON document per session id. The snapshot
/// is the only artifact shared between the extraction and transfer phases:
/// written once when extraction completes, read once when transport
/// starts, removed when the transfer finishes or the session resets.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, session: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", session))
    }

    /// Persist a snapshot atomically: write to a sibling temp file, then
    /// rename over the target so readers never observe a partial document.
    pub async fn save(&self, session: Uuid, tracks: &[SavedTrack]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let bytes = serde_json::to_vec(tracks)?;
        let tmp = self.dir.join(format!("{}.json.part", session));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, self.path(session)).await?;

        tracing::info!("Persisted snapshot of {} tracks for session {}", tracks.len(), session);
        Ok(())
    }

    pub async fn load(&self, session: Uuid) -> Result<Vec<SavedTrack>> {
        let bytes = match tokio::fs::read(self.path(session)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::SnapshotMissing),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Number of tracks in the session's snapshot, 0 when none exists.
    pub async fn count(&self, session: Uuid) -> Result<usize> {
        match self.load(session).await {
            Ok(tracks) => Ok(tracks.len()),
            Err(AppError::SnapshotMissing) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Idempotent: removing a snapshot that was never written is fine.
    pub async fn remove(&self, session: Uuid) -> Result<()> {
        match tokio::fs::remove_file(self.path(session)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
