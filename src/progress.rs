//! Session-scoped view of a reader's progress record.
//!
//! In [`SessionMode::Preview`] every operation is a no-op: previews read the
//! graph but leave no trace in reader progress, not even a created record.

use std::sync::Arc;

use crate::error::{NarrativeError, Result};
use crate::session::SessionMode;
use crate::store::ProgressStore;
use crate::types::{PartId, ProgressId, ProgressUpdate, ReaderId, StoryId, StoryProgress};

/// Tracks and persists one session's progress record.
///
/// The local copy is only updated after the store accepts a write, so a
/// failed write leaves both in their previous state.
pub struct ProgressTracker<S: ProgressStore> {
    store: Arc<S>,
    mode: SessionMode,
    record: Option<StoryProgress>,
}

impl<S: ProgressStore> ProgressTracker<S> {
    /// Create a tracker for a session in `mode`.
    pub fn new(store: Arc<S>, mode: SessionMode) -> Self {
        Self { store, mode, record: None }
    }

    /// The session mode.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// The tracked record, if one has been loaded.
    pub fn record(&self) -> Option<&StoryProgress> {
        self.record.as_ref()
    }

    /// Load the record for (reader, story), creating it if absent.
    ///
    /// Returns `None` in preview mode.
    pub async fn get_or_create(&mut self, reader: ReaderId, story: StoryId) -> Result<Option<&StoryProgress>> {
        if self.mode.is_preview() {
            tracing::trace!(story_id = %story, "Preview session, skipping progress upsert");
            return Ok(None);
        }

        let record = self.store.upsert_progress(&reader, &story).await
            .map_err(NarrativeError::from_persistence)?;

        tracing::debug!(
            progress_id = %record.id,
            reader_id = %reader,
            story_id = %story,
            current_part_id = ?record.current_part_id,
            completed = record.completed,
            "Progress record loaded"
        );

        self.record = Some(record);
        Ok(self.record.as_ref())
    }

    /// Point the record at `next`.
    pub async fn advance(&mut self, next: PartId) -> Result<()> {
        self.write(ProgressUpdate::advance_to(next)).await
    }

    /// Mark the story completed.
    pub async fn complete(&mut self) -> Result<()> {
        if self.mode.is_preview() {
            return Ok(());
        }
        let id = self.record_id()?;
        self.store.mark_completed(&id).await
            .map_err(NarrativeError::from_persistence)?;
        if let Some(record) = self.record.as_mut() {
            record.apply(&ProgressUpdate::completed());
        }
        Ok(())
    }

    /// Clear the pointer and completion flag.
    pub async fn reset(&mut self) -> Result<()> {
        if self.mode.is_preview() {
            return Ok(());
        }
        let id = self.record_id()?;
        self.store.reset_progress(&id).await
            .map_err(NarrativeError::from_persistence)?;
        if let Some(record) = self.record.as_mut() {
            record.apply(&ProgressUpdate::reset());
        }
        Ok(())
    }

    async fn write(&mut self, update: ProgressUpdate) -> Result<()> {
        if self.mode.is_preview() {
            return Ok(());
        }
        let id = self.record_id()?;
        self.store.update_progress(&id, &update).await
            .map_err(NarrativeError::from_persistence)?;
        if let Some(record) = self.record.as_mut() {
            record.apply(&update);
        }
        Ok(())
    }

    fn record_id(&self) -> Result<ProgressId> {
        self.record
            .as_ref()
            .map(|r| r.id)
            .ok_or_else(|| NarrativeError::InvalidAction("progress record not loaded".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_preview_never_writes() {
        let store = Arc::new(InMemoryStore::new());
        let mut tracker = ProgressTracker::new(Arc::clone(&store), SessionMode::Preview);

        assert!(tracker.get_or_create(ReaderId::random(), StoryId::random()).await.unwrap().is_none());
        tracker.advance(PartId::random()).await.unwrap();
        tracker.complete().await.unwrap();
        tracker.reset().await.unwrap();

        assert_eq!(store.write_count(), 0);
        assert_eq!(store.num_progress_records(), 0);
    }

    #[tokio::test]
    async fn test_reading_mode_persists() {
        let store = Arc::new(InMemoryStore::new());
        let reader = ReaderId::random();
        let story = StoryId::random();
        let part = PartId::random();
        let mut tracker = ProgressTracker::new(Arc::clone(&store), SessionMode::Reading);

        tracker.get_or_create(reader, story).await.unwrap();
        tracker.advance(part).await.unwrap();
        tracker.complete().await.unwrap();

        let stored = store.progress_for(&reader, &story).unwrap();
        assert_eq!(stored.current_part_id, Some(part));
        assert!(stored.completed);
        assert_eq!(tracker.record().unwrap().current_part_id, Some(part));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_local_state() {
        let store = Arc::new(InMemoryStore::new());
        let mut tracker = ProgressTracker::new(Arc::clone(&store), SessionMode::Reading);
        tracker.get_or_create(ReaderId::random(), StoryId::random()).await.unwrap();

        store.set_fail_writes(true);
        let err = tracker.advance(PartId::random()).await.unwrap_err();
        assert!(matches!(err, NarrativeError::PersistenceFailure(_)));
        assert!(tracker.record().unwrap().current_part_id.is_none());
    }

    #[tokio::test]
    async fn test_write_before_load_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let mut tracker = ProgressTracker::new(store, SessionMode::Reading);
        let err = tracker.complete().await.unwrap_err();
        assert!(matches!(err, NarrativeError::InvalidAction(_)));
    }
}
