//! In-memory story store for testing and demos.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::graph::select_start_part;
use crate::types::{
    PartId, ProgressId, ProgressUpdate, ReaderId, Story, StoryChoice, StoryId, StoryPart,
    StoryProgress,
};
use super::{ProgressStore, StoryStore};

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Progress record not found.
    #[error("Progress not found: {0}")]
    ProgressNotFound(ProgressId),
    /// Writes are switched off via [`InMemoryStore::set_fail_writes`].
    #[error("Write rejected: store is failing writes")]
    WriteRejected,
}

#[derive(Debug, Default)]
struct Graph {
    stories: BTreeMap<StoryId, Story>,
    parts: BTreeMap<PartId, StoryPart>,
    /// Source part -> choices, kept in canonical order.
    choices: BTreeMap<PartId, Vec<StoryChoice>>,
}

#[derive(Debug, Default)]
struct Progress {
    by_pair: BTreeMap<(ReaderId, StoryId), ProgressId>,
    records: BTreeMap<ProgressId, StoryProgress>,
}

/// In-memory story store.
///
/// Uses BTreeMap for deterministic iteration order. The graph sits behind
/// a read-write lock so tests can edit content mid-session; progress sits
/// behind a mutex so `upsert_progress` is atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    graph: RwLock<Graph>,
    progress: Mutex<Progress>,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a story.
    pub fn add_story(&self, story: Story) {
        self.graph.write().stories.insert(story.id, story);
    }

    /// Add or replace a part.
    pub fn add_part(&self, part: StoryPart) {
        self.graph.write().parts.insert(part.id, part);
    }

    /// Add a choice to its source part.
    pub fn add_choice(&self, choice: StoryChoice) {
        let mut graph = self.graph.write();
        let list = graph.choices.entry(choice.part_id).or_default();
        list.retain(|c| c.id != choice.id);
        list.push(choice);
        list.sort();
    }

    /// Replace a part's content.
    pub fn set_content(&self, part_id: &PartId, content: impl Into<String>) -> bool {
        match self.graph.write().parts.get_mut(part_id) {
            Some(part) => {
                part.content = content.into();
                true
            }
            None => false,
        }
    }

    /// Remove a part and its outgoing choices.
    pub fn remove_part(&self, part_id: &PartId) {
        let mut graph = self.graph.write();
        graph.parts.remove(part_id);
        graph.choices.remove(part_id);
    }

    /// Make every subsequent progress write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of progress writes accepted so far (upserts included).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of progress records.
    pub fn num_progress_records(&self) -> usize {
        self.progress.lock().records.len()
    }

    /// Look up the progress record for a pair without creating it.
    pub fn progress_for(&self, reader: &ReaderId, story: &StoryId) -> Option<StoryProgress> {
        let progress = self.progress.lock();
        progress
            .by_pair
            .get(&(*reader, *story))
            .and_then(|id| progress.records.get(id))
            .cloned()
    }

    fn check_writable(&self) -> Result<(), InMemoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(InMemoryError::WriteRejected);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl StoryStore for InMemoryStore {
    type Error = InMemoryError;

    async fn fetch_story(&self, id: &StoryId, viewer: &ReaderId) -> Result<Option<Story>, Self::Error> {
        Ok(self.graph.read()
            .stories
            .get(id)
            .filter(|s| s.is_visible_to(viewer))
            .cloned())
    }

    async fn fetch_part(&self, id: &PartId) -> Result<Option<StoryPart>, Self::Error> {
        Ok(self.graph.read().parts.get(id).cloned())
    }

    async fn fetch_choices(&self, part_id: &PartId) -> Result<Vec<StoryChoice>, Self::Error> {
        Ok(self.graph.read()
            .choices
            .get(part_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_start_part(&self, story_id: &StoryId) -> Result<Option<StoryPart>, Self::Error> {
        let graph = self.graph.read();
        let parts: Vec<&StoryPart> = graph.parts
            .values()
            .filter(|p| p.story_id == *story_id)
            .collect();
        Ok(select_start_part(parts).cloned())
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    type Error = InMemoryError;

    async fn upsert_progress(&self, reader: &ReaderId, story: &StoryId) -> Result<StoryProgress, Self::Error> {
        self.check_writable()?;
        let mut progress = self.progress.lock();
        if let Some(existing) = progress.by_pair.get(&(*reader, *story)).copied() {
            if let Some(record) = progress.records.get(&existing) {
                return Ok(record.clone());
            }
        }
        let record = StoryProgress::new(*reader, *story);
        progress.by_pair.insert((*reader, *story), record.id);
        progress.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_progress(&self, id: &ProgressId, update: &ProgressUpdate) -> Result<(), Self::Error> {
        self.check_writable()?;
        let mut progress = self.progress.lock();
        let record = progress.records
            .get_mut(id)
            .ok_or(InMemoryError::ProgressNotFound(*id))?;
        record.apply(update);
        Ok(())
    }
}
