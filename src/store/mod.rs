//! Story storage backends.
//!
//! The engine consumes storage through two traits: [`StoryStore`] for the
//! read-only story graph and [`ProgressStore`] for per-reader progress.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use crate::types::{
    PartId, ProgressId, ProgressUpdate, ReaderId, Story, StoryChoice, StoryId, StoryPart,
    StoryProgress,
};

/// Read-only access to stories, parts, and choices.
///
/// Implementations must return choices in canonical order
/// (ordering index, then id).
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync;

    /// Fetch a story if it is visible to `viewer`: published, or authored by
    /// the viewer.
    async fn fetch_story(&self, id: &StoryId, viewer: &ReaderId) -> Result<Option<Story>, Self::Error>;

    /// Fetch a part by ID.
    async fn fetch_part(&self, id: &PartId) -> Result<Option<StoryPart>, Self::Error>;

    /// Fetch the outgoing choices of a part.
    async fn fetch_choices(&self, part_id: &PartId) -> Result<Vec<StoryChoice>, Self::Error>;

    /// Fetch the entry part of a story.
    ///
    /// Policy: earliest-created part flagged `is_start`, else the
    /// earliest-created part, else `None`. See
    /// [`select_start_part`](crate::graph::select_start_part).
    async fn fetch_start_part(&self, story_id: &StoryId) -> Result<Option<StoryPart>, Self::Error>;

    /// Check if the backend is reachable.
    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Durable per-(reader, story) progress records.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync;

    /// Return the record for (reader, story), creating it if absent.
    ///
    /// Must be atomic: concurrent calls for the same pair yield one record.
    async fn upsert_progress(&self, reader: &ReaderId, story: &StoryId) -> Result<StoryProgress, Self::Error>;

    /// Apply a partial update and bump `updated_at`.
    async fn update_progress(&self, id: &ProgressId, update: &ProgressUpdate) -> Result<(), Self::Error>;

    /// Mark the story completed.
    async fn mark_completed(&self, id: &ProgressId) -> Result<(), Self::Error> {
        self.update_progress(id, &ProgressUpdate::completed()).await
    }

    /// Clear the current part and the completion flag.
    async fn reset_progress(&self, id: &ProgressId) -> Result<(), Self::Error> {
        self.update_progress(id, &ProgressUpdate::reset()).await
    }
}

/// A backend serving both the story graph and reader progress.
pub trait NarrativeStore: StoryStore + ProgressStore + 'static {}

impl<T: StoryStore + ProgressStore + 'static> NarrativeStore for T {}

pub use memory::InMemoryStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
