//! Reader progress types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::uuid_id;
use super::part::PartId;
use super::story::{ReaderId, StoryId};

uuid_id!(
    /// Unique identifier for a progress record.
    ProgressId
);

/// Durable pointer of one reader into one story.
///
/// At most one record exists per (reader, story) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryProgress {
    /// Unique record identifier.
    pub id: ProgressId,
    /// Reader owning the record.
    pub reader_id: ReaderId,
    /// Story being read.
    pub story_id: StoryId,
    /// Current part; `None` means not started, or reset to the start.
    pub current_part_id: Option<PartId>,
    /// Whether the reader has finished the story.
    pub completed: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl StoryProgress {
    /// Create a fresh, not-yet-started record.
    pub fn new(reader_id: ReaderId, story_id: StoryId) -> Self {
        let now = Utc::now();
        Self {
            id: ProgressId::random(),
            reader_id,
            story_id,
            current_part_id: None,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update in place, bumping `updated_at`.
    pub fn apply(&mut self, update: &ProgressUpdate) {
        if let Some(part) = update.current_part_id {
            self.current_part_id = part;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update of a progress record.
///
/// Unset fields are left untouched. `current_part_id: Some(None)` clears the
/// pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// New current part, if changing.
    pub current_part_id: Option<Option<PartId>>,
    /// New completion flag, if changing.
    pub completed: Option<bool>,
}

impl ProgressUpdate {
    /// Move the reader to `part`.
    pub fn advance_to(part: PartId) -> Self {
        Self {
            current_part_id: Some(Some(part)),
            completed: None,
        }
    }

    /// Mark the story finished.
    pub fn completed() -> Self {
        Self {
            current_part_id: None,
            completed: Some(true),
        }
    }

    /// Clear the pointer and the completion flag.
    pub fn reset() -> Self {
        Self {
            current_part_id: Some(None),
            completed: Some(false),
        }
    }
}
