//! Story part (node) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::choice::{ChoiceId, StoryChoice};
use super::id::uuid_id;
use super::story::StoryId;

uuid_id!(
    /// Unique identifier for a part (node) of a story graph.
    PartId
);

/// A unit of story content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryPart {
    /// Unique part identifier.
    pub id: PartId,
    /// Owning story.
    pub story_id: StoryId,
    /// Text shown to the reader.
    pub content: String,
    /// Author marked this part as an ending.
    pub is_ending: bool,
    /// Author marked this part as the entry point.
    pub is_start: bool,
    /// Creation time, the fallback ordering key for start resolution.
    pub created_at: DateTime<Utc>,
}

impl StoryPart {
    /// Create a new, unflagged part.
    pub fn new(
        id: PartId,
        story_id: StoryId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            story_id,
            content: content.into(),
            is_ending: false,
            is_start: false,
            created_at,
        }
    }

    /// Flag this part as the story's entry point.
    pub fn as_start(mut self) -> Self {
        self.is_start = true;
        self
    }

    /// Flag this part as an ending.
    pub fn as_ending(mut self) -> Self {
        self.is_ending = true;
        self
    }
}

/// A part together with its outgoing choices, as presented to a reader.
///
/// Choices are always held in canonical order (ordering index, then id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartNode {
    /// The part itself.
    pub part: StoryPart,
    /// Outgoing choices, canonically ordered.
    pub choices: Vec<StoryChoice>,
}

impl PartNode {
    /// Build a node, sorting choices into canonical order.
    pub fn new(part: StoryPart, mut choices: Vec<StoryChoice>) -> Self {
        choices.sort();
        Self { part, choices }
    }

    /// Node identifier.
    pub fn id(&self) -> PartId {
        self.part.id
    }

    /// Content text.
    pub fn content(&self) -> &str {
        &self.part.content
    }

    /// Whether the only available action is "Finish".
    ///
    /// True for author-flagged endings and for nodes without choices.
    pub fn is_finish_only(&self) -> bool {
        self.part.is_ending || self.choices.is_empty()
    }

    /// Look up one of this node's choices.
    pub fn choice(&self, id: &ChoiceId) -> Option<&StoryChoice> {
        self.choices.iter().find(|c| c.id == *id)
    }
}
