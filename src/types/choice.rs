//! Choice (edge) types for the story graph.

use serde::{Deserialize, Serialize};

use super::id::uuid_id;
use super::part::PartId;

uuid_id!(
    /// Unique identifier for a choice (edge) in a story graph.
    ChoiceId
);

/// Labeled transition out of a story part.
///
/// A choice with no `next_part_id` is a terminating edge: picking it ends
/// the story even when the source part is not flagged as an ending.
///
/// Implements `Ord` for deterministic presentation and replay:
/// (order_index, id, part_id, text, next_part_id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryChoice {
    /// Unique choice identifier.
    pub id: ChoiceId,
    /// Source part.
    pub part_id: PartId,
    /// Label shown to the reader.
    pub text: String,
    /// Position among the source part's choices.
    pub order_index: i32,
    /// Destination part, or `None` for a terminating choice.
    pub next_part_id: Option<PartId>,
}

impl StoryChoice {
    /// Create a terminating choice. Use [`StoryChoice::leading_to`] to give
    /// it a destination.
    pub fn new(id: ChoiceId, part_id: PartId, text: impl Into<String>, order_index: i32) -> Self {
        Self {
            id,
            part_id,
            text: text.into(),
            order_index,
            next_part_id: None,
        }
    }

    /// Set the destination part.
    pub fn leading_to(mut self, next: PartId) -> Self {
        self.next_part_id = Some(next);
        self
    }

    /// Whether choosing this ends the story.
    pub fn is_terminating(&self) -> bool {
        self.next_part_id.is_none()
    }
}

impl PartialOrd for StoryChoice {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StoryChoice {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order_index
            .cmp(&other.order_index)
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.part_id.cmp(&other.part_id))
            .then_with(|| self.text.cmp(&other.text))
            .then_with(|| self.next_part_id.cmp(&other.next_part_id))
    }
}
