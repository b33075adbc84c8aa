//! Choice resolution.
//!
//! A choice terminates the story if and only if it has no destination. This
//! is independent of the source part's `is_ending` flag, which only controls
//! whether the "Finish" action is offered.

use serde::{Deserialize, Serialize};

use crate::types::{PartId, StoryChoice};

/// Outcome of picking a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Move on to another part.
    Continue {
        /// Destination part.
        next_part_id: PartId,
    },
    /// End the story.
    Terminate,
}

/// Resolve a choice to its outcome.
pub fn resolve(choice: &StoryChoice) -> Resolution {
    match choice.next_part_id {
        Some(next_part_id) => Resolution::Continue { next_part_id },
        None => Resolution::Terminate,
    }
}
