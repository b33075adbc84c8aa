//! Error taxonomy for the traversal engine.
//!
//! Every variant is scoped to a single reading session; none is fatal to
//! the process. Callers recover by retrying the action or leaving the story.

use crate::types::{ChoiceId, PartId, PathDecodeError, StoryId};

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    /// Story is missing or not visible to the requester.
    #[error("Story not found: {0}")]
    StoryNotFound(StoryId),

    /// Part is missing.
    #[error("Story part not found: {0}")]
    PartNotFound(PartId),

    /// Story has no parts to present.
    #[error("Story {0} has no parts")]
    GraphIncomplete(StoryId),

    /// A progress write failed. In-memory traversal state is unchanged.
    #[error("Failed to save progress: {0}")]
    PersistenceFailure(String),

    /// A store read failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The store returned a record that violates graph invariants.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A recorded choice is not among the current part's choices.
    #[error("Replay desync at part {part_id}: recorded choice {choice_id:?} not available")]
    ReplayDesync {
        /// Part where replay stopped.
        part_id: PartId,
        /// Recorded choice that could not be applied.
        choice_id: Option<ChoiceId>,
    },

    /// The requested action is not available in the current state.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// A transit path payload could not be decoded.
    #[error("Path decode failed: {0}")]
    PathDecode(#[from] PathDecodeError),
}

impl NarrativeError {
    /// Create a read error from any store error.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::Store(e.to_string())
    }

    /// Create a persistence error from any store error.
    pub fn from_persistence<E: std::error::Error>(e: E) -> Self {
        Self::PersistenceFailure(e.to_string())
    }

    /// Whether the error means "nothing to show" (absent or hidden content).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StoryNotFound(_) | Self::PartNotFound(_))
    }

    /// Whether retrying the same action may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PersistenceFailure(_) | Self::Store(_))
    }

    /// Machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoryNotFound(_) => "STORY_NOT_FOUND",
            Self::PartNotFound(_) => "PART_NOT_FOUND",
            Self::GraphIncomplete(_) => "GRAPH_INCOMPLETE",
            Self::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            Self::Store(_) => "STORE_ERROR",
            Self::MalformedRecord(_) => "MALFORMED_RECORD",
            Self::ReplayDesync { .. } => "REPLAY_DESYNC",
            Self::InvalidAction(_) => "INVALID_ACTION",
            Self::PathDecode(_) => "PATH_DECODE_FAILED",
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, NarrativeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(NarrativeError::PartNotFound(PartId::random()).is_not_found());
        assert!(NarrativeError::PersistenceFailure("timeout".into()).is_transient());
        assert!(!NarrativeError::GraphIncomplete(StoryId::random()).is_transient());
    }

    #[test]
    fn test_codes_are_distinct() {
        let a = NarrativeError::StoryNotFound(StoryId::random()).code();
        let b = NarrativeError::PartNotFound(PartId::random()).code();
        assert_ne!(a, b);
    }
}
