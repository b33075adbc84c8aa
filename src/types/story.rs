//! Story and reader types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::id::uuid_id;

uuid_id!(
    /// Unique identifier for a story.
    StoryId
);

uuid_id!(
    /// Unique identifier for a reader (also used for authors).
    ReaderId
);

/// Publication state of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    /// Work in progress, visible only to the author.
    #[default]
    Draft,
    /// Awaiting moderation, visible only to the author.
    Submitted,
    /// Visible to every reader.
    Published,
}

impl PublicationState {
    /// Parse publication state from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Submitted => write!(f, "submitted"),
            Self::Published => write!(f, "published"),
        }
    }
}

/// Story metadata.
///
/// The engine never mutates stories; it only needs them for visibility
/// checks and to know who the author is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// Unique story identifier.
    pub id: StoryId,
    /// Display title.
    pub title: String,
    /// Short description.
    pub description: String,
    /// Genre label, if any.
    pub genre: Option<String>,
    /// Author of the story.
    pub author_id: ReaderId,
    /// Publication state.
    pub state: PublicationState,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Story {
    /// Create a new draft story.
    pub fn new(id: StoryId, title: impl Into<String>, author_id: ReaderId) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            genre: None,
            author_id,
            state: PublicationState::Draft,
            created_at: Utc::now(),
        }
    }

    /// Set the publication state.
    pub fn with_state(mut self, state: PublicationState) -> Self {
        self.state = state;
        self
    }

    /// Set the genre.
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    /// Whether `reader` wrote this story.
    pub fn is_authored_by(&self, reader: &ReaderId) -> bool {
        self.author_id == *reader
    }

    /// Whether `reader` may read this story.
    ///
    /// Published stories are visible to everyone; anything else only to
    /// its author.
    pub fn is_visible_to(&self, reader: &ReaderId) -> bool {
        self.state == PublicationState::Published || self.is_authored_by(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn reader(n: u128) -> ReaderId {
        ReaderId::new(Uuid::from_u128(n))
    }

    #[test]
    fn test_draft_visible_only_to_author() {
        let story = Story::new(StoryId::random(), "Draft", reader(1));
        assert!(story.is_visible_to(&reader(1)));
        assert!(!story.is_visible_to(&reader(2)));
    }

    #[test]
    fn test_submitted_hidden_from_readers() {
        let story = Story::new(StoryId::random(), "Pending", reader(1))
            .with_state(PublicationState::Submitted);
        assert!(!story.is_visible_to(&reader(2)));
    }

    #[test]
    fn test_published_visible_to_everyone() {
        let story = Story::new(StoryId::random(), "Live", reader(1))
            .with_state(PublicationState::Published);
        assert!(story.is_visible_to(&reader(2)));
        assert!(story.is_visible_to(&reader(1)));
    }

    #[test]
    fn test_publication_state_parse() {
        assert_eq!(PublicationState::from_str("Published"), Some(PublicationState::Published));
        assert_eq!(PublicationState::from_str("draft"), Some(PublicationState::Draft));
        assert_eq!(PublicationState::from_str("archived"), None);
    }
}
