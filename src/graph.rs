//! Read-only story graph accessor.
//!
//! Wraps a [`StoryStore`] and turns raw records into validated
//! [`PartNode`]s: the part plus its choices in canonical order.

use std::sync::Arc;

use crate::error::{NarrativeError, Result};
use crate::store::StoryStore;
use crate::types::{PartId, PartNode, ReaderId, Story, StoryId, StoryPart};

/// Pick the entry part of a story from its parts.
///
/// Policy, in priority order:
/// 1. the earliest-created part flagged `is_start` (ties by id)
/// 2. the earliest-created part (ties by id)
/// 3. `None` when there are no parts
pub fn select_start_part<'a, I>(parts: I) -> Option<&'a StoryPart>
where
    I: IntoIterator<Item = &'a StoryPart>,
{
    parts.into_iter().min_by(|a, b| {
        b.is_start
            .cmp(&a.is_start)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    })
}

/// Read-only view over a story graph.
pub struct StoryGraph<S: StoryStore> {
    store: Arc<S>,
}

impl<S: StoryStore> Clone for StoryGraph<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S: StoryStore> StoryGraph<S> {
    /// Create an accessor over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load a story as seen by `viewer`.
    ///
    /// Hidden stories are indistinguishable from missing ones.
    pub async fn load_story(&self, story_id: StoryId, viewer: ReaderId) -> Result<Story> {
        let story = self.store.fetch_story(&story_id, &viewer).await
            .map_err(NarrativeError::from_store)?
            .ok_or(NarrativeError::StoryNotFound(story_id))?;

        if story.id != story_id {
            return Err(NarrativeError::MalformedRecord(format!(
                "requested story {story_id}, store returned {}",
                story.id
            )));
        }
        Ok(story)
    }

    /// Load a part with its ordered choices.
    pub async fn load_node(&self, part_id: PartId) -> Result<PartNode> {
        let part = self.store.fetch_part(&part_id).await
            .map_err(NarrativeError::from_store)?
            .ok_or(NarrativeError::PartNotFound(part_id))?;

        if part.id != part_id {
            return Err(NarrativeError::MalformedRecord(format!(
                "requested part {part_id}, store returned {}",
                part.id
            )));
        }

        let choices = self.store.fetch_choices(&part_id).await
            .map_err(NarrativeError::from_store)?;

        if let Some(stray) = choices.iter().find(|c| c.part_id != part_id) {
            return Err(NarrativeError::MalformedRecord(format!(
                "choice {} belongs to part {}, not {part_id}",
                stray.id, stray.part_id
            )));
        }

        tracing::trace!(
            part_id = %part_id,
            choice_count = choices.len(),
            is_ending = part.is_ending,
            "Loaded story node"
        );

        Ok(PartNode::new(part, choices))
    }

    /// Load a part that must belong to `story_id`.
    ///
    /// A part from another story is reported as
    /// [`NarrativeError::PartNotFound`], indistinguishable from a missing one.
    pub async fn load_story_node(&self, story_id: StoryId, part_id: PartId) -> Result<PartNode> {
        let node = self.load_node(part_id).await?;
        if node.part.story_id != story_id {
            tracing::warn!(
                story_id = %story_id,
                part_id = %part_id,
                owner_story_id = %node.part.story_id,
                "Part belongs to another story"
            );
            return Err(NarrativeError::PartNotFound(part_id));
        }
        Ok(node)
    }

    /// Resolve the entry part of a story, if it has any parts.
    pub async fn resolve_start_node(&self, story_id: StoryId) -> Result<Option<PartId>> {
        let start = self.store.fetch_start_part(&story_id).await
            .map_err(NarrativeError::from_store)?;

        match start {
            Some(part) if part.story_id != story_id => Err(NarrativeError::MalformedRecord(format!(
                "start part {} belongs to story {}, not {story_id}",
                part.id, part.story_id
            ))),
            Some(part) => Ok(Some(part.id)),
            None => Ok(None),
        }
    }
}
