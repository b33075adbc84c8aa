//! Reading session controller.
//!
//! Drives one reader through one story:
//!
//! ```text
//! Initializing ─┬─> Presenting(node) ──choose──> Presenting(next)
//!               │        │    │
//!               │        │    └─terminating choice─┐
//!               │        └──finish (finish-only)───┴─> Ended
//!               └─> Unavailable
//! ```
//!
//! Choosing and finishing happen inside [`ReadingSession::choose`] and
//! [`ReadingSession::finish`]. Both take `&mut self`, so at most one
//! mutating operation is in flight per session. A failed progress write
//! returns [`NarrativeError::PersistenceFailure`] and leaves the session
//! exactly where it was, ready for the reader to retry.

use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::error::{NarrativeError, Result};
use crate::graph::StoryGraph;
use crate::progress::ProgressTracker;
use crate::recorder::PathRecorder;
use crate::resolver::{resolve, Resolution};
use crate::store::NarrativeStore;
use crate::types::{
    ChoiceId, PartId, PartNode, ReaderId, Story, StoryChoice, StoryId, StoryPath, StoryProgress,
};

/// Whether a session persists reader progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Normal reading; progress is persisted.
    #[default]
    Reading,
    /// Author preview; progress is never touched.
    Preview,
}

impl SessionMode {
    /// Whether this is a preview session.
    pub fn is_preview(&self) -> bool {
        matches!(self, Self::Preview)
    }
}

/// Explicit session inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Who is reading.
    pub reader_id: ReaderId,
    /// What they are reading.
    pub story_id: StoryId,
    /// Reading or preview.
    pub mode: SessionMode,
}

impl SessionParams {
    /// Parameters for a normal reading session.
    pub fn reading(reader_id: ReaderId, story_id: StoryId) -> Self {
        Self { reader_id, story_id, mode: SessionMode::Reading }
    }

    /// Parameters for an author preview.
    pub fn preview(reader_id: ReaderId, story_id: StoryId) -> Self {
        Self { reader_id, story_id, mode: SessionMode::Preview }
    }
}

/// Why a story cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Unavailability {
    /// Story is missing or hidden from this reader.
    NotFound,
    /// Story exists but has no parts.
    NoContent {
        /// The requester is the author and may add content.
        offer_add_content: bool,
    },
}

/// Action offered while a story is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableAction {
    /// Open the editor to add parts.
    AddContent,
    /// Dismiss and go back.
    Acknowledge,
}

impl Unavailability {
    /// Actions to offer.
    pub fn actions(&self) -> Vec<UnavailableAction> {
        match self {
            Self::NoContent { offer_add_content: true } => {
                vec![UnavailableAction::AddContent, UnavailableAction::Acknowledge]
            }
            _ => vec![UnavailableAction::Acknowledge],
        }
    }

    /// Message to show.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "This story is not available.",
            Self::NoContent { offer_add_content: true } => {
                "This story has no content yet. Add a first part to get started."
            }
            Self::NoContent { offer_add_content: false } => {
                "This story is not available yet. Check back later."
            }
        }
    }
}

/// Action available to the reader on the presented node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReaderAction {
    /// Pick a choice.
    Choose {
        /// Choice identifier.
        choice_id: ChoiceId,
        /// Choice label.
        text: String,
    },
    /// End the story here.
    Finish,
}

/// Result of a finished reading pass, handed to whatever comes next
/// (rating view, or back to the editor for previews).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// Story that was read.
    pub story_id: StoryId,
    /// Session mode.
    pub mode: SessionMode,
    /// The complete recorded pass.
    pub path: StoryPath,
    /// Whether completion was written to the progress store.
    pub completion_persisted: bool,
}

/// Session state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Not yet initialized.
    Initializing,
    /// A node is on screen.
    Presenting(PartNode),
    /// The story was finished. Terminal.
    Ended(SessionOutcome),
    /// The story cannot be read. Terminal.
    Unavailable(Unavailability),
}

impl SessionState {
    /// Short state name for logs and API responses.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Presenting(_) => "presenting",
            Self::Ended(_) => "ended",
            Self::Unavailable(_) => "unavailable",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended(_) | Self::Unavailable(_))
    }
}

/// Drives a single reader through a single story.
pub struct ReadingSession<S: NarrativeStore> {
    params: SessionParams,
    graph: StoryGraph<S>,
    progress: ProgressTracker<S>,
    recorder: PathRecorder,
    story: Option<Story>,
    state: SessionState,
}

impl<S: NarrativeStore> ReadingSession<S> {
    /// Start a session: load the story, load or create progress, and
    /// present the resume point or the start node.
    ///
    /// Missing stories and stories without parts are not errors; they
    /// produce a session in the [`SessionState::Unavailable`] state.
    pub async fn start(store: Arc<S>, params: SessionParams) -> Result<Self> {
        let mut session = Self {
            params,
            graph: StoryGraph::new(Arc::clone(&store)),
            progress: ProgressTracker::new(store, params.mode),
            recorder: PathRecorder::new(),
            story: None,
            state: SessionState::Initializing,
        };
        session.initialize().await?;
        Ok(session)
    }

    async fn initialize(&mut self) -> Result<()> {
        let SessionParams { reader_id, story_id, mode } = self.params;

        let story = match self.graph.load_story(story_id, reader_id).await {
            Ok(story) => story,
            Err(NarrativeError::StoryNotFound(_)) => {
                tracing::info!(story_id = %story_id, reader_id = %reader_id, "Story not visible to reader");
                self.state = SessionState::Unavailable(Unavailability::NotFound);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let is_author = story.is_authored_by(&reader_id);
        self.story = Some(story);

        let resume_at = self.progress
            .get_or_create(reader_id, story_id)
            .await?
            .and_then(|p| p.current_part_id);

        let resumed = match resume_at {
            Some(part_id) => match self.graph.load_story_node(story_id, part_id).await {
                Ok(node) => Some(node),
                Err(NarrativeError::PartNotFound(_)) => {
                    tracing::warn!(
                        story_id = %story_id,
                        part_id = %part_id,
                        "Saved position no longer exists in this story, restarting from the top"
                    );
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let node = match resumed {
            Some(node) => node,
            None => match self.graph.resolve_start_node(story_id).await? {
                Some(start) => self.graph.load_story_node(story_id, start).await?,
                None => {
                    tracing::info!(story_id = %story_id, is_author, "Story has no parts");
                    self.state = SessionState::Unavailable(Unavailability::NoContent {
                        offer_add_content: is_author,
                    });
                    return Ok(());
                }
            },
        };

        tracing::info!(
            story_id = %story_id,
            reader_id = %reader_id,
            mode = ?mode,
            part_id = %node.id(),
            resumed = resume_at.is_some(),
            "Reading session started"
        );

        self.present(node);
        Ok(())
    }

    fn present(&mut self, node: PartNode) {
        self.recorder.record_arrival(node.id(), node.content());
        self.state = SessionState::Presenting(node);
    }

    /// Session inputs.
    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The story, once loaded.
    pub fn story(&self) -> Option<&Story> {
        self.story.as_ref()
    }

    /// Whether the reader wrote this story.
    pub fn is_author(&self) -> bool {
        self.story
            .as_ref()
            .map(|s| s.is_authored_by(&self.params.reader_id))
            .unwrap_or(false)
    }

    /// Progress record (absent in preview).
    pub fn progress(&self) -> Option<&StoryProgress> {
        self.progress.record()
    }

    /// Path recorded so far.
    pub fn path(&self) -> &StoryPath {
        self.recorder.path()
    }

    /// Node on screen, if presenting.
    pub fn current_node(&self) -> Option<&PartNode> {
        match &self.state {
            SessionState::Presenting(node) => Some(node),
            _ => None,
        }
    }

    /// Outcome, once ended.
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        match &self.state {
            SessionState::Ended(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Actions available on the presented node.
    ///
    /// Finish-only nodes offer exactly `[Finish]`; other nodes offer their
    /// choices in canonical order. Empty outside `Presenting`.
    pub fn available_actions(&self) -> Vec<ReaderAction> {
        match &self.state {
            SessionState::Presenting(node) if node.is_finish_only() => vec![ReaderAction::Finish],
            SessionState::Presenting(node) => node.choices
                .iter()
                .map(|c| ReaderAction::Choose { choice_id: c.id, text: c.text.clone() })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Pick a choice on the presented node.
    pub async fn choose(&mut self, choice_id: ChoiceId) -> Result<&SessionState> {
        let choice = self.choosable(choice_id)?;

        match resolve(&choice) {
            Resolution::Continue { next_part_id } => {
                let next = self.graph.load_story_node(self.params.story_id, next_part_id).await?;
                self.progress.advance(next_part_id).await?;
                self.recorder.record_choice(choice.part_id, choice.id, choice.text.as_str());

                tracing::debug!(
                    story_id = %self.params.story_id,
                    from_part_id = %choice.part_id,
                    choice_id = %choice.id,
                    to_part_id = %next_part_id,
                    "Choice applied"
                );
                self.present(next);
            }
            Resolution::Terminate => {
                tracing::debug!(
                    story_id = %self.params.story_id,
                    part_id = %choice.part_id,
                    choice_id = %choice.id,
                    "Terminating choice selected"
                );
                self.complete(Some(&choice)).await?;
            }
        }

        Ok(&self.state)
    }

    /// Finish the story from a finish-only node.
    pub async fn finish(&mut self) -> Result<&SessionOutcome> {
        match &self.state {
            SessionState::Presenting(node) if node.is_finish_only() => {}
            SessionState::Presenting(node) => {
                return Err(NarrativeError::InvalidAction(format!(
                    "part {} has choices and is not an ending",
                    node.id()
                )));
            }
            other => return Err(Self::not_presenting(other)),
        }

        self.complete(None).await?;
        self.outcome()
            .ok_or_else(|| NarrativeError::InvalidAction("session did not end".to_string()))
    }

    /// Restart from the top: reset progress, clear the path, and present
    /// the start node.
    pub async fn restart(&mut self) -> Result<&SessionState> {
        match &self.state {
            SessionState::Presenting(_) | SessionState::Ended(_) => {}
            other => return Err(Self::not_presenting(other)),
        }

        let story_id = self.params.story_id;
        let start = match self.graph.resolve_start_node(story_id).await? {
            Some(start) => self.graph.load_story_node(story_id, start).await?,
            None => {
                tracing::warn!(story_id = %story_id, "Story lost all its parts, cannot restart");
                return Err(NarrativeError::GraphIncomplete(story_id));
            }
        };
        self.progress.reset().await?;
        self.recorder.clear();

        tracing::info!(story_id = %story_id, part_id = %start.id(), "Reading session restarted");
        self.present(start);
        Ok(&self.state)
    }

    async fn complete(&mut self, terminating: Option<&StoryChoice>) -> Result<()> {
        self.progress.complete().await?;
        if let Some(choice) = terminating {
            self.recorder.record_choice(choice.part_id, choice.id, choice.text.as_str());
        }

        let outcome = SessionOutcome {
            story_id: self.params.story_id,
            mode: self.params.mode,
            path: self.recorder.path().clone(),
            completion_persisted: !self.params.mode.is_preview(),
        };

        tracing::info!(
            story_id = %self.params.story_id,
            reader_id = %self.params.reader_id,
            mode = ?self.params.mode,
            path_len = outcome.path.len(),
            "Story finished"
        );

        self.state = SessionState::Ended(outcome);
        Ok(())
    }

    fn choosable(&self, choice_id: ChoiceId) -> Result<StoryChoice> {
        let node = match &self.state {
            SessionState::Presenting(node) => node,
            other => return Err(Self::not_presenting(other)),
        };
        if node.is_finish_only() {
            return Err(NarrativeError::InvalidAction(format!(
                "part {} only offers finish",
                node.id()
            )));
        }
        node.choice(&choice_id)
            .cloned()
            .ok_or_else(|| NarrativeError::InvalidAction(format!(
                "choice {choice_id} is not available on part {}",
                node.id()
            )))
    }

    fn not_presenting(state: &SessionState) -> NarrativeError {
        NarrativeError::InvalidAction(format!("session is {}", state.name()))
    }

    /// Part the session is presenting, if any.
    pub fn current_part_id(&self) -> Option<PartId> {
        self.current_node().map(PartNode::id)
    }
}
