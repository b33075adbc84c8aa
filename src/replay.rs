//! Deterministic replay of a recorded reading pass.
//!
//! The replay engine walks the live graph the same way a reading session
//! does, but instead of waiting for the reader it applies the next recorded
//! choice after a fixed delay. It only needs a [`StoryStore`], so it cannot
//! touch reader progress.
//!
//! ## Desync
//!
//! If the next recorded choice was made on a different part, or is no
//! longer among the current part's choices (the story was edited since the
//! recording), replay stops in a manual state and exposes the current node.
//! The caller may continue with [`ReplayEngine::choose`].

use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::error::{NarrativeError, Result};
use crate::graph::StoryGraph;
use crate::recorder::PathRecorder;
use crate::resolver::{resolve, Resolution};
use crate::session::{ReadingSession, SessionParams};
use crate::store::{NarrativeStore, StoryStore};
use crate::types::{ChoiceId, PartId, PartNode, PathEntry, StoryChoice, StoryId, StoryPath};

/// Replay progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplayStatus {
    /// Auto-applying recorded choices.
    Playing,
    /// A recorded choice could not be applied; manual mode.
    Desynced {
        /// The recorded choice that failed, if the entry had one.
        recorded_choice: Option<ChoiceId>,
    },
    /// The recording ended before reaching an ending; manual mode.
    Exhausted,
    /// Reached an ending.
    Finished,
    /// Stopped by the caller.
    Cancelled,
}

impl ReplayStatus {
    /// Short status name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Desynced { .. } => "desynced",
            Self::Exhausted => "exhausted",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the reader is expected to pick choices by hand.
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Desynced { .. } | Self::Exhausted)
    }
}

/// Cancellation handle for a running replay.
///
/// Cloning shares the handle. Once cancelled, a replay never applies a
/// pending auto-advance.
#[derive(Debug, Clone)]
pub struct ReplayCancel {
    tx: Arc<watch::Sender<bool>>,
}

impl ReplayCancel {
    /// Create an untriggered handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel the replay.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for ReplayCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-walks a recorded path against the live graph.
pub struct ReplayEngine<S: StoryStore> {
    graph: StoryGraph<S>,
    /// Story of the first recorded part; replay never leaves it.
    story_id: StoryId,
    recorded: StoryPath,
    /// Recorded choice entries, in order.
    pending: Vec<PathEntry>,
    cursor: usize,
    node: PartNode,
    /// Index of the current arrival within the recording.
    visit: usize,
    status: ReplayStatus,
    delay: Duration,
    trace: PathRecorder,
}

impl<S: StoryStore> ReplayEngine<S> {
    /// Load the first recorded part and get ready to play.
    pub async fn start(store: Arc<S>, recorded: StoryPath, config: &EngineConfig) -> Result<Self> {
        let first = recorded
            .first_part()
            .ok_or_else(|| NarrativeError::InvalidAction("cannot replay an empty path".to_string()))?;

        let graph = StoryGraph::new(store);
        let node = graph.load_node(first).await?;
        let pending: Vec<PathEntry> = recorded.choice_entries().cloned().collect();

        let mut trace = PathRecorder::new();
        trace.record_arrival(node.id(), node.content());

        let status = if node.is_finish_only() {
            ReplayStatus::Finished
        } else {
            ReplayStatus::Playing
        };

        tracing::info!(
            part_id = %first,
            recorded_entries = recorded.len(),
            recorded_choices = pending.len(),
            delay_ms = config.replay_delay.as_millis() as u64,
            "Replay started"
        );

        Ok(Self {
            graph,
            story_id: node.part.story_id,
            recorded,
            pending,
            cursor: 0,
            node,
            visit: 0,
            status,
            delay: config.replay_delay,
            trace,
        })
    }

    /// Current status.
    pub fn status(&self) -> &ReplayStatus {
        &self.status
    }

    /// Node currently shown.
    pub fn node(&self) -> &PartNode {
        &self.node
    }

    /// The recording being replayed.
    pub fn recorded(&self) -> &StoryPath {
        &self.recorded
    }

    /// The path walked by this replay so far.
    pub fn trace(&self) -> &StoryPath {
        self.trace.path()
    }

    /// Content to show for the current node.
    ///
    /// Prefers the snapshot taken when the original reader arrived here, so
    /// the replay shows what they saw even if the part was edited since.
    pub fn display_content(&self) -> &str {
        self.recorded
            .entries()
            .iter()
            .filter(|e| !e.is_choice())
            .nth(self.visit)
            .filter(|e| e.part_id == self.node.id())
            .and_then(|e| e.part_content.as_deref())
            .unwrap_or_else(|| self.node.content())
    }

    /// The desync as an error value, when replay stopped on one.
    pub fn desync(&self) -> Option<NarrativeError> {
        match self.status {
            ReplayStatus::Desynced { recorded_choice } => Some(NarrativeError::ReplayDesync {
                part_id: self.node.id(),
                choice_id: recorded_choice,
            }),
            _ => None,
        }
    }

    /// Apply the next recorded choice immediately.
    pub async fn step(&mut self) -> Result<&ReplayStatus> {
        if self.status != ReplayStatus::Playing {
            return Err(NarrativeError::InvalidAction(format!("replay is {}", self.status.name())));
        }

        let Some(entry) = self.pending.get(self.cursor) else {
            tracing::info!(part_id = %self.node.id(), "Recording exhausted before an ending");
            self.status = ReplayStatus::Exhausted;
            return Ok(&self.status);
        };

        let recorded_choice = entry.choice_id;
        let live = if entry.part_id == self.node.id() {
            recorded_choice.and_then(|id| self.node.choice(&id).cloned())
        } else {
            None
        };

        match live {
            Some(choice) => {
                if self.apply(choice).await? {
                    self.cursor += 1;
                } else {
                    self.stop_desynced(recorded_choice);
                }
            }
            None => self.stop_desynced(recorded_choice),
        }
        Ok(&self.status)
    }

    /// Auto-play until an ending, a desync, or cancellation.
    ///
    /// Waits the configured delay before each recorded choice. Cancellation
    /// also interrupts a step whose store load is still in flight; a step
    /// commits nothing until its load completes.
    pub async fn run(&mut self, cancel: &ReplayCancel) -> Result<&ReplayStatus> {
        while self.status == ReplayStatus::Playing {
            if cancel.is_cancelled() {
                break;
            }
            let stepped = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                stepped = async {
                    tokio::time::sleep(self.delay).await;
                    self.step().await.map(|_| ())
                } => Some(stepped),
            };
            match stepped {
                Some(result) => result?,
                None => break,
            }
        }
        if self.status == ReplayStatus::Playing {
            tracing::info!(part_id = %self.node.id(), "Replay cancelled");
            self.status = ReplayStatus::Cancelled;
        }
        Ok(&self.status)
    }

    /// Pick a choice by hand after replay stopped in manual mode.
    pub async fn choose(&mut self, choice_id: ChoiceId) -> Result<&ReplayStatus> {
        if !self.status.is_manual() {
            return Err(NarrativeError::InvalidAction(format!("replay is {}", self.status.name())));
        }
        if self.node.is_finish_only() {
            return Err(NarrativeError::InvalidAction(format!(
                "part {} only offers finish",
                self.node.id()
            )));
        }
        let choice = self.node
            .choice(&choice_id)
            .cloned()
            .ok_or_else(|| NarrativeError::InvalidAction(format!(
                "choice {choice_id} is not available on part {}",
                self.node.id()
            )))?;

        if !self.apply(choice).await? {
            return Err(NarrativeError::PartNotFound(self.node.id()));
        }
        Ok(&self.status)
    }

    /// Apply a choice. Returns `false` if its destination no longer exists.
    async fn apply(&mut self, choice: StoryChoice) -> Result<bool> {
        match resolve(&choice) {
            Resolution::Continue { next_part_id } => {
                let next = match self.graph.load_story_node(self.story_id, next_part_id).await {
                    Ok(node) => node,
                    Err(NarrativeError::PartNotFound(_)) => return Ok(false),
                    Err(e) => return Err(e),
                };
                self.trace.record_choice(choice.part_id, choice.id, choice.text.as_str());
                self.trace.record_arrival(next.id(), next.content());
                self.visit += 1;

                tracing::debug!(
                    from_part_id = %choice.part_id,
                    choice_id = %choice.id,
                    to_part_id = %next_part_id,
                    "Replay advanced"
                );

                if next.is_finish_only() {
                    self.status = ReplayStatus::Finished;
                }
                self.node = next;
            }
            Resolution::Terminate => {
                self.trace.record_choice(choice.part_id, choice.id, choice.text.as_str());
                self.status = ReplayStatus::Finished;
            }
        }
        Ok(true)
    }

    fn stop_desynced(&mut self, recorded_choice: Option<ChoiceId>) {
        tracing::warn!(
            part_id = %self.node.id(),
            recorded_choice = ?recorded_choice,
            "Recorded choice not available, switching replay to manual"
        );
        self.status = ReplayStatus::Desynced { recorded_choice };
    }

    /// Part currently shown.
    pub fn current_part_id(&self) -> PartId {
        self.node.id()
    }
}

/// Decode a transit payload produced by [`StoryPath::encode`].
pub fn decode_shared_path(payload: &str) -> Result<StoryPath> {
    Ok(StoryPath::decode(payload)?)
}

/// What opening a shared path produced.
pub enum SharedPathEntry<S: NarrativeStore> {
    /// The path decoded and its first part is readable: replay it.
    Replay(ReplayEngine<S>),
    /// The payload was unusable: read the story normally instead.
    Fresh(ReadingSession<S>),
}

/// Open a transit-encoded path for `params.story_id`.
///
/// Malformed payloads, empty paths, paths starting on a missing part, and
/// paths belonging to another story all fall back to a fresh reading
/// session. Stories hidden from the reader also fall back, which yields an
/// unavailable session.
pub async fn open_shared_path<S: NarrativeStore>(
    store: Arc<S>,
    params: SessionParams,
    payload: &str,
    config: &EngineConfig,
) -> Result<SharedPathEntry<S>> {
    match decode_shared_path(payload) {
        Ok(path) if !path.is_empty() => {
            let graph = StoryGraph::new(Arc::clone(&store));
            match graph.load_story(params.story_id, params.reader_id).await {
                Ok(_) => match ReplayEngine::start(Arc::clone(&store), path, config).await {
                    Ok(engine) if engine.node().part.story_id == params.story_id => {
                        return Ok(SharedPathEntry::Replay(engine));
                    }
                    Ok(engine) => tracing::warn!(
                        story_id = %params.story_id,
                        part_id = %engine.current_part_id(),
                        "Shared path belongs to another story, starting fresh"
                    ),
                    Err(e) if e.is_not_found() => tracing::warn!(
                        story_id = %params.story_id,
                        error = %e,
                        "Shared path starts on a missing part, starting fresh"
                    ),
                    Err(e) => return Err(e),
                },
                Err(NarrativeError::StoryNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(_) => tracing::warn!(story_id = %params.story_id, "Shared path is empty, starting fresh"),
        Err(e) => tracing::warn!(
            story_id = %params.story_id,
            code = e.code(),
            error = %e,
            "Shared path could not be decoded, starting fresh"
        ),
    }

    ReadingSession::start(store, params).await.map(SharedPathEntry::Fresh)
}
