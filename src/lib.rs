//! # narrative-kernel
//!
//! Deterministic traversal, progress tracking, and replay for branching
//! interactive stories.
//!
//! A story is a directed graph of parts connected by ordered choices. The
//! kernel answers one question for every reader action:
//!
//! > Given where the reader is and what they picked, what do they see next?
//!
//! ## Core Contract
//!
//! 1. A [`ReadingSession`] presents one part at a time, resuming at the
//!    reader's saved position or at the story's start part
//! 2. Choices either lead to another part or end the story
//! 3. Every arrival and choice is recorded into a [`StoryPath`], which can be
//!    shared as an opaque string and replayed by a [`ReplayEngine`]
//!
//! ## Architecture
//!
//! ```text
//! ReadingSession ──> StoryGraph ──> StoryStore (Postgres or Memory)
//!       │        └─> resolve(choice)
//!       ├──> ProgressTracker ──> ProgressStore
//!       └──> PathRecorder ──> StoryPath ──encode──> shared payload
//!                                                       │
//!                                      ReplayEngine <──decode
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Choice ordering is canonical (ordering index, then id)
//! - Start part selection is canonical (flagged start, then creation time, then id)
//! - Same recorded path + unchanged graph → identical replay trace fingerprint

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod store;
pub mod graph;
pub mod resolver;
pub mod recorder;
pub mod progress;
pub mod session;
pub mod replay;
pub mod config;
pub mod error;
pub mod canonical;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    ChoiceId, PartId, PartNode, PathDecodeError, PathEntry, ProgressId, ProgressUpdate,
    PublicationState, ReaderId, Story, StoryChoice, StoryId, StoryPart, StoryPath, StoryProgress,
};
pub use store::{InMemoryStore, NarrativeStore, ProgressStore, StoryStore};
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
#[cfg(feature = "postgres")]
pub use store::postgres::NARRATIVE_SCHEMA;
pub use graph::{select_start_part, StoryGraph};
pub use resolver::{resolve, Resolution};
pub use recorder::PathRecorder;
pub use progress::ProgressTracker;
pub use session::{
    ReaderAction, ReadingSession, SessionMode, SessionOutcome, SessionParams, SessionState,
    UnavailableAction, Unavailability,
};
pub use replay::{decode_shared_path, open_shared_path, ReplayCancel, ReplayEngine, ReplayStatus, SharedPathEntry};
pub use config::EngineConfig;
pub use error::{NarrativeError, Result};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for serialized engine types (paths, progress, API payloads).
/// Increment on breaking changes to any schema type.
pub const NARRATIVE_SCHEMA_VERSION: &str = "1.0.0";
