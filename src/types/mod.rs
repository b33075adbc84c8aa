//! Core types for the narrative kernel.

mod id;

pub mod story;
pub mod part;
pub mod choice;
pub mod progress;
pub mod path;

pub use story::{StoryId, ReaderId, Story, PublicationState};
pub use part::{PartId, StoryPart, PartNode};
pub use choice::{ChoiceId, StoryChoice};
pub use progress::{ProgressId, StoryProgress, ProgressUpdate};
pub use path::{PathEntry, StoryPath, PathDecodeError};
