//! Recorded reading paths and their transit encoding.
//!
//! ## Transit Format
//!
//! A path crosses session boundaries (reading → ending view, or a shared
//! link → replay) as a JSON array of entries, base64 URL-safe encoded
//! without padding:
//!
//! ```text
//! [{"part_id": "...", "choice_id": "...", "choice_text": "...",
//!   "timestamp": "...", "part_content": "..."}, ...]
//! ```
//!
//! Decoding never panics; any malformed payload yields a [`PathDecodeError`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::choice::ChoiceId;
use super::part::PartId;
use crate::canonical::canonical_hash_hex;

/// Error decoding a transit-encoded path.
#[derive(Debug, thiserror::Error)]
pub enum PathDecodeError {
    /// Payload is not valid URL-safe base64.
    #[error("Path payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    /// Decoded bytes are not a valid entry array.
    #[error("Path payload is not a valid entry list: {0}")]
    Structure(#[from] serde_json::Error),
}

/// One step of a reading pass.
///
/// Arrival entries carry `part_content`; choice entries carry `choice_id`
/// and `choice_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    /// Part the reader was on.
    pub part_id: PartId,
    /// Choice made on that part, if this is a choice entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_id: Option<ChoiceId>,
    /// Label of the choice as the reader saw it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_text: Option<String>,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Content of the part at arrival time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_content: Option<String>,
}

impl PathEntry {
    /// Entry for arriving at a part.
    pub fn arrival(part_id: PartId, content: impl Into<String>) -> Self {
        Self {
            part_id,
            choice_id: None,
            choice_text: None,
            timestamp: Utc::now(),
            part_content: Some(content.into()),
        }
    }

    /// Entry for a choice made on a part.
    pub fn choice(part_id: PartId, choice_id: ChoiceId, choice_text: impl Into<String>) -> Self {
        Self {
            part_id,
            choice_id: Some(choice_id),
            choice_text: Some(choice_text.into()),
            timestamp: Utc::now(),
            part_content: None,
        }
    }

    /// Whether this entry records a choice.
    pub fn is_choice(&self) -> bool {
        self.choice_id.is_some()
    }
}

/// Ordered, append-only trace of one reading pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryPath {
    entries: Vec<PathEntry>,
}

impl StoryPath {
    /// Create an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing entry list.
    pub fn from_entries(entries: Vec<PathEntry>) -> Self {
        Self { entries }
    }

    pub(crate) fn push(&mut self, entry: PathEntry) {
        self.entries.push(entry);
    }

    /// All entries in recording order.
    pub fn entries(&self) -> &[PathEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First part of the pass.
    pub fn first_part(&self) -> Option<PartId> {
        self.entries.first().map(|e| e.part_id)
    }

    /// Parts arrived at, in order.
    pub fn visits(&self) -> Vec<PartId> {
        self.entries
            .iter()
            .filter(|e| !e.is_choice())
            .map(|e| e.part_id)
            .collect()
    }

    /// Choice entries, in order.
    pub fn choice_entries(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.iter().filter(|e| e.is_choice())
    }

    /// Choices made, in order.
    pub fn choices(&self) -> Vec<ChoiceId> {
        self.choice_entries().filter_map(|e| e.choice_id).collect()
    }

    /// Timestamp-free fingerprint of the (part, choice) trace.
    ///
    /// Two passes over the same graph that visit the same parts and make
    /// the same choices share a fingerprint.
    pub fn trace_fingerprint(&self) -> String {
        let trace: Vec<(PartId, Option<ChoiceId>)> = self
            .entries
            .iter()
            .map(|e| (e.part_id, e.choice_id))
            .collect();
        canonical_hash_hex(&trace)
    }

    /// Encode for transit.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(&self.entries)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a transit payload. Trailing `=` padding is tolerated.
    pub fn decode(payload: &str) -> Result<Self, PathDecodeError> {
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim().trim_end_matches('='))?;
        let entries: Vec<PathEntry> = serde_json::from_slice(&bytes)?;
        Ok(Self { entries })
    }
}
