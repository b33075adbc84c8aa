//! Append-only recorder for the current reading pass.

use crate::types::{ChoiceId, PartId, PathEntry, StoryPath};

/// Records arrivals and choices as they happen.
///
/// Content is snapshotted at arrival so that exports and replays show what
/// the reader actually saw, even if the part is edited later.
#[derive(Debug, Clone, Default)]
pub struct PathRecorder {
    path: StoryPath,
}

impl PathRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record arriving at a part.
    pub fn record_arrival(&mut self, part_id: PartId, content_snapshot: impl Into<String>) {
        self.path.push(PathEntry::arrival(part_id, content_snapshot));
    }

    /// Record a choice made on a part.
    pub fn record_choice(&mut self, part_id: PartId, choice_id: ChoiceId, choice_text: impl Into<String>) {
        self.path.push(PathEntry::choice(part_id, choice_id, choice_text));
    }

    /// The path recorded so far.
    pub fn path(&self) -> &StoryPath {
        &self.path
    }

    /// Number of entries recorded.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Drop everything recorded, for a restart from the top.
    pub fn clear(&mut self) {
        self.path = StoryPath::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_records_in_order() {
        let a = PartId::new(Uuid::from_u128(1));
        let b = PartId::new(Uuid::from_u128(2));
        let go = ChoiceId::new(Uuid::from_u128(10));

        let mut recorder = PathRecorder::new();
        recorder.record_arrival(a, "A");
        recorder.record_choice(a, go, "go");
        recorder.record_arrival(b, "B");

        let entries = recorder.path().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].part_content.as_deref(), Some("A"));
        assert_eq!(entries[1].choice_id, Some(go));
        assert_eq!(entries[1].choice_text.as_deref(), Some("go"));
        assert_eq!(entries[2].part_id, b);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut recorder = PathRecorder::new();
        for n in 0..5u128 {
            recorder.record_arrival(PartId::new(Uuid::from_u128(n)), "x");
        }
        let entries = recorder.path().entries();
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_clear() {
        let mut recorder = PathRecorder::new();
        recorder.record_arrival(PartId::random(), "x");
        recorder.clear();
        assert!(recorder.is_empty());
    }
}
