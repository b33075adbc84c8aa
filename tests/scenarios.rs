//! End-to-end reading scenarios against the in-memory store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use narrative_kernel::{
    ChoiceId, InMemoryStore, NarrativeError, PartId, PublicationState, ReaderAction, ReaderId,
    ReadingSession, SessionParams, SessionState, Story, StoryChoice, StoryId, StoryPart,
    UnavailableAction, Unavailability,
};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

const AUTHOR: u128 = 1;
const READER: u128 = 2;

fn reader(n: u128) -> ReaderId {
    ReaderId::new(Uuid::from_u128(n))
}

fn part_id(n: u128) -> PartId {
    PartId::new(Uuid::from_u128(n))
}

fn choice_id(n: u128) -> ChoiceId {
    ChoiceId::new(Uuid::from_u128(n))
}

fn part(n: u128, story: StoryId, content: &str, created: i64) -> StoryPart {
    StoryPart::new(part_id(n), story, content, Utc.timestamp_opt(created, 0).unwrap())
}

fn store_with_story(state: PublicationState) -> (InMemoryStore, StoryId) {
    let store = InMemoryStore::new();
    let story = Story::new(StoryId::new(Uuid::from_u128(1000)), "The Door", reader(AUTHOR))
        .with_state(state)
        .with_genre("mystery");
    let id = story.id;
    store.add_story(story);
    (store, id)
}

/// Scenario S: A (start) --go--> B (ending).
fn scenario_s() -> (Arc<InMemoryStore>, StoryId) {
    let (store, story) = store_with_story(PublicationState::Published);
    store.add_part(part(10, story, "You stand before a door.", 1).as_start());
    store.add_part(part(11, story, "The room is empty. The end.", 2).as_ending());
    store.add_choice(StoryChoice::new(choice_id(20), part_id(10), "go", 0).leading_to(part_id(11)));
    (Arc::new(store), story)
}

/// Scenario S2: A (start, not an ending) has a terminating choice and a
/// continuing one.
fn scenario_s2() -> (Arc<InMemoryStore>, StoryId) {
    let (store, story) = store_with_story(PublicationState::Published);
    store.add_part(part(10, story, "A fork in the road.", 1).as_start());
    store.add_part(part(11, story, "The long way.", 2));
    store.add_choice(StoryChoice::new(choice_id(20), part_id(10), "walk on", 0).leading_to(part_id(11)));
    store.add_choice(StoryChoice::new(choice_id(21), part_id(10), "turn back", 1));
    (Arc::new(store), story)
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scenario_s_read_to_ending() {
    let (store, story) = scenario_s();
    let mut session = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();

    assert_eq!(session.current_part_id(), Some(part_id(10)));
    assert_eq!(
        session.available_actions(),
        vec![ReaderAction::Choose { choice_id: choice_id(20), text: "go".to_string() }]
    );

    session.choose(choice_id(20)).await.unwrap();
    assert_eq!(session.current_part_id(), Some(part_id(11)));
    assert_eq!(session.available_actions(), vec![ReaderAction::Finish]);

    let outcome = session.finish().await.unwrap().clone();
    assert!(outcome.completion_persisted);
    assert_eq!(outcome.path.visits(), vec![part_id(10), part_id(11)]);
    assert_eq!(outcome.path.choices(), vec![choice_id(20)]);
    assert_eq!(outcome.path.len(), 3);
    assert_eq!(outcome.path.entries()[1].choice_text.as_deref(), Some("go"));
    assert_eq!(
        outcome.path.entries()[0].part_content.as_deref(),
        Some("You stand before a door.")
    );

    let progress = store.progress_for(&reader(READER), &story).unwrap();
    assert_eq!(progress.current_part_id, Some(part_id(11)));
    assert!(progress.completed);
}

#[tokio::test]
async fn test_scenario_s2_terminating_choice_ends_story() {
    let (store, story) = scenario_s2();
    let mut session = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();

    let state = session.choose(choice_id(21)).await.unwrap();
    assert_eq!(state.name(), "ended");

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.path.visits(), vec![part_id(10)]);
    assert_eq!(outcome.path.choices(), vec![choice_id(21)]);
    assert!(outcome.path.entries().last().unwrap().is_choice());

    let progress = store.progress_for(&reader(READER), &story).unwrap();
    assert!(progress.completed);
    assert!(progress.current_part_id.is_none());
}

#[tokio::test]
async fn test_zero_part_story_offers_add_content_to_author_only() {
    let (store, story) = store_with_story(PublicationState::Published);
    let store = Arc::new(store);

    let as_author = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(AUTHOR), story))
        .await
        .unwrap();
    match as_author.state() {
        SessionState::Unavailable(reason) => {
            assert_eq!(*reason, Unavailability::NoContent { offer_add_content: true });
            assert_eq!(reason.actions(), vec![UnavailableAction::AddContent, UnavailableAction::Acknowledge]);
        }
        other => panic!("expected unavailable, got {}", other.name()),
    }

    let as_reader = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();
    match as_reader.state() {
        SessionState::Unavailable(reason) => {
            assert_eq!(reason.actions(), vec![UnavailableAction::Acknowledge]);
        }
        other => panic!("expected unavailable, got {}", other.name()),
    }
    assert!(as_reader.available_actions().is_empty());
}

#[tokio::test]
async fn test_draft_story_hidden_from_other_readers() {
    let (store, story) = store_with_story(PublicationState::Draft);
    store.add_part(part(10, story, "Secret draft.", 1));
    let store = Arc::new(store);

    let session = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();
    assert_eq!(session.state(), &SessionState::Unavailable(Unavailability::NotFound));
    assert_eq!(store.num_progress_records(), 0);

    let author = ReadingSession::start(store, SessionParams::reading(reader(AUTHOR), story))
        .await
        .unwrap();
    assert_eq!(author.current_part_id(), Some(part_id(10)));
}

#[tokio::test]
async fn test_missing_story_is_unavailable() {
    let (store, _) = scenario_s();
    let session = ReadingSession::start(store, SessionParams::reading(reader(READER), StoryId::random()))
        .await
        .unwrap();
    assert_eq!(session.state(), &SessionState::Unavailable(Unavailability::NotFound));
}

#[tokio::test]
async fn test_preview_leaves_no_progress() {
    let (store, story) = store_with_story(PublicationState::Draft);
    store.add_part(part(10, story, "A", 1).as_start());
    store.add_part(part(11, story, "B", 2).as_ending());
    store.add_choice(StoryChoice::new(choice_id(20), part_id(10), "go", 0).leading_to(part_id(11)));
    let store = Arc::new(store);

    let mut session = ReadingSession::start(Arc::clone(&store), SessionParams::preview(reader(AUTHOR), story))
        .await
        .unwrap();
    assert!(session.progress().is_none());

    session.choose(choice_id(20)).await.unwrap();
    let outcome = session.finish().await.unwrap();
    assert!(!outcome.completion_persisted);
    assert_eq!(outcome.path.visits(), vec![part_id(10), part_id(11)]);

    session.restart().await.unwrap();
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.num_progress_records(), 0);
}

#[tokio::test]
async fn test_zero_choice_node_offers_only_finish() {
    let (store, story) = store_with_story(PublicationState::Published);
    store.add_part(part(10, story, "A", 1).as_start());
    // Not flagged as an ending, but nothing leads out.
    store.add_part(part(11, story, "Dead end", 2));
    store.add_choice(StoryChoice::new(choice_id(20), part_id(10), "go", 0).leading_to(part_id(11)));
    let store = Arc::new(store);

    let mut session = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();
    session.choose(choice_id(20)).await.unwrap();

    assert_eq!(session.available_actions(), vec![ReaderAction::Finish]);
    assert!(session.finish().await.unwrap().completion_persisted);
}

#[tokio::test]
async fn test_ending_with_choices_still_finish_only() {
    let (store, story) = store_with_story(PublicationState::Published);
    store.add_part(part(10, story, "A", 1).as_start().as_ending());
    store.add_part(part(11, story, "B", 2));
    store.add_choice(StoryChoice::new(choice_id(20), part_id(10), "ignored", 0).leading_to(part_id(11)));

    let mut session = ReadingSession::start(Arc::new(store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();
    assert_eq!(session.available_actions(), vec![ReaderAction::Finish]);
    assert!(matches!(
        session.choose(choice_id(20)).await,
        Err(NarrativeError::InvalidAction(_))
    ));
}

#[tokio::test]
async fn test_reset_then_reenter_matches_new_reader() {
    let (store, story) = scenario_s();
    {
        let mut session = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(READER), story))
            .await
            .unwrap();
        session.choose(choice_id(20)).await.unwrap();
        session.finish().await.unwrap();
        session.restart().await.unwrap();
    }

    let returning = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();
    let newcomer = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(99), story))
        .await
        .unwrap();

    assert_eq!(returning.current_part_id(), newcomer.current_part_id());
    assert_eq!(returning.current_part_id(), Some(part_id(10)));
    assert!(!returning.progress().unwrap().completed);
}

#[tokio::test]
async fn test_earliest_flagged_start_wins() {
    let (store, story) = store_with_story(PublicationState::Published);
    store.add_part(part(10, story, "Unflagged but oldest", 1));
    store.add_part(part(12, story, "Later start", 5).as_start());
    store.add_part(part(11, story, "Earlier start", 3).as_start());

    let session = ReadingSession::start(Arc::new(store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();
    assert_eq!(session.current_part_id(), Some(part_id(11)));
}

#[tokio::test]
async fn test_unflagged_story_starts_at_earliest_part() {
    let (store, story) = store_with_story(PublicationState::Published);
    store.add_part(part(12, story, "Second", 2));
    store.add_part(part(11, story, "First", 1));

    let session = ReadingSession::start(Arc::new(store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();
    assert_eq!(session.current_part_id(), Some(part_id(11)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_entry_creates_one_progress_record() {
    let (store, story) = scenario_s();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let session = ReadingSession::start(store, SessionParams::reading(reader(READER), story))
                    .await
                    .unwrap();
                session.progress().unwrap().id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    assert_eq!(store.num_progress_records(), 1);
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_choices_presented_in_canonical_order() {
    let (store, story) = store_with_story(PublicationState::Published);
    store.add_part(part(10, story, "Hub", 1).as_start());
    store.add_part(part(11, story, "End", 2).as_ending());
    store.add_choice(StoryChoice::new(choice_id(32), part_id(10), "third", 2).leading_to(part_id(11)));
    store.add_choice(StoryChoice::new(choice_id(31), part_id(10), "second-b", 1).leading_to(part_id(11)));
    store.add_choice(StoryChoice::new(choice_id(30), part_id(10), "first", 0).leading_to(part_id(11)));
    store.add_choice(StoryChoice::new(choice_id(29), part_id(10), "second-a", 1).leading_to(part_id(11)));

    let session = ReadingSession::start(Arc::new(store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();
    let labels: Vec<_> = session
        .available_actions()
        .into_iter()
        .map(|a| match a {
            ReaderAction::Choose { text, .. } => text,
            ReaderAction::Finish => "finish".to_string(),
        })
        .collect();
    assert_eq!(labels, vec!["first", "second-a", "second-b", "third"]);
}

#[tokio::test]
async fn test_edited_content_does_not_change_recorded_path() {
    let (store, story) = scenario_s();
    let mut session = ReadingSession::start(Arc::clone(&store), SessionParams::reading(reader(READER), story))
        .await
        .unwrap();
    store.set_content(&part_id(10), "Rewritten opening.");
    session.choose(choice_id(20)).await.unwrap();

    let first = &session.path().entries()[0];
    assert_eq!(first.part_content.as_deref(), Some("You stand before a door."));
}
