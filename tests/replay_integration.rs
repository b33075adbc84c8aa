//! Integration tests for shared-path transit and replay.
//!
//! Tests cover:
//! - Recording a pass with a reading session and replaying it
//! - Transit encoding across the share boundary
//! - Desync after the story is edited
//! - Random story graphs (proptest)

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use narrative_kernel::{
    open_shared_path, ChoiceId, EngineConfig, InMemoryStore, NarrativeError, PartId,
    PublicationState, ReaderId, ReadingSession, ReplayCancel, ReplayEngine, ReplayStatus,
    SessionParams, SharedPathEntry, Story, StoryChoice, StoryId, StoryPart, StoryPath,
};
use uuid::Uuid;

fn instant() -> EngineConfig {
    EngineConfig::default().with_replay_delay(Duration::ZERO)
}

fn part_id(n: u128) -> PartId {
    PartId::new(Uuid::from_u128(n))
}

fn choice_id(n: u128) -> ChoiceId {
    ChoiceId::new(Uuid::from_u128(n))
}

/// Shape of a generated story: for each non-final part, a list of choices,
/// each either leading forward (`Some(offset)`) or terminating (`None`).
#[derive(Debug, Clone)]
struct StoryShape {
    choices: Vec<Vec<Option<u8>>>,
}

/// Build a forward-only story from a shape. Part `n` (the last) is an ending.
fn build_story(shape: &StoryShape) -> (Arc<InMemoryStore>, StoryId) {
    let store = InMemoryStore::new();
    let story = Story::new(StoryId::new(Uuid::from_u128(9_000)), "Generated", ReaderId::new(Uuid::from_u128(1)))
        .with_state(PublicationState::Published);
    let story_id = story.id;
    store.add_story(story);

    let n = shape.choices.len() as u128 + 1;
    for i in 1..=n {
        let mut part = StoryPart::new(part_id(i), story_id, format!("Part {i}"), Utc.timestamp_opt(i as i64, 0).unwrap());
        if i == 1 {
            part = part.as_start();
        }
        if i == n {
            part = part.as_ending();
        }
        store.add_part(part);
    }

    for (idx, choices) in shape.choices.iter().enumerate() {
        let from = idx as u128 + 1;
        for (k, target) in choices.iter().enumerate() {
            let id = choice_id(from * 100 + k as u128);
            let choice = StoryChoice::new(id, part_id(from), format!("choice {from}.{k}"), k as i32);
            let choice = match target {
                Some(offset) => choice.leading_to(part_id((from + 1 + *offset as u128).min(n))),
                None => choice,
            };
            store.add_choice(choice);
        }
    }

    (Arc::new(store), story_id)
}

/// Walk the story, picking choices by `picks`, until it ends.
async fn walk(store: Arc<InMemoryStore>, story_id: StoryId, picks: &[usize]) -> StoryPath {
    let mut session = ReadingSession::start(store, SessionParams::preview(ReaderId::random(), story_id))
        .await
        .unwrap();
    let mut picks = picks.iter().cycle();

    loop {
        let node = session.current_node().unwrap().clone();
        if node.is_finish_only() {
            return session.finish().await.unwrap().path.clone();
        }
        let pick = picks.next().copied().unwrap_or(0) % node.choices.len();
        session.choose(node.choices[pick].id).await.unwrap();
        if let Some(outcome) = session.outcome() {
            return outcome.path.clone();
        }
    }
}

fn story_shape() -> impl Strategy<Value = StoryShape> {
    prop::collection::vec(
        prop::collection::vec(prop::option::weighted(0.85, 0u8..3), 1..4),
        1..12,
    )
    .prop_map(|choices| StoryShape { choices })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Replaying an unmodified graph reproduces the recorded visits and
    /// choices exactly.
    #[test]
    fn prop_replay_reproduces_recording(
        shape in story_shape(),
        picks in prop::collection::vec(0usize..4, 1..8),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let (visits, choices, replayed_fp, recorded_fp, status) = rt.block_on(async {
            let (store, story_id) = build_story(&shape);
            let recorded = walk(Arc::clone(&store), story_id, &picks).await;

            let shared = recorded.encode().unwrap();
            let decoded = StoryPath::decode(&shared).unwrap();

            let mut engine = ReplayEngine::start(store, decoded, &instant()).await.unwrap();
            let status = *engine.run(&ReplayCancel::new()).await.unwrap();
            (
                (recorded.visits(), engine.trace().visits()),
                (recorded.choices(), engine.trace().choices()),
                engine.trace().trace_fingerprint(),
                recorded.trace_fingerprint(),
                status,
            )
        });

        prop_assert_eq!(status, ReplayStatus::Finished);
        prop_assert_eq!(visits.0, visits.1);
        prop_assert_eq!(choices.0, choices.1);
        prop_assert_eq!(replayed_fp, recorded_fp);
    }

    /// Arbitrary strings never panic the decoder.
    #[test]
    fn prop_decode_never_panics(payload in ".{0,200}") {
        let _ = StoryPath::decode(&payload);
    }
}

#[tokio::test]
async fn test_shared_path_replays_for_another_reader() {
    let shape = StoryShape { choices: vec![vec![Some(0), None], vec![Some(0)]] };
    let (store, story_id) = build_story(&shape);
    let recorded = walk(Arc::clone(&store), story_id, &[0, 0]).await;
    let shared = recorded.encode().unwrap();

    let entry = open_shared_path(
        Arc::clone(&store),
        SessionParams::reading(ReaderId::random(), story_id),
        &format!("  {shared}\n"),
        &instant(),
    )
    .await
    .unwrap();

    let SharedPathEntry::Replay(mut engine) = entry else {
        panic!("expected replay");
    };
    engine.run(&ReplayCancel::new()).await.unwrap();
    assert_eq!(engine.status(), &ReplayStatus::Finished);
    assert_eq!(engine.trace().visits(), vec![part_id(1), part_id(2), part_id(3)]);
    assert_eq!(store.num_progress_records(), 0);
}

#[tokio::test]
async fn test_edited_story_desyncs_then_continues_manually() {
    let shape = StoryShape { choices: vec![vec![Some(0)], vec![Some(0), Some(0)]] };
    let (store, story_id) = build_story(&shape);
    // 1 -> 2 via choice 100, then 2 -> 3 via choice 200.
    let recorded = walk(Arc::clone(&store), story_id, &[0, 0]).await;
    assert_eq!(recorded.choices(), vec![choice_id(100), choice_id(200)]);

    // The author replaces the recorded choice on part 2.
    let edited = InMemoryStore::new();
    edited.add_story(Story::new(story_id, "Generated", ReaderId::new(Uuid::from_u128(1))).with_state(PublicationState::Published));
    edited.add_part(StoryPart::new(part_id(1), story_id, "Part 1", Utc.timestamp_opt(1, 0).unwrap()).as_start());
    edited.add_part(StoryPart::new(part_id(2), story_id, "Part 2", Utc.timestamp_opt(2, 0).unwrap()));
    edited.add_part(StoryPart::new(part_id(3), story_id, "Part 3", Utc.timestamp_opt(3, 0).unwrap()).as_ending());
    edited.add_choice(StoryChoice::new(choice_id(100), part_id(1), "choice 1.0", 0).leading_to(part_id(2)));
    edited.add_choice(StoryChoice::new(choice_id(250), part_id(2), "new way", 0).leading_to(part_id(3)));

    let mut engine = ReplayEngine::start(Arc::new(edited), recorded, &instant()).await.unwrap();
    engine.run(&ReplayCancel::new()).await.unwrap();

    assert_eq!(engine.status(), &ReplayStatus::Desynced { recorded_choice: Some(choice_id(200)) });
    assert_eq!(engine.current_part_id(), part_id(2));
    assert!(matches!(
        engine.desync(),
        Some(NarrativeError::ReplayDesync { part_id: p, .. }) if p == part_id(2)
    ));

    engine.choose(choice_id(250)).await.unwrap();
    assert_eq!(engine.status(), &ReplayStatus::Finished);
    assert_eq!(engine.current_part_id(), part_id(3));
}

#[tokio::test]
async fn test_truncated_payload_starts_fresh_session() {
    let shape = StoryShape { choices: vec![vec![Some(0)]] };
    let (store, story_id) = build_story(&shape);
    let recorded = walk(Arc::clone(&store), story_id, &[0]).await;
    let shared = recorded.encode().unwrap();
    let truncated = &shared[..shared.len() / 2];

    let entry = open_shared_path(
        Arc::clone(&store),
        SessionParams::reading(ReaderId::random(), story_id),
        truncated,
        &instant(),
    )
    .await
    .unwrap();

    match entry {
        SharedPathEntry::Fresh(session) => assert_eq!(session.current_part_id(), Some(part_id(1))),
        SharedPathEntry::Replay(_) => panic!("truncated payload should not replay"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_replay_stays_put() {
    let shape = StoryShape { choices: vec![vec![Some(0)], vec![Some(0)]] };
    let (store, story_id) = build_story(&shape);
    let recorded = walk(Arc::clone(&store), story_id, &[0, 0]).await;

    let mut engine = ReplayEngine::start(store, recorded, &EngineConfig::default()).await.unwrap();
    let cancel = ReplayCancel::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2000)).await;
        trigger.cancel();
    });

    let status = *engine.run(&cancel).await.unwrap();
    assert_eq!(status, ReplayStatus::Cancelled);
    // One advance at 1500ms, cancelled before the second at 3000ms.
    assert_eq!(engine.current_part_id(), part_id(2));
}
