//! QA tests for save/load of game state.
//!
//! These tests verify that progress survives a relaunch and that damaged
//! saves degrade field by field instead of failing.
//! Run with: `cargo test -p mystery-core --test qa_persistence`

use mystery_core::persist::{self, SAVE_KEY, START_TIME_KEY};
use mystery_core::testing::{assert_clue_unlocked, assert_evidence_visible, sample_scenario, TestHarness};
use mystery_core::{
    Clock, FileStorage, GameSession, ManualClock, MemoryStorage, Scenario, ScriptedBackend, Storage,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn scenario() -> Arc<Scenario> {
    Arc::new(sample_scenario().expect("sample scenario should parse"))
}

// =============================================================================
// TEST 1: Progress survives a relaunch
// =============================================================================

#[tokio::test]
async fn test_progress_survives_reload() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.talk_to("cook").await.unwrap();
    harness.expect_reply("Under the flour bin. [UNLOCK:ledger_found]");
    harness.say("Where are the real accounts?").await;

    let before = harness.session.state().clone();
    harness.reload().await.unwrap();

    assert_eq!(harness.session.state(), &before);
    assert_evidence_visible(&harness, "e_ledger");
    assert_eq!(harness.session.history("cook").len(), 3);
    // The active conversation is not part of the save.
    assert!(harness.session.active_character().is_none());
}

#[tokio::test]
async fn test_timer_continues_from_original_start() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.advance(Duration::from_secs(3 * 60));
    harness.reload().await.unwrap();

    assert_eq!(harness.session.state().started_at_ms(), 0);
    assert_clue_unlocked(&harness, "c_weather");

    harness.advance(Duration::from_secs(2 * 60));
    harness.tick().await;
    assert_clue_unlocked(&harness, "c_report");
}

// =============================================================================
// TEST 2: File storage on disk
// =============================================================================

#[tokio::test]
async fn test_file_storage_session_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let save_dir = temp_dir.path().join("saves");
    let clock = Arc::new(ManualClock::new(1_000));
    let backend = ScriptedBackend::new();
    backend.push_reply("Muddy? The lawn was soaked. [UNLOCK:boots_muddy]");

    {
        let mut session = GameSession::start(
            scenario(),
            Box::new(FileStorage::new(&save_dir)),
            clock.clone(),
        )
        .await
        .unwrap();
        session.open("gardener").await.unwrap();
        session.send(&backend, "You were outside late.").await;
        assert!(session.take_persist_error().is_none());
    }

    assert!(save_dir.join("mystery_save.json").exists());
    assert!(save_dir.join("mystery_start_time.json").exists());

    let session = GameSession::start(scenario(), Box::new(FileStorage::new(&save_dir)), clock)
        .await
        .unwrap();
    assert!(session.state().has_flag("boots_muddy"));
    assert_eq!(session.state().started_at_ms(), 1_000);
    assert!(session.visible_evidence().iter().any(|e| e.id == "e_boots"));
}

#[tokio::test]
async fn test_reset_erases_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let storage = FileStorage::new(temp_dir.path());
    let clock = Arc::new(ManualClock::new(0));

    let mut session = GameSession::start(scenario(), Box::new(storage.clone()), clock.clone())
        .await
        .unwrap();
    session.open("maid").await.unwrap();

    clock.advance(Duration::from_secs(30));
    session.reset().await.unwrap();

    let raw_start = storage.get(START_TIME_KEY).await.unwrap();
    assert_eq!(raw_start.as_deref(), Some("30000"));
    assert!(session.history("maid").is_empty());
}

// =============================================================================
// TEST 3: Damaged saves
// =============================================================================

#[tokio::test]
async fn test_corrupt_blob_falls_back_to_start_key() {
    let storage = MemoryStorage::new();
    storage.set(SAVE_KEY, "this is not json").await.unwrap();
    storage.set(START_TIME_KEY, "880000").await.unwrap();
    let clock = Arc::new(ManualClock::new(1_000_000));

    let session = GameSession::start(scenario(), Box::new(storage), clock)
        .await
        .unwrap();

    assert_eq!(session.state().started_at_ms(), 880_000);
    // Start evidence and due clues are restored by re-evaluation.
    assert!(session.visible_evidence().iter().any(|e| e.id == "e_knife"));
    assert_eq!(session.unlocked_clues().len(), 1);
}

#[tokio::test]
async fn test_binary_blob_keeps_original_start_time() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let storage = FileStorage::new(temp_dir.path());
    std::fs::write(temp_dir.path().join("mystery_save.json"), [0xff, 0xfe, 0x7b]).unwrap();
    storage.set(START_TIME_KEY, "1000").await.unwrap();
    let clock = Arc::new(ManualClock::new(999_999));

    let session = GameSession::start(scenario(), Box::new(storage.clone()), clock)
        .await
        .unwrap();

    assert_eq!(session.state().started_at_ms(), 1000);
    let raw_start = storage.get(START_TIME_KEY).await.unwrap();
    assert_eq!(raw_start.as_deref(), Some("1000"));
    assert!(session.visible_evidence().iter().any(|e| e.id == "e_knife"));
}

#[tokio::test]
async fn test_absurd_start_time_does_not_stop_the_game() {
    let storage = MemoryStorage::new();
    storage.set(SAVE_KEY, "{}").await.unwrap();
    storage
        .set(START_TIME_KEY, "-9223372036854775808")
        .await
        .unwrap();
    let clock = Arc::new(ManualClock::new(50_000));

    let mut session = GameSession::start(scenario(), Box::new(storage), clock)
        .await
        .unwrap();

    assert_eq!(session.state().started_at_ms(), 50_000);
    assert_eq!(session.elapsed_ms(), 0);
    assert!(session.tick().await.is_empty());
}

#[tokio::test]
async fn test_legacy_save_is_understood() {
    let storage = MemoryStorage::new();
    storage
        .set(
            SAVE_KEY,
            r#"{
                "history": {"cook": [{"role": "model", "text": "Yes?"}, {"role": "user", "text": "Hello"}]},
                "flags": {"ledger_found": true},
                "startTime": 0,
                "revealedClues": ["c_weather", "c_unknown"]
            }"#,
        )
        .await
        .unwrap();
    let clock = Arc::new(ManualClock::new(30_000));

    let session = GameSession::start(scenario(), Box::new(storage), clock)
        .await
        .unwrap();

    assert_eq!(session.history("cook").len(), 2);
    assert!(session.state().is_evidence_unlocked("e_ledger"));
    assert!(session.state().is_clue_unlocked("c_weather"));
    assert!(!session.state().is_clue_unlocked("c_unknown"));
}

#[tokio::test]
async fn test_save_load_round_trip_is_exact() {
    let storage = MemoryStorage::new();
    let clock = ManualClock::new(0);
    let mut harness = TestHarness::new().await.unwrap();
    harness.talk_to("gardener").await.unwrap();
    harness.expect_failure("timeout");
    harness.say("Where were you at eleven?").await;

    let state = harness.session.state().clone();
    persist::save(&storage, &state).await.unwrap();
    let restored = persist::load(&storage, clock.now_ms()).await.unwrap();

    assert_eq!(restored, Some(state));
}
