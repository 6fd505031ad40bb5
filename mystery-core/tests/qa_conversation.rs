//! QA tests for conversations and accusations.
//!
//! Run with: `cargo test -p mystery-core --test qa_conversation`

use mystery_core::testing::TestHarness;
use mystery_core::{build_persona, AccuseError, ChatError, SendOutcome, Speaker, Verdict};

async fn harness() -> TestHarness {
    TestHarness::new().await.expect("harness should start")
}

// =============================================================================
// Opening and sending
// =============================================================================

#[tokio::test]
async fn test_first_open_shows_greeting_without_calling_backend() {
    let mut harness = harness().await;
    harness.talk_to("maid").await.unwrap();

    let history = harness.session.history("maid");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Speaker::Character);
    assert_eq!(history[0].text, "Oh! You startled me.");
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_switching_characters_keeps_separate_histories() {
    let mut harness = harness().await;
    harness
        .expect_reply("In the kitchen.")
        .expect_reply("Dusting the library.");

    harness.talk_to("cook").await.unwrap();
    harness.say("Where were you?").await;
    harness.talk_to("maid").await.unwrap();
    harness.say("And you?").await;
    harness.talk_to("cook").await.unwrap();

    assert_eq!(harness.session.history("cook").len(), 3);
    assert_eq!(harness.session.history("maid").len(), 3);
    assert_eq!(harness.session.active_character().map(|c| c.id.as_str()), Some("cook"));
}

#[tokio::test]
async fn test_backend_receives_persona_and_prior_history() {
    let mut harness = harness().await;
    harness
        .expect_reply("The kitchen.")
        .expect_reply("I told you.");

    harness.talk_to("cook").await.unwrap();
    harness.say("Where were you?").await;
    harness.say("Are you sure?").await;

    let calls = harness.backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].persona.starts_with("You are Martha Bell, Cook."));
    assert_eq!(calls[1].message, "Are you sure?");
    assert_eq!(calls[1].history.len(), 3);
    assert_eq!(calls[1].history[2].text, "The kitchen.");
}

#[tokio::test]
async fn test_persona_reflects_found_evidence() {
    let mut harness = harness().await;
    harness
        .expect_reply("Fine. [UNLOCK:ledger_found]")
        .expect_reply("What about it?");

    harness.talk_to("cook").await.unwrap();
    harness.say("The accounts don't add up.").await;
    harness.say("Explain the ledger.").await;

    let calls = harness.backend.calls();
    assert!(!calls[0].persona.contains("Evidence: Second ledger"));
    assert!(calls[1].persona.contains("Evidence: Second ledger"));
}

#[tokio::test]
async fn test_failure_appends_fallback_and_keeps_playing() {
    let mut harness = harness().await;
    harness.expect_failure("503").expect_reply("Sir.");

    harness.talk_to("gardener").await.unwrap();
    let outcome = harness.say("Hello?").await;
    assert!(matches!(outcome, SendOutcome::Fallback { .. }));
    assert_eq!(
        harness.last_line("gardener"),
        Some("Eh? Speak up, the wind's loud out here.")
    );

    let outcome = harness.say("I said hello.").await;
    assert_eq!(outcome.reply_text(), Some("Sir."));
}

#[tokio::test]
async fn test_late_reply_for_closed_conversation_is_discarded() {
    let mut harness = harness().await;
    harness.talk_to("cook").await.unwrap();
    let pending = harness
        .session
        .begin_send("Who had the knife?")
        .await
        .expect("request should be created");

    harness.session.close();
    let outcome = harness
        .session
        .finish_send(pending, Ok("Tom did. [UNLOCK:ledger_found]".to_string()))
        .await;

    assert!(matches!(outcome, SendOutcome::Discarded { .. }));
    assert!(!harness.session.state().has_flag("ledger_found"));
    assert_eq!(harness.session.history("cook").len(), 2);
}

#[tokio::test]
async fn test_reply_from_before_reset_is_discarded() {
    let mut harness = harness().await;
    harness.talk_to("cook").await.unwrap();
    let pending = harness
        .session
        .begin_send("Tell me about the books")
        .await
        .unwrap();

    harness.session.reset().await.unwrap();
    harness.talk_to("cook").await.unwrap();
    let outcome = harness
        .session
        .finish_send(pending, Ok("Fine. [UNLOCK:ledger_found]".to_string()))
        .await;

    assert!(matches!(outcome, SendOutcome::Discarded { ref character_id } if character_id == "cook"));
    assert!(!harness.session.state().has_flag("ledger_found"));
    assert!(!harness.session.state().is_evidence_unlocked("e_ledger"));
    let history = harness.session.history("cook");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Speaker::Character);
}

#[tokio::test]
async fn test_split_send_with_error_result() {
    let mut harness = harness().await;
    harness.talk_to("maid").await.unwrap();
    let pending = harness.session.begin_send("Any letters?").await.unwrap();

    let outcome = harness
        .session
        .finish_send(pending, Err(ChatError::EmptyReply))
        .await;

    // The question itself mentions a keyword.
    assert!(matches!(outcome, SendOutcome::Fallback { .. }));
    assert!(harness.session.state().is_evidence_unlocked("e_letter"));
}

// =============================================================================
// Persona
// =============================================================================

#[test]
fn test_persona_is_pure() {
    let scenario = mystery_core::testing::sample_scenario().unwrap();
    let gardener = scenario.character("gardener").unwrap();
    let evidence: Vec<_> = scenario.evidences.iter().collect();
    let clues: Vec<_> = scenario.time_clues.iter().collect();

    assert_eq!(
        build_persona(gardener, &evidence, &clues),
        build_persona(gardener, &evidence, &clues)
    );
}

// =============================================================================
// Accusation
// =============================================================================

#[tokio::test]
async fn test_accuse_wrong_then_right() {
    let harness = harness().await;

    match harness.session.accuse("Ivy").unwrap() {
        Verdict::Incorrect { accused_id, message, .. } => {
            assert_eq!(accused_id, "maid");
            assert!(message.contains("Ivy Shaw"));
        }
        other => panic!("expected an incorrect verdict, got {other:?}"),
    }

    match harness.session.accuse("reed").unwrap() {
        Verdict::Correct { culprit_id, truth, .. } => {
            assert_eq!(culprit_id, "gardener");
            assert!(truth.contains("Tom Reed"));
        }
        other => panic!("expected a correct verdict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_accuse_unknown_changes_nothing() {
    let harness = harness().await;
    let before = harness.session.state().clone();

    assert!(matches!(
        harness.session.accuse("Professor Plum"),
        Err(AccuseError::NoSuchSuspect(_))
    ));
    assert_eq!(harness.session.state(), &before);
}
