//! Testing utilities for the mystery engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedBackend` for deterministic replies without API calls
//! - `TestHarness` wiring a sample scenario to memory storage and a manual clock
//! - Assertion helpers for verifying unlock state

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::chat::{ChatBackend, ChatError};
use crate::clock::ManualClock;
use crate::conversation::SendOutcome;
use crate::persist::MemoryStorage;
use crate::scenario::{Scenario, ScenarioError};
use crate::session::{GameSession, SessionError};
use crate::state::ConversationTurn;
use crate::unlock::UnlockEvent;

/// A call received by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub persona: String,
    pub message: String,
    pub history: Vec<ConversationTurn>,
}

/// A chat backend that returns scripted replies in order.
///
/// When the script runs out it answers with the default reply, or fails
/// if none is set.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, String>>>,
    default_reply: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `text` once the script is exhausted.
    pub fn with_default_reply(mut self, text: impl Into<String>) -> Self {
        self.default_reply = Some(text.into());
        self
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, text: impl Into<String>) {
        lock(&self.script).push_back(Ok(text.into()));
    }

    /// Queue a collaborator failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.script).push_back(Err(message.into()));
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of scripted entries not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn reply(
        &self,
        persona: &str,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ChatError> {
        lock(&self.calls).push(RecordedCall {
            persona: persona.to_string(),
            message: message.to_string(),
            history: history.to_vec(),
        });

        match lock(&self.script).pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ChatError::Unavailable(message)),
            None => self
                .default_reply
                .clone()
                .ok_or_else(|| ChatError::Unavailable("no scripted reply left".to_string())),
        }
    }
}

// ============================================================================
// Sample scenario
// ============================================================================

/// A small self-contained scenario used throughout the tests.
pub const SAMPLE_SCENARIO_JSON: &str = r#"{
    "case": {
        "title": "The Kitchen Knife",
        "outline": "The master of the house was found stabbed in the pantry at midnight.",
        "culprit": "gardener",
        "truth": "Tom Reed crossed the wet lawn at eleven, took the knife from the kitchen and confronted his employer over the unpaid wages."
    },
    "characters": [
        {
            "id": "cook",
            "name": "Martha Bell",
            "role": "Cook",
            "personality": ["brisk", "protective of her kitchen"],
            "secrets": [
                {"content": "She kept a second ledger of the household accounts.", "unlock": "ledger_found"}
            ],
            "timeline": [
                {"time": "22:00", "action": "Locked the kitchen door"},
                {"time": "23:30", "action": "Went to bed"}
            ],
            "lying_rules": {"allowed": ["the household money"], "forbidden": ["where the knife is kept"]}
        },
        {
            "id": "gardener",
            "name": "Tom Reed",
            "role": "Gardener",
            "personality": ["gruff", "evasive"],
            "background": "Has worked the grounds for twenty years and was owed three months of wages.",
            "secrets": [
                "He argued with the master last week.",
                {"content": "He crossed the lawn after the rain; his boots were caked in mud.", "unlock": "boots_muddy"}
            ],
            "lying_rules": {"allowed": ["his whereabouts after ten"], "forbidden": ["the weather"]},
            "language_style": ["short sentences", "calls the investigator 'sir'"],
            "fallback_line": "Eh? Speak up, the wind's loud out here."
        },
        {
            "id": "maid",
            "name": "Ivy Shaw",
            "role": "Maid",
            "secrets": ["She reads the master's correspondence."],
            "greeting": "Oh! You startled me."
        }
    ],
    "evidences": [
        {"id": "e_knife", "name": "Kitchen knife", "description": "Found beside the body.", "unlock_condition": "start"},
        {"id": "e_ledger", "name": "Second ledger", "description": "Wages owed to the staff.", "unlock_condition": "ledger_found"},
        {"id": "e_boots", "name": "Muddy boots", "description": "Left by the back door.", "unlock_condition": "boots_muddy", "keywords": ["boots", "mud"]},
        {"id": "e_letter", "name": "Unsent letter", "description": "A dismissal notice.", "unlock_condition": "letter_read", "keywords": ["letter"]}
    ],
    "time_clues": [
        {"id": "c_weather", "title": "Weather report", "content": "Heavy rain stopped at 22:45.", "unlock_minutes": 1},
        {"id": "c_report", "title": "Coroner's note", "content": "Death occurred between 23:00 and 23:30.", "unlock_minutes": 5}
    ]
}"#;

/// Parse [`SAMPLE_SCENARIO_JSON`].
pub fn sample_scenario() -> Result<Scenario, ScenarioError> {
    Scenario::from_json(SAMPLE_SCENARIO_JSON)
}

// ============================================================================
// Test harness
// ============================================================================

/// A game session wired to scripted replies, memory storage and a manual clock.
pub struct TestHarness {
    pub session: GameSession,
    pub backend: Arc<ScriptedBackend>,
    pub clock: Arc<ManualClock>,
    pub storage: MemoryStorage,
}

impl TestHarness {
    /// Start a harness on the sample scenario at time zero.
    pub async fn new() -> Result<Self, SessionError> {
        Self::with_scenario(sample_scenario()?).await
    }

    /// Start a harness on a custom scenario at time zero.
    pub async fn with_scenario(scenario: Scenario) -> Result<Self, SessionError> {
        let storage = MemoryStorage::new();
        let clock = Arc::new(ManualClock::new(0));
        let session = GameSession::start(
            Arc::new(scenario),
            Box::new(storage.clone()),
            clock.clone(),
        )
        .await?;

        Ok(Self {
            session,
            backend: Arc::new(ScriptedBackend::new()),
            clock,
            storage,
        })
    }

    /// Queue a successful reply.
    pub fn expect_reply(&mut self, text: impl Into<String>) -> &mut Self {
        self.backend.push_reply(text);
        self
    }

    /// Queue a collaborator failure.
    pub fn expect_failure(&mut self, message: impl Into<String>) -> &mut Self {
        self.backend.push_failure(message);
        self
    }

    /// Open a conversation with a character.
    pub async fn talk_to(&mut self, character_id: &str) -> Result<(), SessionError> {
        self.session.open(character_id).await
    }

    /// Send a message to the active character.
    pub async fn say(&mut self, text: &str) -> SendOutcome {
        self.session.send(self.backend.as_ref(), text).await
    }

    /// Move the clock forward without ticking.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Run the time trigger.
    pub async fn tick(&mut self) -> Vec<UnlockEvent> {
        self.session.tick().await
    }

    /// Restart the session from what was saved, as after a relaunch.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        let scenario = self.session.scenario_handle();
        self.session = GameSession::start(
            scenario,
            Box::new(self.storage.clone()),
            self.clock.clone(),
        )
        .await?;
        Ok(())
    }

    /// Identifiers of the visible evidence, in scenario order.
    pub fn evidence_ids(&self) -> Vec<String> {
        self.session
            .visible_evidence()
            .iter()
            .map(|e| e.id.clone())
            .collect()
    }

    /// Identifiers of the unlocked time clues, in scenario order.
    pub fn clue_ids(&self) -> Vec<String> {
        self.session
            .unlocked_clues()
            .iter()
            .map(|c| c.id.clone())
            .collect()
    }

    /// The last line of a character's conversation.
    pub fn last_line(&self, character_id: &str) -> Option<&str> {
        self.session
            .history(character_id)
            .last()
            .map(|t| t.text.as_str())
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that a piece of evidence is visible.
#[track_caller]
pub fn assert_evidence_visible(harness: &TestHarness, id: &str) {
    assert!(
        harness.evidence_ids().iter().any(|e| e == id),
        "Expected evidence '{id}' to be visible, visible: {:?}",
        harness.evidence_ids()
    );
}

/// Assert that a piece of evidence is NOT visible.
#[track_caller]
pub fn assert_evidence_hidden(harness: &TestHarness, id: &str) {
    assert!(
        !harness.evidence_ids().iter().any(|e| e == id),
        "Expected evidence '{id}' to be hidden"
    );
}

/// Assert that a time clue is unlocked.
#[track_caller]
pub fn assert_clue_unlocked(harness: &TestHarness, id: &str) {
    assert!(
        harness.session.state().is_clue_unlocked(id),
        "Expected clue '{id}' to be unlocked"
    );
}

/// Assert that a time clue is still locked.
#[track_caller]
pub fn assert_clue_locked(harness: &TestHarness, id: &str) {
    assert!(
        !harness.session.state().is_clue_unlocked(id),
        "Expected clue '{id}' to be locked"
    );
}

/// Assert that a flag is set.
#[track_caller]
pub fn assert_flag(harness: &TestHarness, name: &str) {
    assert!(
        harness.session.state().has_flag(name),
        "Expected flag '{name}' to be set"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_scenario_parses() {
        let scenario = sample_scenario().unwrap();
        assert_eq!(scenario.characters.len(), 3);
        assert_eq!(scenario.evidences.len(), 4);
        assert_eq!(scenario.time_clues.len(), 2);
        assert_eq!(scenario.case.culprit, "gardener");
    }

    #[tokio::test]
    async fn test_scripted_backend_order_and_default() {
        let backend = ScriptedBackend::new().with_default_reply("...");
        backend.push_reply("one");
        backend.push_failure("down");

        assert_eq!(backend.reply("p", "a", &[]).await.unwrap(), "one");
        assert!(matches!(
            backend.reply("p", "b", &[]).await,
            Err(ChatError::Unavailable(m)) if m == "down"
        ));
        assert_eq!(backend.reply("p", "c", &[]).await.unwrap(), "...");
        assert_eq!(backend.calls().len(), 3);
        assert_eq!(backend.remaining(), 0);
    }

    #[tokio::test]
    async fn test_scripted_backend_without_default_fails() {
        let backend = ScriptedBackend::new();
        assert!(backend.reply("p", "a", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_harness_basic_flow() {
        let mut harness = TestHarness::new().await.unwrap();
        harness.expect_reply("I was in the kitchen all evening.");

        harness.talk_to("cook").await.unwrap();
        let outcome = harness.say("Where were you?").await;

        assert_eq!(outcome.reply_text(), Some("I was in the kitchen all evening."));
        assert_eq!(harness.last_line("cook"), Some("I was in the kitchen all evening."));
        assert_evidence_visible(&harness, "e_knife");
        assert_evidence_hidden(&harness, "e_ledger");
    }
}
