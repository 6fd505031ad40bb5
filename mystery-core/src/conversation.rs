//! Conversation routing between the investigator and the active character.

use thiserror::Error;

use crate::chat::{ChatBackend, ChatError};
use crate::persona::build_persona;
use crate::scenario::Scenario;
use crate::state::{ConversationTurn, GameState};
use crate::unlock::{UnlockEngine, UnlockEvent};

/// Errors from conversation control.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("no character with id '{0}'")]
    UnknownCharacter(String),
}

/// A collaborator request captured at send time.
///
/// Owned so it can be handed to a spawned task while the game keeps running.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReply {
    pub character_id: String,
    pub persona: String,
    pub message: String,
    /// Turns before `message`, oldest first.
    pub history: Vec<ConversationTurn>,
    /// Game generation the request belongs to; bumped by a reset.
    pub generation: u64,
}

impl PendingReply {
    /// Ask the backend for the character's reply.
    pub async fn request(&self, backend: &dyn ChatBackend) -> Result<String, ChatError> {
        backend
            .reply(&self.persona, &self.message, &self.history)
            .await
    }
}

/// What happened to a player message.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Empty input or no active character; nothing changed.
    Skipped,
    /// The reply arrived after the player left that conversation or the
    /// game was reset.
    Discarded { character_id: String },
    /// The character answered.
    Replied {
        text: String,
        events: Vec<UnlockEvent>,
    },
    /// The collaborator failed and the fallback line was used.
    Fallback {
        text: String,
        events: Vec<UnlockEvent>,
        error: String,
    },
}

impl SendOutcome {
    /// The line appended to history, if any.
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            SendOutcome::Replied { text, .. } | SendOutcome::Fallback { text, .. } => Some(text),
            SendOutcome::Skipped | SendOutcome::Discarded { .. } => None,
        }
    }

    /// Unlocks caused by this exchange.
    pub fn events(&self) -> &[UnlockEvent] {
        match self {
            SendOutcome::Replied { events, .. } | SendOutcome::Fallback { events, .. } => events,
            SendOutcome::Skipped | SendOutcome::Discarded { .. } => &[],
        }
    }

    /// True if game state was modified.
    pub fn changed_state(&self) -> bool {
        matches!(self, SendOutcome::Replied { .. } | SendOutcome::Fallback { .. })
    }
}

/// Tracks which character the investigator is talking to.
#[derive(Debug, Clone, Default)]
pub struct ConversationController {
    active: Option<String>,
    generation: u64,
}

impl ConversationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Make `character_id` the active conversation.
    ///
    /// Seeds the character's greeting the first time. Returns true if the
    /// greeting was added.
    pub fn open(
        &mut self,
        scenario: &Scenario,
        state: &mut GameState,
        character_id: &str,
    ) -> Result<bool, ConversationError> {
        let character = scenario
            .character(character_id)
            .ok_or_else(|| ConversationError::UnknownCharacter(character_id.to_string()))?;

        self.active = Some(character.id.clone());

        if state.history(&character.id).is_empty() {
            state.append_turn(&character.id, ConversationTurn::character(character.greeting()));
            return Ok(true);
        }
        Ok(false)
    }

    pub fn close(&mut self) {
        self.active = None;
    }

    /// Forget the active conversation and orphan every outstanding request.
    pub fn reset(&mut self) {
        self.active = None;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Record the player's message and capture the collaborator request.
    ///
    /// Returns `None` for blank input or when no character is active.
    pub fn begin_send(
        &self,
        scenario: &Scenario,
        state: &mut GameState,
        text: &str,
    ) -> Option<PendingReply> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let character = scenario.character(self.active.as_deref()?)?;

        let engine = UnlockEngine::new(scenario);
        let evidence = engine.visible_evidence(state);
        let clues = engine.unlocked_clues(state);
        let persona = build_persona(character, &evidence, &clues);

        let history = state.history(&character.id).to_vec();
        state.append_turn(&character.id, ConversationTurn::player(text));

        Some(PendingReply {
            character_id: character.id.clone(),
            persona,
            message: text.to_string(),
            history,
            generation: self.generation,
        })
    }

    /// Apply the collaborator's answer to a pending request.
    pub fn finish_send(
        &self,
        scenario: &Scenario,
        state: &mut GameState,
        pending: PendingReply,
        result: Result<String, ChatError>,
    ) -> SendOutcome {
        if pending.generation != self.generation {
            tracing::info!(character = %pending.character_id, "discarding reply from before a reset");
            return SendOutcome::Discarded {
                character_id: pending.character_id,
            };
        }
        if self.active.as_deref() != Some(pending.character_id.as_str()) {
            tracing::info!(character = %pending.character_id, "discarding reply for inactive conversation");
            return SendOutcome::Discarded {
                character_id: pending.character_id,
            };
        }
        let Some(character) = scenario.character(&pending.character_id) else {
            return SendOutcome::Discarded {
                character_id: pending.character_id,
            };
        };

        let engine = UnlockEngine::new(scenario);
        match result {
            Ok(raw) => {
                let (text, mut events) = engine.apply_reply(state, &raw);
                state.append_turn(&character.id, ConversationTurn::character(&text));
                events.extend(engine.apply_keywords(state, &pending.message, &text));
                SendOutcome::Replied { text, events }
            }
            Err(error) => {
                tracing::warn!(character = %character.id, %error, "chat collaborator failed");
                let text = character.fallback_line().to_string();
                state.append_turn(&character.id, ConversationTurn::character(&text));
                let events = engine.apply_keywords(state, &pending.message, &text);
                SendOutcome::Fallback {
                    text,
                    events,
                    error: error.to_string(),
                }
            }
        }
    }

    /// Send a message and wait for the reply.
    pub async fn send(
        &self,
        scenario: &Scenario,
        state: &mut GameState,
        backend: &dyn ChatBackend,
        text: &str,
    ) -> SendOutcome {
        let Some(pending) = self.begin_send(scenario, state, text) else {
            return SendOutcome::Skipped;
        };
        let result = pending.request(backend).await;
        self.finish_send(scenario, state, pending, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Speaker;
    use crate::testing::{sample_scenario, ScriptedBackend};
    use crate::unlock::{UnlockCause, UnlockTarget};

    fn setup() -> (Scenario, GameState, ConversationController) {
        let scenario = sample_scenario().unwrap();
        let state = GameState::for_scenario(&scenario, 0);
        (scenario, state, ConversationController::new())
    }

    #[test]
    fn test_open_seeds_greeting_once() {
        let (scenario, mut state, mut controller) = setup();

        assert!(controller.open(&scenario, &mut state, "cook").unwrap());
        assert!(!controller.open(&scenario, &mut state, "cook").unwrap());

        let history = state.history("cook");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Speaker::Character);
        assert_eq!(history[0].text, scenario.character("cook").unwrap().greeting());
        assert_eq!(controller.active(), Some("cook"));
    }

    #[test]
    fn test_open_unknown_character() {
        let (scenario, mut state, mut controller) = setup();
        let err = controller.open(&scenario, &mut state, "nobody").unwrap_err();
        assert!(matches!(err, ConversationError::UnknownCharacter(id) if id == "nobody"));
        assert_eq!(controller.active(), None);
    }

    #[tokio::test]
    async fn test_send_without_active_is_skipped() {
        let (scenario, mut state, controller) = setup();
        let backend = ScriptedBackend::new();
        let outcome = controller.send(&scenario, &mut state, &backend, "Hello").await;
        assert_eq!(outcome, SendOutcome::Skipped);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_blank_is_skipped() {
        let (scenario, mut state, mut controller) = setup();
        controller.open(&scenario, &mut state, "cook").unwrap();
        let backend = ScriptedBackend::new();
        let outcome = controller.send(&scenario, &mut state, &backend, "   ").await;
        assert_eq!(outcome, SendOutcome::Skipped);
        assert_eq!(state.history("cook").len(), 1);
    }

    #[tokio::test]
    async fn test_send_applies_reply() {
        let (scenario, mut state, mut controller) = setup();
        controller.open(&scenario, &mut state, "cook").unwrap();
        let backend = ScriptedBackend::new();
        backend.push_reply("Fine, I kept a second ledger. [UNLOCK:ledger_found]");

        let outcome = controller
            .send(&scenario, &mut state, &backend, "Tell me about the accounts.")
            .await;

        assert_eq!(outcome.reply_text(), Some("Fine, I kept a second ledger."));
        assert!(outcome
            .events()
            .iter()
            .any(|e| e.target == UnlockTarget::Evidence("e_ledger".to_string())));

        let history = state.history("cook");
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], ConversationTurn::player("Tell me about the accounts."));
        assert_eq!(history[2].text, "Fine, I kept a second ledger.");

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].message, "Tell me about the accounts.");
        assert_eq!(calls[0].history.len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_uses_fallback() {
        let (scenario, mut state, mut controller) = setup();
        controller.open(&scenario, &mut state, "gardener").unwrap();
        let backend = ScriptedBackend::new();
        backend.push_failure("connection reset");

        let outcome = controller
            .send(&scenario, &mut state, &backend, "Were your boots muddy?")
            .await;

        let fallback = scenario.character("gardener").unwrap().fallback_line();
        match &outcome {
            SendOutcome::Fallback { text, events, error } => {
                assert_eq!(text, fallback);
                assert!(error.contains("connection reset"));
                assert_eq!(events[0].cause, UnlockCause::Keyword("boots".to_string()));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert_eq!(state.history("gardener").last().unwrap().text, fallback);
    }

    #[test]
    fn test_late_reply_discarded() {
        let (scenario, mut state, mut controller) = setup();
        controller.open(&scenario, &mut state, "cook").unwrap();
        let pending = controller
            .begin_send(&scenario, &mut state, "Where were you?")
            .unwrap();

        controller.open(&scenario, &mut state, "maid").unwrap();
        let outcome = controller.finish_send(
            &scenario,
            &mut state,
            pending,
            Ok("In the pantry. [UNLOCK:ledger_found]".to_string()),
        );

        assert_eq!(
            outcome,
            SendOutcome::Discarded {
                character_id: "cook".to_string()
            }
        );
        assert!(!state.has_flag("ledger_found"));
        assert_eq!(state.history("cook").len(), 2);
    }

    #[test]
    fn test_reset_orphans_pending_requests() {
        let (scenario, mut state, mut controller) = setup();
        controller.open(&scenario, &mut state, "cook").unwrap();
        let pending = controller
            .begin_send(&scenario, &mut state, "Where were you?")
            .unwrap();
        assert_eq!(pending.generation, controller.generation());

        controller.reset();
        assert_eq!(controller.active(), None);
        let mut fresh = GameState::for_scenario(&scenario, 0);
        controller.open(&scenario, &mut fresh, "cook").unwrap();

        let outcome = controller.finish_send(
            &scenario,
            &mut fresh,
            pending,
            Ok("In the pantry. [UNLOCK:ledger_found]".to_string()),
        );
        assert!(matches!(outcome, SendOutcome::Discarded { .. }));
        assert!(!fresh.has_flag("ledger_found"));
        assert_eq!(fresh.history("cook").len(), 1);
    }
}
