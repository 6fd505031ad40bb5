//! GameSession - the primary public API for playing a mystery.
//!
//! A session owns the loaded scenario, the player's progress, the storage
//! it is saved to and the clock that drives time clues. Every operation
//! that changes progress saves it before returning.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::accusation::{accuse, AccuseError, Verdict};
use crate::chat::{ChatBackend, ChatConfig, ChatError, ClaudeBackend};
use crate::clock::{Clock, SystemClock};
use crate::conversation::{ConversationController, ConversationError, PendingReply, SendOutcome};
use crate::persist::{self, FileStorage, PersistError, Storage};
use crate::scenario::{Character, Evidence, Scenario, ScenarioError, TimeClue};
use crate::state::{ConversationTurn, GameState};
use crate::unlock::{ClueStatus, UnlockEngine, UnlockEvent};

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error(transparent)]
    Accuse(#[from] AccuseError),

    #[error("No API key configured - set ANTHROPIC_API_KEY environment variable")]
    NoApiKey,

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

/// Configuration for creating a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Scenario file to load.
    pub scenario_path: PathBuf,

    /// Directory holding the save files.
    pub save_dir: PathBuf,

    /// Settings for the chat collaborator.
    pub chat: ChatConfig,
}

impl SessionConfig {
    /// Create a config for the given scenario file.
    pub fn new(scenario_path: impl Into<PathBuf>) -> Self {
        Self {
            scenario_path: scenario_path.into(),
            save_dir: PathBuf::from("saves"),
            chat: ChatConfig::default(),
        }
    }

    /// Set the save directory.
    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    /// Replace the chat settings.
    pub fn with_chat(mut self, chat: ChatConfig) -> Self {
        self.chat = chat;
        self
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.chat = self.chat.with_model(model);
        self
    }

    /// Set max tokens for replies.
    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.chat = self.chat.with_max_tokens(tokens);
        self
    }

    /// Set temperature for generation.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.chat = self.chat.with_temperature(temp);
        self
    }

    /// Build the Claude backend for this config from the environment.
    pub fn claude_backend(&self) -> Result<ClaudeBackend, SessionError> {
        match ClaudeBackend::from_env() {
            Ok(backend) => Ok(backend.with_config(self.chat.clone())),
            Err(ChatError::Api(claude::Error::NoApiKey)) => Err(SessionError::NoApiKey),
            Err(e) => Err(e.into()),
        }
    }
}

/// A running game.
pub struct GameSession {
    scenario: Arc<Scenario>,
    state: GameState,
    storage: Box<dyn Storage>,
    clock: Arc<dyn Clock>,
    controller: ConversationController,
    persist_error: Option<String>,
}

impl GameSession {
    /// Start a session, restoring saved progress if there is any.
    pub async fn start(
        scenario: Arc<Scenario>,
        storage: Box<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let now = clock.now_ms();
        let restored = match persist::load(storage.as_ref(), now).await {
            Ok(restored) => restored,
            Err(error) => {
                tracing::error!(%error, "could not read saved game; starting fresh");
                None
            }
        };

        let (state, dirty) = match restored {
            Some(mut state) => {
                state.retain_known(&scenario);
                let events = UnlockEngine::new(&scenario).reevaluate(&mut state, now);
                (state, !events.is_empty())
            }
            None => {
                let mut state = GameState::for_scenario(&scenario, now);
                UnlockEngine::new(&scenario).tick(&mut state, now);
                tracing::info!(title = %scenario.case.title, "new game started");
                (state, true)
            }
        };

        let mut session = Self {
            scenario,
            state,
            storage,
            clock,
            controller: ConversationController::new(),
            persist_error: None,
        };
        if dirty {
            session.persist().await;
        }
        Ok(session)
    }

    /// Load the configured scenario and save directory with the system clock.
    pub async fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let scenario = Scenario::load(&config.scenario_path).await?;
        Self::start(
            Arc::new(scenario),
            Box::new(FileStorage::new(&config.save_dir)),
            Arc::new(SystemClock),
        )
        .await
    }

    async fn persist(&mut self) {
        if let Err(error) = persist::save(self.storage.as_ref(), &self.state).await {
            tracing::error!(%error, "failed to save game");
            self.persist_error = Some(error.to_string());
        }
    }

    /// The last save failure, if one happened since the previous call.
    pub fn take_persist_error(&mut self) -> Option<String> {
        self.persist_error.take()
    }

    // ========================================================================
    // Conversation
    // ========================================================================

    /// Start or resume talking to a character.
    pub async fn open(&mut self, character_id: &str) -> Result<(), SessionError> {
        let seeded = self
            .controller
            .open(&self.scenario, &mut self.state, character_id)?;
        if seeded {
            self.persist().await;
        }
        Ok(())
    }

    /// Leave the current conversation.
    pub fn close(&mut self) {
        self.controller.close();
    }

    /// Send a message to the active character and wait for the reply.
    pub async fn send(&mut self, backend: &dyn ChatBackend, text: &str) -> SendOutcome {
        let Some(pending) = self.begin_send(text).await else {
            return SendOutcome::Skipped;
        };
        let result = pending.request(backend).await;
        self.finish_send(pending, result).await
    }

    /// Record a player message and return the request to run elsewhere.
    pub async fn begin_send(&mut self, text: &str) -> Option<PendingReply> {
        let pending = self
            .controller
            .begin_send(&self.scenario, &mut self.state, text)?;
        self.persist().await;
        Some(pending)
    }

    /// Apply a reply produced for an earlier [`GameSession::begin_send`].
    pub async fn finish_send(
        &mut self,
        pending: PendingReply,
        result: Result<String, ChatError>,
    ) -> SendOutcome {
        let outcome = self
            .controller
            .finish_send(&self.scenario, &mut self.state, pending, result);
        if outcome.changed_state() {
            self.persist().await;
        }
        outcome
    }

    // ========================================================================
    // Time, accusation and reset
    // ========================================================================

    /// Unlock time clues that are due.
    pub async fn tick(&mut self) -> Vec<UnlockEvent> {
        let now = self.clock.now_ms();
        let events = UnlockEngine::new(&self.scenario).tick(&mut self.state, now);
        if !events.is_empty() {
            self.persist().await;
        }
        events
    }

    /// Name a suspect.
    pub fn accuse(&self, query: &str) -> Result<Verdict, AccuseError> {
        accuse(&self.scenario, query)
    }

    /// Erase the save and start over with a new start time.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        persist::reset(self.storage.as_ref()).await?;
        self.controller.reset();
        self.state = GameState::for_scenario(&self.scenario, self.clock.now_ms());
        self.persist_error = None;
        self.persist().await;
        tracing::info!("game reset");
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn visible_evidence(&self) -> Vec<&Evidence> {
        UnlockEngine::new(&self.scenario).visible_evidence(&self.state)
    }

    pub fn unlocked_clues(&self) -> Vec<&TimeClue> {
        UnlockEngine::new(&self.scenario).unlocked_clues(&self.state)
    }

    pub fn clue_status(&self) -> Vec<ClueStatus<'_>> {
        UnlockEngine::new(&self.scenario).clue_status(&self.state, self.clock.now_ms())
    }

    pub fn history(&self, character_id: &str) -> &[ConversationTurn] {
        self.state.history(character_id)
    }

    pub fn active_character(&self) -> Option<&Character> {
        self.controller
            .active()
            .and_then(|id| self.scenario.character(id))
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Shared handle to the scenario, for tasks that outlive a borrow.
    pub fn scenario_handle(&self) -> Arc<Scenario> {
        Arc::clone(&self.scenario)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Milliseconds since the game started, never negative.
    pub fn elapsed_ms(&self) -> i64 {
        self.now_ms().saturating_sub(self.state.started_at_ms()).max(0)
    }
}
