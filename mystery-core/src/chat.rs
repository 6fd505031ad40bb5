//! The chat collaborator seam.
//!
//! A [`ChatBackend`] answers one investigator question in character, given
//! the rendered persona and the conversation so far. [`ClaudeBackend`] is
//! the production implementation; tests use [`crate::testing::ScriptedBackend`].

use async_trait::async_trait;
use claude::{Claude, Message, Request};
use thiserror::Error;

use crate::state::{ConversationTurn, Speaker};

/// Line used to open a conversation whose history starts with the character.
const OPENING_CUE: &str = "(The investigator enters the interrogation room.)";

/// Errors from the chat collaborator.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Claude API error: {0}")]
    Api(#[from] claude::Error),

    #[error("collaborator returned an empty reply")]
    EmptyReply,

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Answers investigator questions in character.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Produce the character's reply to `message`.
    ///
    /// `history` holds the turns before `message`, oldest first.
    async fn reply(
        &self,
        persona: &str,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ChatError>;
}

/// Generation settings for the Claude backend.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens for a reply.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Alternate API root.
    pub base_url: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: Some(0.8),
            base_url: None,
        }
    }
}

impl ChatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Chat backend backed by the Anthropic Messages API.
#[derive(Clone)]
pub struct ClaudeBackend {
    client: Claude,
    config: ChatConfig,
}

impl ClaudeBackend {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            config: ChatConfig::default(),
        }
    }

    /// Create a backend using ANTHROPIC_API_KEY.
    pub fn from_env() -> Result<Self, ChatError> {
        Ok(Self::new(Claude::from_env()?))
    }

    pub fn with_config(mut self, config: ChatConfig) -> Self {
        if let Some(base_url) = &config.base_url {
            self.client = self.client.with_base_url(base_url.clone());
        }
        self.config = config;
        self
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }
}

#[async_trait]
impl ChatBackend for ClaudeBackend {
    async fn reply(
        &self,
        persona: &str,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ChatError> {
        let mut request = Request::new(build_messages(history, message))
            .with_system(persona)
            .with_max_tokens(self.config.max_tokens);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        tracing::debug!(turns = history.len(), "sending chat request");
        let response = self.client.complete(request).await?;
        tracing::debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "chat reply received"
        );

        let text = response.text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyReply);
        }
        Ok(text.to_string())
    }
}

/// Map a conversation onto strictly alternating API messages.
///
/// Consecutive turns by the same speaker are merged, and a neutral user
/// line is inserted when the history opens with the character.
pub fn build_messages(history: &[ConversationTurn], message: &str) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::with_capacity(history.len() + 2);

    let turns = history
        .iter()
        .map(|turn| (turn.role, turn.text.as_str()))
        .chain(std::iter::once((Speaker::Player, message)));

    for (role, text) in turns {
        if text.trim().is_empty() {
            continue;
        }
        match messages.last_mut() {
            Some(last) if speaker_matches(last, role) => {
                last.text.push_str("\n\n");
                last.text.push_str(text);
            }
            _ => {
                if messages.is_empty() && role == Speaker::Character {
                    messages.push(Message::user(OPENING_CUE));
                }
                messages.push(match role {
                    Speaker::Player => Message::user(text),
                    Speaker::Character => Message::assistant(text),
                });
            }
        }
    }

    messages
}

fn speaker_matches(message: &Message, speaker: Speaker) -> bool {
    matches!(
        (message.role, speaker),
        (claude::Role::User, Speaker::Player) | (claude::Role::Assistant, Speaker::Character)
    )
}
