//! Player progress: conversation histories, flags and unlocked items.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::scenario::{Scenario, UnlockCondition};

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    #[serde(alias = "user")]
    Player,
    #[serde(alias = "model", alias = "assistant")]
    Character,
}

/// A single line of an interrogation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Speaker,
    pub text: String,
}

impl ConversationTurn {
    pub fn player(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::Player,
            text: text.into(),
        }
    }

    pub fn character(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::Character,
            text: text.into(),
        }
    }
}

/// Mutable progress for one play-through.
///
/// Every collection only grows during play; only a full reset clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    pub(crate) started_at_ms: i64,
    pub(crate) history: BTreeMap<String, Vec<ConversationTurn>>,
    pub(crate) flags: BTreeSet<String>,
    pub(crate) unlocked_evidence: BTreeSet<String>,
    pub(crate) unlocked_clues: BTreeSet<String>,
}

impl GameState {
    /// Empty state starting at the given wall-clock time.
    pub fn new(started_at_ms: i64) -> Self {
        Self {
            started_at_ms,
            ..Default::default()
        }
    }

    /// Fresh state with all start-visible evidence already unlocked.
    pub fn for_scenario(scenario: &Scenario, started_at_ms: i64) -> Self {
        let mut state = Self::new(started_at_ms);
        for evidence in &scenario.evidences {
            if evidence.unlock_condition == UnlockCondition::AtStart {
                state.unlock_evidence(&evidence.id);
            }
        }
        state
    }

    /// Milliseconds since epoch when the game started.
    pub fn started_at_ms(&self) -> i64 {
        self.started_at_ms
    }

    /// Conversation with one character, oldest first.
    pub fn history(&self, character_id: &str) -> &[ConversationTurn] {
        self.history
            .get(character_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All conversations keyed by character id.
    pub fn histories(&self) -> &BTreeMap<String, Vec<ConversationTurn>> {
        &self.history
    }

    pub fn append_turn(&mut self, character_id: &str, turn: ConversationTurn) {
        self.history
            .entry(character_id.to_string())
            .or_default()
            .push(turn);
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    /// Set a flag. Returns true if it was not already set.
    pub fn set_flag(&mut self, name: &str) -> bool {
        self.flags.insert(name.to_string())
    }

    pub fn is_evidence_unlocked(&self, id: &str) -> bool {
        self.unlocked_evidence.contains(id)
    }

    pub fn unlocked_evidence(&self) -> &BTreeSet<String> {
        &self.unlocked_evidence
    }

    /// Mark evidence as unlocked. Returns true if it was newly unlocked.
    pub fn unlock_evidence(&mut self, id: &str) -> bool {
        self.unlocked_evidence.insert(id.to_string())
    }

    pub fn is_clue_unlocked(&self, id: &str) -> bool {
        self.unlocked_clues.contains(id)
    }

    pub fn unlocked_clue_ids(&self) -> &BTreeSet<String> {
        &self.unlocked_clues
    }

    /// Mark a time clue as unlocked. Returns true if it was newly unlocked.
    pub fn unlock_clue(&mut self, id: &str) -> bool {
        self.unlocked_clues.insert(id.to_string())
    }

    /// Drop histories, evidence and clues the scenario does not know about.
    ///
    /// Flags are kept: they are free-form names and may gate nothing.
    pub fn retain_known(&mut self, scenario: &Scenario) {
        let before = (
            self.history.len(),
            self.unlocked_evidence.len(),
            self.unlocked_clues.len(),
        );

        self.history.retain(|id, _| scenario.character(id).is_some());
        self.unlocked_evidence
            .retain(|id| scenario.evidence(id).is_some());
        self.unlocked_clues
            .retain(|id| scenario.time_clue(id).is_some());

        let after = (
            self.history.len(),
            self.unlocked_evidence.len(),
            self.unlocked_clues.len(),
        );
        if before != after {
            tracing::warn!(?before, ?after, "dropped saved entries unknown to this scenario");
        }
    }
}
