//! The unlock engine.
//!
//! Evidence and time clues move from hidden to revealed under four
//! triggers: the start sentinel, flags emitted by character replies,
//! scenario keywords spoken in an exchange, and elapsed time. Every
//! trigger is idempotent and unlocks are never undone.

use crate::directive::parse_reply;
use crate::scenario::{Evidence, Scenario, TimeClue, UnlockCondition};
use crate::state::GameState;

/// What was unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockTarget {
    Flag(String),
    Evidence(String),
    Clue(String),
}

/// Why it was unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockCause {
    /// Evidence marked visible from the start.
    Start,
    /// A reply carried an unlock directive.
    Directive,
    /// The gating flag became set.
    Flag(String),
    /// The exchange mentioned one of the evidence keywords.
    Keyword(String),
    /// Enough time passed since game start.
    Timer,
}

/// A single hidden-to-revealed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockEvent {
    pub target: UnlockTarget,
    pub cause: UnlockCause,
}

impl UnlockEvent {
    fn new(target: UnlockTarget, cause: UnlockCause) -> Self {
        Self { target, cause }
    }

    /// True when the event revealed something the player can see.
    pub fn is_visible(&self) -> bool {
        !matches!(self.target, UnlockTarget::Flag(_))
    }
}

/// Whether a time clue is available yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClueState {
    Unlocked,
    Locked { remaining_secs: u64 },
}

/// A time clue with its current availability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClueStatus<'a> {
    pub clue: &'a TimeClue,
    pub state: ClueState,
}

impl ClueStatus<'_> {
    pub fn is_unlocked(&self) -> bool {
        self.state == ClueState::Unlocked
    }

    /// Remaining time as `m:ss`, or `None` once unlocked.
    pub fn countdown(&self) -> Option<String> {
        match self.state {
            ClueState::Unlocked => None,
            ClueState::Locked { remaining_secs } => {
                Some(format!("{}:{:02}", remaining_secs / 60, remaining_secs % 60))
            }
        }
    }
}

/// Evaluates unlock rules of one scenario against a game state.
#[derive(Debug, Clone, Copy)]
pub struct UnlockEngine<'a> {
    scenario: &'a Scenario,
}

impl<'a> UnlockEngine<'a> {
    pub fn new(scenario: &'a Scenario) -> Self {
        Self { scenario }
    }

    /// Unlock every evidence item whose condition is the start sentinel.
    pub fn seed(&self, state: &mut GameState) -> Vec<UnlockEvent> {
        let mut events = Vec::new();
        for evidence in &self.scenario.evidences {
            if evidence.unlock_condition == UnlockCondition::AtStart
                && state.unlock_evidence(&evidence.id)
            {
                events.push(UnlockEvent::new(
                    UnlockTarget::Evidence(evidence.id.clone()),
                    UnlockCause::Start,
                ));
            }
        }
        events
    }

    /// Strip directives from a raw reply and apply the flags they carry.
    ///
    /// Returns the display text and the resulting unlocks.
    pub fn apply_reply(&self, state: &mut GameState, raw: &str) -> (String, Vec<UnlockEvent>) {
        let parsed = parse_reply(raw);
        let mut events = Vec::new();

        for flag in parsed.flags() {
            if !state.set_flag(flag) {
                continue;
            }
            tracing::info!(flag, "flag set by reply");
            events.push(UnlockEvent::new(
                UnlockTarget::Flag(flag.to_string()),
                UnlockCause::Directive,
            ));
            self.unlock_gated_by(state, flag, &mut events);
        }

        (parsed.text, events)
    }

    /// Unlock evidence gated by any flag already set.
    pub fn apply_flags(&self, state: &mut GameState) -> Vec<UnlockEvent> {
        let mut events = Vec::new();
        let flags: Vec<String> = state.flags().iter().cloned().collect();
        for flag in &flags {
            self.unlock_gated_by(state, flag, &mut events);
        }
        events
    }

    fn unlock_gated_by(&self, state: &mut GameState, flag: &str, events: &mut Vec<UnlockEvent>) {
        for evidence in self.scenario.evidence_for_flag(flag) {
            if state.unlock_evidence(&evidence.id) {
                events.push(UnlockEvent::new(
                    UnlockTarget::Evidence(evidence.id.clone()),
                    UnlockCause::Flag(flag.to_string()),
                ));
            }
        }
    }

    /// Unlock evidence whose keywords appear in either side of an exchange.
    pub fn apply_keywords(
        &self,
        state: &mut GameState,
        player_text: &str,
        reply_text: &str,
    ) -> Vec<UnlockEvent> {
        let player = player_text.to_lowercase();
        let reply = reply_text.to_lowercase();
        let mut events = Vec::new();

        for evidence in &self.scenario.evidences {
            if state.is_evidence_unlocked(&evidence.id) {
                continue;
            }
            let hit = evidence.keywords.iter().find(|word| {
                let word = word.trim().to_lowercase();
                !word.is_empty() && (player.contains(&word) || reply.contains(&word))
            });
            if let Some(word) = hit {
                state.unlock_evidence(&evidence.id);
                tracing::info!(evidence = %evidence.id, keyword = %word, "evidence unlocked by keyword");
                events.push(UnlockEvent::new(
                    UnlockTarget::Evidence(evidence.id.clone()),
                    UnlockCause::Keyword(word.clone()),
                ));
            }
        }
        events
    }

    /// Unlock every time clue whose delay has elapsed by `now_ms`.
    pub fn tick(&self, state: &mut GameState, now_ms: i64) -> Vec<UnlockEvent> {
        let elapsed = now_ms.saturating_sub(state.started_at_ms());
        if elapsed < 0 {
            return Vec::new();
        }

        let mut events = Vec::new();
        for clue in &self.scenario.time_clues {
            if elapsed >= clue.delay_ms() && state.unlock_clue(&clue.id) {
                tracing::info!(clue = %clue.id, elapsed_ms = elapsed, "time clue unlocked");
                events.push(UnlockEvent::new(
                    UnlockTarget::Clue(clue.id.clone()),
                    UnlockCause::Timer,
                ));
            }
        }
        events
    }

    /// Run every state-only trigger: start, set flags and time.
    pub fn reevaluate(&self, state: &mut GameState, now_ms: i64) -> Vec<UnlockEvent> {
        let mut events = self.seed(state);
        events.extend(self.apply_flags(state));
        events.extend(self.tick(state, now_ms));
        events
    }

    pub fn is_evidence_visible(&self, state: &GameState, evidence: &Evidence) -> bool {
        match &evidence.unlock_condition {
            UnlockCondition::AtStart => true,
            UnlockCondition::Flag(flag) => {
                state.has_flag(flag) || state.is_evidence_unlocked(&evidence.id)
            }
        }
    }

    /// Visible evidence in scenario order.
    pub fn visible_evidence(&self, state: &GameState) -> Vec<&'a Evidence> {
        self.scenario
            .evidences
            .iter()
            .filter(|e| self.is_evidence_visible(state, e))
            .collect()
    }

    /// Unlocked time clues in scenario order.
    pub fn unlocked_clues(&self, state: &GameState) -> Vec<&'a TimeClue> {
        self.scenario
            .time_clues
            .iter()
            .filter(|c| state.is_clue_unlocked(&c.id))
            .collect()
    }

    /// Availability of every time clue at `now_ms`.
    pub fn clue_status(&self, state: &GameState, now_ms: i64) -> Vec<ClueStatus<'a>> {
        let elapsed = now_ms.saturating_sub(state.started_at_ms()).max(0);
        self.scenario
            .time_clues
            .iter()
            .map(|clue| {
                let state = if state.is_clue_unlocked(&clue.id) {
                    ClueState::Unlocked
                } else {
                    let remaining_ms = (clue.delay_ms() - elapsed).max(0) as u64;
                    ClueState::Locked {
                        remaining_secs: remaining_ms.div_ceil(1000),
                    }
                };
                ClueStatus { clue, state }
            })
            .collect()
    }
}
