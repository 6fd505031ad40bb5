//! Main application state and logic

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use mystery_core::accusation::resolve_suspect;
use mystery_core::{
    ChatBackend, GameSession, Scenario, SendOutcome, UnlockEvent, UnlockTarget, Verdict,
};

use crate::ui::theme::GameTheme;
use crate::ui::{FocusedPanel, Overlay};

/// Vim-style input modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Normal mode - navigation and hotkeys (default)
    #[default]
    Normal,
    /// Insert mode - questions for the active suspect
    Insert,
    /// Command mode - entering : commands
    Command,
}

/// Result of a colon command that needs the async session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    Open(String),
}

/// Main application state
pub struct App {
    pub session: GameSession,
    pub backend: Arc<dyn ChatBackend>,

    // UI state
    pub theme: GameTheme,
    pub focused_panel: FocusedPanel,
    overlay: Option<Overlay>,
    pub selected_suspect: usize,

    // Chat display
    pub chat_scroll: usize,
    pub scroll_locked_to_bottom: bool,
    pub evidence_scroll: usize,

    // Input state
    pub input_mode: InputMode,
    input_buffer: String,
    cursor_position: usize,
    pub input_history: VecDeque<String>,
    pub history_index: Option<usize>,
    pub saved_input: Option<String>,

    // Status
    status_message: Option<String>,
    pub should_quit: bool,

    // Suspects we are waiting on
    awaiting: BTreeSet<String>,
    // Evidence and clue ids revealed since the panel was last focused
    fresh: BTreeSet<String>,

    // Animation
    pub animation_frame: u8,
}

impl App {
    pub fn new(session: GameSession, backend: Arc<dyn ChatBackend>) -> Self {
        let fresh_start = session
            .state()
            .histories()
            .values()
            .all(|turns| turns.is_empty());

        let mut app = Self {
            session,
            backend,
            theme: GameTheme::default(),
            focused_panel: FocusedPanel::default(),
            overlay: None,
            selected_suspect: 0,
            chat_scroll: 0,
            scroll_locked_to_bottom: true,
            evidence_scroll: 0,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            cursor_position: 0,
            input_history: VecDeque::with_capacity(100),
            history_index: None,
            saved_input: None,
            status_message: None,
            should_quit: false,
            awaiting: BTreeSet::new(),
            fresh: BTreeSet::new(),
            animation_frame: 0,
        };

        if fresh_start {
            app.overlay = Some(Overlay::Briefing);
        }
        app.set_status("Pick a suspect with j/k and press Enter, '?' for help");
        app
    }

    pub fn scenario(&self) -> &Scenario {
        self.session.scenario()
    }

    // =========================================================================
    // Suspects and conversations
    // =========================================================================

    /// Id of the suspect under the selection cursor.
    pub fn selected_character_id(&self) -> Option<&str> {
        self.scenario()
            .characters
            .get(self.selected_suspect)
            .map(|c| c.id.as_str())
    }

    pub fn select_next(&mut self) {
        let count = self.scenario().characters.len();
        if count > 0 {
            self.selected_suspect = (self.selected_suspect + 1) % count;
        }
    }

    pub fn select_prev(&mut self) {
        let count = self.scenario().characters.len();
        if count > 0 {
            self.selected_suspect = (self.selected_suspect + count - 1) % count;
        }
    }

    /// Start or resume talking to a suspect.
    pub async fn open_conversation(&mut self, character_id: &str) {
        match self.session.open(character_id).await {
            Ok(()) => {
                if let Some(index) = self
                    .scenario()
                    .characters
                    .iter()
                    .position(|c| c.id == character_id)
                {
                    self.selected_suspect = index;
                }
                let name = self.character_name(character_id);
                self.focused_panel = FocusedPanel::Chat;
                self.scroll_to_bottom();
                self.set_status(format!("Talking to {name}. Press 'i' to ask a question"));
            }
            Err(e) => self.set_status(format!("Error: {e}")),
        }
    }

    /// Leave the current conversation.
    pub fn close_conversation(&mut self) {
        if let Some(name) = self.session.active_character().map(|c| c.name.clone()) {
            self.session.close();
            self.focused_panel = FocusedPanel::Suspects;
            self.set_status(format!("You leave {name} alone for now"));
        }
    }

    fn character_name(&self, character_id: &str) -> String {
        self.scenario()
            .character(character_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| character_id.to_string())
    }

    /// Whether a reply from the active suspect is outstanding.
    pub fn is_awaiting_active(&self) -> bool {
        self.session
            .active_character()
            .is_some_and(|c| self.awaiting.contains(&c.id))
    }

    /// Record that a question was sent and a reply is on its way.
    pub fn mark_awaiting(&mut self, character_id: &str) {
        self.awaiting.insert(character_id.to_string());
        let name = self.character_name(character_id);
        self.set_status(format!("{name} is thinking..."));
        self.scroll_to_bottom();
    }

    /// Apply the result of a finished exchange.
    pub fn apply_outcome(&mut self, outcome: SendOutcome) {
        match outcome {
            SendOutcome::Skipped => {}
            SendOutcome::Discarded { character_id } => {
                self.awaiting.remove(&character_id);
                tracing::debug!(%character_id, "late reply discarded");
            }
            SendOutcome::Replied { events, .. } => {
                self.finish_awaiting();
                self.clear_status();
                self.note_unlocks(&events);
            }
            SendOutcome::Fallback { events, error, .. } => {
                self.finish_awaiting();
                self.set_status(format!("No answer from the line ({error})"));
                self.note_unlocks(&events);
            }
        }
        if self.scroll_locked_to_bottom {
            self.scroll_to_bottom();
        }
    }

    fn finish_awaiting(&mut self) {
        if let Some(id) = self.session.active_character().map(|c| c.id.clone()) {
            self.awaiting.remove(&id);
        }
    }

    /// Surface unlock events to the player.
    pub fn note_unlocks(&mut self, events: &[UnlockEvent]) {
        let mut notices = Vec::new();
        for event in events.iter().filter(|e| e.is_visible()) {
            match &event.target {
                UnlockTarget::Evidence(id) | UnlockTarget::Clue(id) => {
                    self.fresh.insert(id.clone());
                }
                UnlockTarget::Flag(_) => {}
            }
            if let Some(notice) = unlock_notice(self.scenario(), event) {
                notices.push(notice);
            }
        }
        if !notices.is_empty() {
            self.set_status(notices.join(" | "));
        }
    }

    /// Evidence and clue ids revealed since the board was last viewed.
    pub fn fresh(&self) -> &BTreeSet<String> {
        &self.fresh
    }

    /// Show the last save failure, if any.
    pub fn check_persist_error(&mut self) {
        if let Some(error) = self.session.take_persist_error() {
            self.set_status(format!("Progress could not be saved: {error}"));
        }
    }

    // =========================================================================
    // Accusation and reset
    // =========================================================================

    /// Ask for confirmation before accusing someone.
    pub fn request_accusation(&mut self, query: &str) {
        match resolve_suspect(self.scenario(), query) {
            Some(character) => {
                let character_id = character.id.clone();
                self.set_overlay(Overlay::ConfirmAccuse { character_id });
            }
            None => self.set_status(format!("No suspect matches '{query}'")),
        }
    }

    /// Deliver the verdict on a suspect.
    pub fn accuse(&mut self, character_id: &str) {
        match self.session.accuse(character_id) {
            Ok(verdict) => {
                if let Verdict::Incorrect { message, .. } = &verdict {
                    self.set_status(message.clone());
                }
                self.set_overlay(Overlay::Verdict(verdict));
            }
            Err(e) => self.set_status(format!("Error: {e}")),
        }
    }

    /// Start over after confirmation.
    pub async fn reset_game(&mut self) {
        match self.session.reset().await {
            Ok(()) => {
                self.awaiting.clear();
                self.fresh.clear();
                self.selected_suspect = 0;
                self.focused_panel = FocusedPanel::Suspects;
                self.chat_scroll = 0;
                self.evidence_scroll = 0;
                self.input_history.clear();
                self.set_overlay(Overlay::Briefing);
                self.set_status("The case starts over");
            }
            Err(e) => self.set_status(format!("Reset failed: {e}")),
        }
    }

    // =========================================================================
    // Modes and commands
    // =========================================================================

    /// Enter insert mode if someone is listening.
    pub fn enter_insert_mode(&mut self) -> bool {
        if self.session.active_character().is_none() {
            self.set_status("Pick a suspect first (Enter on the list)");
            return false;
        }
        self.input_mode = InputMode::Insert;
        true
    }

    /// Enter command mode (starts with :)
    pub fn enter_command_mode(&mut self) {
        self.input_mode = InputMode::Command;
        self.input_buffer.clear();
        self.input_buffer.push(':');
        self.cursor_position = 1;
    }

    /// Exit to normal mode
    pub fn enter_normal_mode(&mut self) {
        self.input_mode = InputMode::Normal;
        if self.input_buffer.starts_with(':') {
            self.input_buffer.clear();
            self.cursor_position = 0;
        }
    }

    /// Process a colon command
    pub fn process_command(&mut self, command: &str) -> Option<CommandAction> {
        let cmd = command.trim_start_matches(':').trim();
        let (name, rest) = match cmd.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (cmd, ""),
        };

        match name {
            "" => None,
            "q" | "quit" | "exit" => {
                self.should_quit = true;
                None
            }
            "help" | "h" => {
                self.toggle_help();
                None
            }
            "case" | "brief" => {
                self.set_overlay(Overlay::Briefing);
                None
            }
            "talk" | "t" => {
                if rest.is_empty() {
                    self.set_status("Usage: :talk <name>");
                    return None;
                }
                match resolve_suspect(self.scenario(), rest) {
                    Some(character) => Some(CommandAction::Open(character.id.clone())),
                    None => {
                        self.set_status(format!("No suspect matches '{rest}'"));
                        None
                    }
                }
            }
            "back" | "b" => {
                self.close_conversation();
                None
            }
            "accuse" | "a" => {
                let query = if rest.is_empty() {
                    self.session.active_character().map(|c| c.id.clone())
                } else {
                    Some(rest.to_string())
                };
                match query {
                    Some(query) => self.request_accusation(&query),
                    None => self.set_status("Usage: :accuse <name>"),
                }
                None
            }
            "reset" => {
                self.set_overlay(Overlay::ConfirmReset);
                None
            }
            _ => {
                self.set_status(format!("Unknown command: {name}"));
                None
            }
        }
    }

    // =========================================================================
    // Scrolling
    // =========================================================================

    /// Scroll chat to bottom and lock to bottom
    pub fn scroll_to_bottom(&mut self) {
        // The widget caps this to the real maximum
        self.chat_scroll = usize::MAX / 2;
        self.scroll_locked_to_bottom = true;
    }

    /// Estimate max scroll assuming ~60 char effective width
    fn estimate_max_scroll(&self) -> usize {
        const ESTIMATED_WIDTH: usize = 60;
        const ESTIMATED_VISIBLE_HEIGHT: usize = 20;

        let Some(character) = self.session.active_character() else {
            return 0;
        };
        let estimated_lines: usize = self
            .session
            .history(&character.id)
            .iter()
            .map(|turn| {
                turn.text
                    .lines()
                    .map(|line| (line.chars().count() / ESTIMATED_WIDTH).max(1))
                    .sum::<usize>()
                    + 1
            })
            .sum();

        estimated_lines.saturating_sub(ESTIMATED_VISIBLE_HEIGHT)
    }

    /// Scroll chat up (unlocks from bottom)
    pub fn scroll_up(&mut self, lines: usize) {
        let max_scroll = self.estimate_max_scroll();
        if self.chat_scroll > max_scroll {
            self.chat_scroll = max_scroll;
        }
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.scroll_locked_to_bottom = false;
    }

    /// Scroll chat down
    pub fn scroll_down(&mut self, lines: usize) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
        let max_scroll = self.estimate_max_scroll();
        self.chat_scroll = self.chat_scroll.min(max_scroll + 100);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.scroll_locked_to_bottom = false;
    }

    // =========================================================================
    // Input editing
    // =========================================================================

    /// Submit current input
    pub fn submit_input(&mut self) -> Option<String> {
        if self.input_buffer.trim().is_empty() {
            return None;
        }

        let input = std::mem::take(&mut self.input_buffer);
        self.cursor_position = 0;

        if !input.starts_with(':') {
            self.input_history.push_front(input.clone());
            if self.input_history.len() > 100 {
                self.input_history.pop_back();
            }
        }
        self.history_index = None;
        self.saved_input = None;

        Some(input)
    }

    /// Handle a typed character (unicode-safe)
    pub fn type_char(&mut self, c: char) {
        let byte_pos = self
            .input_buffer
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.input_buffer.len());
        self.input_buffer.insert(byte_pos, c);
        self.cursor_position += 1;
    }

    /// Handle backspace (unicode-safe)
    pub fn backspace(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            if let Some((byte_pos, ch)) = self.input_buffer.char_indices().nth(self.cursor_position)
            {
                self.input_buffer
                    .replace_range(byte_pos..byte_pos + ch.len_utf8(), "");
            }
        }
    }

    /// Handle delete (unicode-safe)
    pub fn delete(&mut self) {
        if let Some((byte_pos, ch)) = self.input_buffer.char_indices().nth(self.cursor_position) {
            self.input_buffer
                .replace_range(byte_pos..byte_pos + ch.len_utf8(), "");
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input_buffer.chars().count();
        self.cursor_position = (self.cursor_position + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor_position = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor_position = self.input_buffer.chars().count();
    }

    /// Navigate to previous input in history
    pub fn history_prev(&mut self) {
        if self.input_history.is_empty() {
            return;
        }

        if self.history_index.is_none() && !self.input_buffer.is_empty() {
            self.saved_input = Some(self.input_buffer.clone());
        }

        let new_index = match self.history_index {
            None => 0,
            Some(i) if i + 1 < self.input_history.len() => i + 1,
            Some(i) => i,
        };

        if let Some(entry) = self.input_history.get(new_index) {
            self.input_buffer = entry.clone();
            self.cursor_position = self.input_buffer.chars().count();
            self.history_index = Some(new_index);
        }
    }

    /// Navigate to next input in history
    pub fn history_next(&mut self) {
        match self.history_index {
            None => {}
            Some(0) => {
                self.input_buffer = self.saved_input.take().unwrap_or_default();
                self.cursor_position = self.input_buffer.chars().count();
                self.history_index = None;
            }
            Some(i) => {
                if let Some(entry) = self.input_history.get(i - 1) {
                    self.input_buffer = entry.clone();
                    self.cursor_position = self.input_buffer.chars().count();
                    self.history_index = Some(i - 1);
                }
            }
        }
    }

    pub fn clear_input(&mut self) {
        self.input_buffer.clear();
        self.cursor_position = 0;
    }

    // =========================================================================
    // Overlays and focus
    // =========================================================================

    pub fn toggle_help(&mut self) {
        if matches!(self.overlay, Some(Overlay::Help)) {
            self.overlay = None;
        } else {
            self.overlay = Some(Overlay::Help);
        }
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn set_overlay(&mut self, overlay: Overlay) {
        self.overlay = Some(overlay);
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    /// Cycle to next focused panel
    pub fn cycle_focus(&mut self) {
        self.set_focus(match self.focused_panel {
            FocusedPanel::Suspects => FocusedPanel::Chat,
            FocusedPanel::Chat => FocusedPanel::Evidence,
            FocusedPanel::Evidence => FocusedPanel::Suspects,
        });
    }

    /// Cycle to previous focused panel
    pub fn cycle_focus_reverse(&mut self) {
        self.set_focus(match self.focused_panel {
            FocusedPanel::Suspects => FocusedPanel::Evidence,
            FocusedPanel::Evidence => FocusedPanel::Chat,
            FocusedPanel::Chat => FocusedPanel::Suspects,
        });
    }

    fn set_focus(&mut self, panel: FocusedPanel) {
        // Leaving the evidence panel marks everything as seen
        if self.focused_panel == FocusedPanel::Evidence && panel != FocusedPanel::Evidence {
            self.fresh.clear();
        }
        self.focused_panel = panel;
    }

    // =========================================================================
    // Status and animation
    // =========================================================================

    pub fn tick(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn input_buffer(&self) -> &str {
        &self.input_buffer
    }

    pub fn cursor_position(&self) -> usize {
        self.cursor_position
    }
}

/// One-line description of a visible unlock, for status lines and logs.
pub fn unlock_notice(scenario: &Scenario, event: &UnlockEvent) -> Option<String> {
    match &event.target {
        UnlockTarget::Evidence(id) => scenario
            .evidence(id)
            .map(|e| format!("New evidence: {}", e.name)),
        UnlockTarget::Clue(id) => scenario
            .time_clue(id)
            .map(|c| format!("New report: {}", c.title)),
        UnlockTarget::Flag(_) => None,
    }
}
