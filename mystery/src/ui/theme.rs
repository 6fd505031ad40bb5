//! Color theme and styling for the mystery TUI

use ratatui::style::{Color, Modifier, Style};

/// Game UI color theme
#[derive(Debug, Clone)]
pub struct GameTheme {
    // Base colors
    pub foreground: Color,
    pub border: Color,
    pub border_focused: Color,

    // Text colors
    pub player_text: Color,
    pub suspect_text: Color,
    pub system_text: Color,

    // Case board colors
    pub evidence: Color,
    pub fresh: Color,
    pub locked: Color,

    // Verdict colors
    pub solved: Color,
    pub wrong: Color,
}

impl Default for GameTheme {
    fn default() -> Self {
        Self {
            foreground: Color::White,
            border: Color::DarkGray,
            border_focused: Color::Cyan,

            player_text: Color::Cyan,
            suspect_text: Color::Yellow,
            system_text: Color::DarkGray,

            evidence: Color::White,
            fresh: Color::LightGreen,
            locked: Color::DarkGray,

            solved: Color::Green,
            wrong: Color::LightRed,
        }
    }
}

impl GameTheme {
    /// Style for the investigator's questions
    pub fn player_style(&self) -> Style {
        Style::default()
            .fg(self.player_text)
            .add_modifier(Modifier::ITALIC)
    }

    /// Style for suspect replies
    pub fn suspect_style(&self) -> Style {
        Style::default().fg(self.suspect_text)
    }

    /// Style for the speaker label in front of a reply
    pub fn speaker_style(&self) -> Style {
        self.suspect_style().add_modifier(Modifier::BOLD)
    }

    /// Style for system messages
    pub fn system_style(&self) -> Style {
        Style::default()
            .fg(self.system_text)
            .add_modifier(Modifier::DIM)
    }

    /// Style for an evidence or report heading
    pub fn evidence_style(&self, fresh: bool) -> Style {
        let style = Style::default().add_modifier(Modifier::BOLD);
        if fresh {
            style.fg(self.fresh)
        } else {
            style.fg(self.evidence)
        }
    }

    /// Style for a report that has not arrived yet
    pub fn locked_style(&self) -> Style {
        Style::default()
            .fg(self.locked)
            .add_modifier(Modifier::ITALIC)
    }

    /// Style for a verdict
    pub fn verdict_style(&self, correct: bool) -> Style {
        Style::default()
            .fg(if correct { self.solved } else { self.wrong })
            .add_modifier(Modifier::BOLD)
    }

    /// Get border style
    pub fn border_style(&self, focused: bool) -> Style {
        Style::default().fg(if focused {
            self.border_focused
        } else {
            self.border
        })
    }

    /// Get title style
    pub fn title_style(&self, focused: bool) -> Style {
        let style = Style::default().fg(if focused {
            self.border_focused
        } else {
            self.foreground
        });

        if focused {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        }
    }
}
