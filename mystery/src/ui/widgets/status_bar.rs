//! Status and hotkey bars

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::app::InputMode;
use crate::ui::theme::GameTheme;

/// Status bar showing mode, progress and the latest message
pub struct StatusBarWidget<'a> {
    input_mode: InputMode,
    talking_to: Option<&'a str>,
    evidence: (usize, usize),
    reports: (usize, usize),
    theme: &'a GameTheme,
    message: Option<&'a str>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(input_mode: InputMode, theme: &'a GameTheme) -> Self {
        Self {
            input_mode,
            talking_to: None,
            evidence: (0, 0),
            reports: (0, 0),
            theme,
            message: None,
        }
    }

    pub fn talking_to(mut self, name: Option<&'a str>) -> Self {
        self.talking_to = name;
        self
    }

    /// Found and total evidence.
    pub fn evidence(mut self, found: usize, total: usize) -> Self {
        self.evidence = (found, total);
        self
    }

    /// Arrived and total reports.
    pub fn reports(mut self, found: usize, total: usize) -> Self {
        self.reports = (found, total);
        self
    }

    pub fn message(mut self, message: Option<&'a str>) -> Self {
        self.message = message;
        self
    }
}

impl Widget for StatusBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (input_mode_text, input_mode_style) = match self.input_mode {
            InputMode::Normal => ("NORMAL", Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)),
            InputMode::Insert => ("INSERT", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            InputMode::Command => ("COMMAND", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        };

        let talking = match self.talking_to {
            Some(name) => Span::styled(format!("Talking to {name}"), self.theme.suspect_style()),
            None => Span::styled("Nobody", self.theme.system_style()),
        };

        let mut spans = vec![
            Span::styled(format!("-- {input_mode_text} --"), input_mode_style),
            Span::raw(" | "),
            talking,
            Span::raw(" | "),
            Span::raw(format!("Evidence {}/{}", self.evidence.0, self.evidence.1)),
        ];
        if self.reports.1 > 0 {
            spans.push(Span::raw(" | "));
            spans.push(Span::raw(format!("Reports {}/{}", self.reports.0, self.reports.1)));
        }

        if let Some(msg) = self.message {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                msg,
                Style::default().add_modifier(Modifier::DIM),
            ));
        }

        Paragraph::new(Line::from(spans)).render(area, buf);
    }
}

/// Hotkey bar widget
pub struct HotkeyBarWidget {
    input_mode: InputMode,
    in_conversation: bool,
}

impl HotkeyBarWidget {
    pub fn new(input_mode: InputMode, in_conversation: bool) -> Self {
        Self {
            input_mode,
            in_conversation,
        }
    }
}

impl Widget for HotkeyBarWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let hotkeys = match self.input_mode {
            InputMode::Normal if self.in_conversation => vec![
                ("i:ask", true),
                ("b:leave", true),
                ("j/k:scroll", true),
                ("A:accuse", true),
                ("Tab:panel", false),
                ("?:help", false),
            ],
            InputMode::Normal => vec![
                ("j/k:select", true),
                ("Enter:talk", true),
                ("A:accuse", true),
                ("c:case", false),
                ("::command", false),
                ("?:help", false),
            ],
            InputMode::Insert => vec![
                ("Esc:normal", true),
                ("Enter:send", true),
                ("↑↓:history", false),
            ],
            InputMode::Command => vec![
                ("Esc:cancel", true),
                ("Enter:execute", true),
                (":talk name", false),
                (":accuse name", false),
                (":reset", false),
                (":q quit", false),
            ],
        };

        let spans: Vec<Span> = hotkeys
            .iter()
            .flat_map(|(text, primary)| {
                let style = if *primary {
                    Style::default()
                } else {
                    Style::default().add_modifier(Modifier::DIM)
                };
                vec![Span::styled(*text, style), Span::raw("  ")]
            })
            .collect();

        Paragraph::new(Line::from(spans)).render(area, buf);
    }
}
