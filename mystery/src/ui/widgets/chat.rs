//! Conversation display widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols::scrollbar,
    text::{Line, Span},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
        StatefulWidget, Widget, Wrap,
    },
};

use mystery_core::{Character, ConversationTurn, Speaker};

use crate::ui::theme::GameTheme;

/// Widget showing the conversation with the active suspect.
///
/// With nobody selected it shows the case outline instead.
pub struct ChatWidget<'a> {
    character: Option<&'a Character>,
    turns: &'a [ConversationTurn],
    outline: &'a str,
    scroll: usize,
    theme: &'a GameTheme,
    focused: bool,
    thinking: Option<u8>,
}

impl<'a> ChatWidget<'a> {
    pub fn new(
        character: Option<&'a Character>,
        turns: &'a [ConversationTurn],
        theme: &'a GameTheme,
    ) -> Self {
        Self {
            character,
            turns,
            outline: "",
            scroll: 0,
            theme,
            focused: false,
            thinking: None,
        }
    }

    pub fn outline(mut self, outline: &'a str) -> Self {
        self.outline = outline;
        self
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Show a typing indicator, animated by `frame`.
    pub fn thinking(mut self, frame: Option<u8>) -> Self {
        self.thinking = frame;
        self
    }

    fn build_lines(&self, character: &Character) -> Vec<Line<'a>> {
        let mut lines: Vec<Line> = Vec::new();

        for turn in self.turns {
            match turn.role {
                Speaker::Player => {
                    for (i, text) in turn.text.lines().enumerate() {
                        let prefix = if i == 0 { "> " } else { "  " };
                        lines.push(Line::from(Span::styled(
                            format!("{prefix}{text}"),
                            self.theme.player_style(),
                        )));
                    }
                }
                Speaker::Character => {
                    for (i, text) in turn.text.lines().enumerate() {
                        if i == 0 {
                            lines.push(Line::from(vec![
                                Span::styled(format!("{}: ", character.name), self.theme.speaker_style()),
                                Span::styled(text.to_string(), self.theme.suspect_style()),
                            ]));
                        } else {
                            lines.push(Line::from(Span::styled(
                                text.to_string(),
                                self.theme.suspect_style(),
                            )));
                        }
                    }
                }
            }
            lines.push(Line::from(""));
        }

        if let Some(frame) = self.thinking {
            let dots = ".".repeat(usize::from(frame / 3 % 3) + 1);
            lines.push(Line::from(Span::styled(
                format!("{} is thinking{dots}", character.name),
                self.theme.system_style(),
            )));
        }

        lines
    }

    fn outline_lines(&self) -> Vec<Line<'a>> {
        let mut lines: Vec<Line> = self
            .outline
            .lines()
            .map(|l| Line::from(Span::raw(l.to_string())))
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "[ Pick a suspect on the left and press Enter to question them ]",
            self.theme.system_style(),
        )));
        lines
    }
}

/// Rows a line occupies once wrapped to `width` columns.
fn wrapped_height(line: &Line, width: usize) -> usize {
    if width == 0 {
        return 1;
    }
    let chars: usize = line.spans.iter().map(|s| s.content.chars().count()).sum();
    chars.div_ceil(width).max(1)
}

impl Widget for ChatWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.character {
            Some(c) if self.focused => format!(" {} - {} [j/k scroll] ", c.name, c.role),
            Some(c) => format!(" {} - {} ", c.name, c.role),
            None => " Case File ".to_string(),
        };

        let block = Block::default()
            .title(Span::styled(title, self.theme.title_style(self.focused)))
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(self.focused));

        let inner = block.inner(area);
        block.render(area, buf);

        let Some(character) = self.character else {
            Paragraph::new(self.outline_lines())
                .wrap(Wrap { trim: false })
                .render(inner, buf);
            return;
        };

        let lines = self.build_lines(character);

        // Leave a column for the scrollbar
        let text_width = inner.width.saturating_sub(1) as usize;
        let visible_height = inner.height as usize;
        let total_lines: usize = lines.iter().map(|l| wrapped_height(l, text_width)).sum();
        let max_scroll = total_lines.saturating_sub(visible_height);
        let scroll = self.scroll.min(max_scroll);

        let text_area = Rect {
            width: inner.width.saturating_sub(1),
            ..inner
        };
        Paragraph::new(lines)
            .scroll((scroll.min(u16::MAX as usize) as u16, 0))
            .wrap(Wrap { trim: false })
            .render(text_area, buf);

        if total_lines > visible_height {
            let scrollbar_area = Rect {
                x: inner.x + inner.width.saturating_sub(1),
                y: inner.y,
                width: 1,
                height: inner.height,
            };

            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .symbols(scrollbar::VERTICAL)
                .thumb_style(Style::default().fg(Color::DarkGray))
                .track_style(Style::default().fg(Color::Black))
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"));

            let mut scrollbar_state = ScrollbarState::new(max_scroll).position(scroll);
            scrollbar.render(scrollbar_area, buf, &mut scrollbar_state);

            // Hint at bottom if more content below
            if scroll < max_scroll {
                let hint = format!(" ↓{} more ", max_scroll - scroll);
                let hint_y = inner.y + inner.height.saturating_sub(1);
                let hint_style = Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::DIM);
                for (i, ch) in hint.chars().enumerate() {
                    let x = inner.x + (i as u16);
                    if x < inner.x + inner.width.saturating_sub(2) {
                        buf[(x, hint_y)].set_char(ch).set_style(hint_style);
                    }
                }
            }
        }
    }
}
