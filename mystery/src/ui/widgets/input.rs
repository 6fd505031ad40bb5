//! Question line under the chat pane

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::ui::theme::GameTheme;

/// What the question line is for right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt<'a> {
    /// Nobody is being questioned.
    NoSuspect,
    /// Free text for the named suspect.
    Ask(&'a str),
    /// The named suspect has not answered yet; the frame drives the dots.
    Waiting(&'a str, u8),
    /// A `:` command.
    Command,
}

/// Question line with a cursor that stays in view on long input.
pub struct InputWidget<'a> {
    content: &'a str,
    cursor: usize,
    prompt: Prompt<'a>,
    editing: bool,
    theme: &'a GameTheme,
}

impl<'a> InputWidget<'a> {
    pub fn new(content: &'a str, prompt: Prompt<'a>, theme: &'a GameTheme) -> Self {
        Self {
            content,
            cursor: content.chars().count(),
            prompt,
            editing: false,
            theme,
        }
    }

    /// Cursor position in characters, counting the leading `:` of commands.
    pub fn cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn editing(mut self, editing: bool) -> Self {
        self.editing = editing;
        self
    }

    fn title(&self) -> String {
        match self.prompt {
            Prompt::NoSuspect => " Question ".to_string(),
            Prompt::Ask(name) => format!(" Ask {name} "),
            Prompt::Waiting(name, _) => format!(" {name} is answering "),
            Prompt::Command => " Command ".to_string(),
        }
    }

    fn hint(&self) -> String {
        match self.prompt {
            Prompt::NoSuspect => "Pick a suspect to question...".to_string(),
            Prompt::Ask(name) => format!("What do you want to ask {name}?"),
            Prompt::Waiting(_, frame) => format!("Waiting{}", ".".repeat(usize::from(frame % 3) + 1)),
            Prompt::Command => String::new(),
        }
    }
}

/// First character to draw so that `cursor` fits in `width` columns.
fn window_start(cursor: usize, width: usize) -> usize {
    cursor.saturating_sub(width.saturating_sub(1))
}

impl Widget for InputWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled(self.title(), self.theme.title_style(self.editing)))
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(self.editing));

        let inner = block.inner(area);
        block.render(area, buf);

        let is_command = self.prompt == Prompt::Command;
        let prefix = if is_command { ":" } else { "> " };
        let (text, cursor) = if is_command {
            (
                self.content.strip_prefix(':').unwrap_or(self.content),
                self.cursor.saturating_sub(1),
            )
        } else {
            (self.content, self.cursor)
        };

        let mut spans = vec![Span::styled(prefix, self.theme.player_style())];

        if text.is_empty() && !is_command && !self.editing {
            spans.push(Span::styled(
                self.hint(),
                Style::default().add_modifier(Modifier::DIM),
            ));
        } else {
            let width = usize::from(inner.width).saturating_sub(prefix.len());
            let chars: Vec<char> = text.chars().collect();
            let cursor = cursor.min(chars.len());
            let start = window_start(cursor, width);
            let end = chars.len().min(start + width);

            let before: String = chars[start..cursor].iter().collect();
            let at = chars.get(cursor).copied().unwrap_or(' ');
            let after: String = chars[(cursor + 1).min(end)..end].iter().collect();

            if let Prompt::Waiting(..) = self.prompt {
                // The draft stays visible but cannot be sent yet.
                let dim = Style::default().add_modifier(Modifier::DIM);
                spans.push(Span::styled(before, dim));
                spans.push(Span::styled(at.to_string(), dim));
                spans.push(Span::styled(after, dim));
            } else {
                spans.push(Span::raw(before));
                if self.editing {
                    spans.push(Span::styled(
                        at.to_string(),
                        Style::default()
                            .add_modifier(Modifier::UNDERLINED | Modifier::BOLD)
                            .fg(self.theme.player_text),
                    ));
                } else {
                    spans.push(Span::raw(at.to_string()));
                }
                spans.push(Span::raw(after));
            }
        }

        Paragraph::new(Line::from(spans)).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    fn draw(widget: InputWidget<'_>, width: u16) -> Buffer {
        let area = Rect::new(0, 0, width, 3);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        buf
    }

    #[test]
    fn test_window_keeps_cursor_visible() {
        assert_eq!(window_start(3, 10), 0);
        assert_eq!(window_start(26, 16), 11);
        assert_eq!(window_start(5, 0), 5);
    }

    #[test]
    fn test_long_question_scrolls_to_cursor() {
        let theme = GameTheme::default();
        let text = "abcdefghijklmnopqrstuvwxyz";
        let widget = InputWidget::new(text, Prompt::Ask("Ivy"), &theme).editing(true);
        let buf = draw(widget, 20);

        let line = row(&buf, 1);
        assert!(line.contains("> lmnopqrstuvwxyz"), "got {line:?}");
        assert!(!line.contains('k'));
        assert!(row(&buf, 0).contains("Ask Ivy"));
    }

    #[test]
    fn test_waiting_shows_who_is_answering() {
        let theme = GameTheme::default();
        let widget = InputWidget::new("", Prompt::Waiting("Tom Reed", 1), &theme);
        let buf = draw(widget, 40);

        assert!(row(&buf, 0).contains("Tom Reed is answering"));
        assert!(row(&buf, 1).contains("Waiting.."));
    }

    #[test]
    fn test_command_hides_colon_prefix() {
        let theme = GameTheme::default();
        let widget = InputWidget::new(":talk ivy", Prompt::Command, &theme)
            .cursor(9)
            .editing(true);
        let buf = draw(widget, 30);

        assert!(row(&buf, 1).contains(":talk ivy"));
        assert!(!row(&buf, 1).contains("::"));
    }
}
