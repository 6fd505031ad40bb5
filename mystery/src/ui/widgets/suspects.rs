//! Suspect list widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use mystery_core::Character;

use crate::ui::theme::GameTheme;

/// The cast, with the selection cursor and the suspect being questioned.
pub struct SuspectsWidget<'a> {
    characters: &'a [Character],
    selected: usize,
    active: Option<&'a str>,
    theme: &'a GameTheme,
    focused: bool,
}

impl<'a> SuspectsWidget<'a> {
    pub fn new(characters: &'a [Character], theme: &'a GameTheme) -> Self {
        Self {
            characters,
            selected: 0,
            active: None,
            theme,
            focused: false,
        }
    }

    pub fn selected(mut self, selected: usize) -> Self {
        self.selected = selected;
        self
    }

    pub fn active(mut self, active: Option<&'a str>) -> Self {
        self.active = active;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }
}

impl Widget for SuspectsWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled(" Suspects ", self.theme.title_style(self.focused)))
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(self.focused));

        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines: Vec<Line> = Vec::new();
        for (index, character) in self.characters.iter().enumerate() {
            let is_selected = index == self.selected;
            let is_active = self.active == Some(character.id.as_str());

            let marker = if is_active { "● " } else { "  " };
            let mut name_style = Style::default().fg(self.theme.foreground);
            if is_active {
                name_style = self.theme.speaker_style();
            }
            if is_selected && self.focused {
                name_style = name_style.add_modifier(Modifier::REVERSED);
            } else if is_selected {
                name_style = name_style.add_modifier(Modifier::UNDERLINED);
            }

            let number = if index < 9 {
                format!("{} ", index + 1)
            } else {
                "  ".to_string()
            };

            lines.push(Line::from(vec![
                Span::styled(number, self.theme.system_style()),
                Span::styled(marker, self.theme.speaker_style()),
                Span::styled(character.name.clone(), name_style),
            ]));
            lines.push(Line::from(Span::styled(
                format!("    {}", character.role),
                Style::default().add_modifier(Modifier::DIM),
            )));
        }

        // Keep the selection in view
        let visible_pairs = (inner.height as usize / 2).max(1);
        let first = self.selected.saturating_sub(visible_pairs - 1);
        let scroll = (first * 2).min(u16::MAX as usize) as u16;

        Paragraph::new(lines).scroll((scroll, 0)).render(inner, buf);
    }
}
