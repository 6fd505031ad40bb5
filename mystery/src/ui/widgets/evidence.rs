//! Evidence and report board

use std::collections::BTreeSet;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use mystery_core::{ClueStatus, Evidence};

use crate::ui::theme::GameTheme;

/// Everything the investigator has found, plus the reports still on their way.
pub struct EvidenceWidget<'a> {
    evidence: &'a [&'a Evidence],
    clues: &'a [ClueStatus<'a>],
    fresh: &'a BTreeSet<String>,
    scroll: usize,
    theme: &'a GameTheme,
    focused: bool,
}

impl<'a> EvidenceWidget<'a> {
    pub fn new(
        evidence: &'a [&'a Evidence],
        clues: &'a [ClueStatus<'a>],
        fresh: &'a BTreeSet<String>,
        theme: &'a GameTheme,
    ) -> Self {
        Self {
            evidence,
            clues,
            fresh,
            scroll: 0,
            theme,
            focused: false,
        }
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    fn heading(&self, text: &'static str) -> Line<'static> {
        Line::from(Span::styled(
            text,
            Style::default().add_modifier(Modifier::UNDERLINED),
        ))
    }
}

impl Widget for EvidenceWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled(" Case Board ", self.theme.title_style(self.focused)))
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(self.focused));

        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines: Vec<Line> = vec![self.heading("Evidence")];
        if self.evidence.is_empty() {
            lines.push(Line::from(Span::styled(
                "Nothing found yet",
                self.theme.system_style(),
            )));
        }
        for item in self.evidence {
            let fresh = self.fresh.contains(&item.id);
            let mut heading = vec![Span::styled(item.name.clone(), self.theme.evidence_style(fresh))];
            if fresh {
                heading.push(Span::styled(" NEW", self.theme.evidence_style(true)));
            }
            lines.push(Line::from(heading));
            lines.push(Line::from(Span::raw(item.description.clone())));
            lines.push(Line::from(""));
        }

        if !self.clues.is_empty() {
            lines.push(self.heading("Reports"));
            for status in self.clues {
                match status.countdown() {
                    None => {
                        let fresh = self.fresh.contains(&status.clue.id);
                        lines.push(Line::from(Span::styled(
                            status.clue.title.clone(),
                            self.theme.evidence_style(fresh),
                        )));
                        lines.push(Line::from(Span::raw(status.clue.content.clone())));
                    }
                    Some(remaining) => {
                        lines.push(Line::from(vec![
                            Span::styled(status.clue.title.clone(), self.theme.locked_style()),
                            Span::styled(format!(" in {remaining}"), self.theme.system_style()),
                        ]));
                    }
                }
                lines.push(Line::from(""));
            }
        }

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((self.scroll.min(u16::MAX as usize) as u16, 0))
            .render(inner, buf);
    }
}
