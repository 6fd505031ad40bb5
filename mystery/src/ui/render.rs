//! Render orchestration for the mystery TUI

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use mystery_core::Verdict;

use crate::app::{App, InputMode};
use crate::ui::layout::{centered_rect_fixed, AppLayout};
use crate::ui::widgets::{
    ChatWidget, EvidenceWidget, HotkeyBarWidget, InputWidget, Prompt, StatusBarWidget,
    SuspectsWidget,
};

/// Which panel is focused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusedPanel {
    #[default]
    Suspects,
    Chat,
    Evidence,
}

/// Overlay types
#[derive(Debug, Clone)]
pub enum Overlay {
    Help,
    /// The case outline.
    Briefing,
    ConfirmReset,
    ConfirmAccuse { character_id: String },
    Verdict(Verdict),
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let layout = AppLayout::calculate(area);

    render_title_bar(frame, app, layout.title_area);

    let characters = &app.scenario().characters;
    let active = app.session.active_character();

    let suspects = SuspectsWidget::new(characters, &app.theme)
        .selected(app.selected_suspect)
        .active(active.map(|c| c.id.as_str()))
        .focused(app.focused_panel == FocusedPanel::Suspects);
    frame.render_widget(suspects, layout.suspects_area);

    let turns = active.map(|c| app.session.history(&c.id)).unwrap_or(&[]);
    let thinking = app.is_awaiting_active().then_some(app.animation_frame);
    let chat = ChatWidget::new(active, turns, &app.theme)
        .outline(&app.scenario().case.outline)
        .scroll(app.chat_scroll)
        .focused(app.focused_panel == FocusedPanel::Chat)
        .thinking(thinking);
    frame.render_widget(chat, layout.chat_area);

    let evidence = app.session.visible_evidence();
    let clues = app.session.clue_status();
    let board = EvidenceWidget::new(&evidence, &clues, app.fresh(), &app.theme)
        .scroll(app.evidence_scroll)
        .focused(app.focused_panel == FocusedPanel::Evidence);
    frame.render_widget(board, layout.evidence_area);

    render_status_bar(frame, app, layout.status_bar);

    let hotkeys = HotkeyBarWidget::new(app.input_mode, active.is_some());
    frame.render_widget(hotkeys, layout.hotkey_bar);

    render_input(frame, app, layout.input_area);

    if let Some(overlay) = app.overlay() {
        render_overlay(frame, app, overlay, area);
    }
}

/// Render the title bar
fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let elapsed = app.session.elapsed_ms() / 1000;
    let title = format!(
        " {} | {}:{:02} ",
        app.scenario().case.title,
        elapsed / 60,
        elapsed % 60
    );

    let line = Line::from(Span::styled(
        title,
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let scenario = app.scenario();
    let status = StatusBarWidget::new(app.input_mode, &app.theme)
        .talking_to(app.session.active_character().map(|c| c.name.as_str()))
        .evidence(app.session.visible_evidence().len(), scenario.evidences.len())
        .reports(app.session.unlocked_clues().len(), scenario.time_clues.len())
        .message(app.status_message());

    frame.render_widget(status, area);
}

/// Render the input area
fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let prompt = match (app.input_mode, app.session.active_character()) {
        (InputMode::Command, _) => Prompt::Command,
        (_, Some(c)) if app.is_awaiting_active() => Prompt::Waiting(&c.name, app.animation_frame),
        (_, Some(c)) => Prompt::Ask(&c.name),
        (_, None) => Prompt::NoSuspect,
    };

    let input_widget = InputWidget::new(app.input_buffer(), prompt, &app.theme)
        .cursor(app.cursor_position())
        .editing(matches!(app.input_mode, InputMode::Insert | InputMode::Command));

    frame.render_widget(input_widget, area);
}

/// Render overlay
fn render_overlay(frame: &mut Frame, app: &App, overlay: &Overlay, area: Rect) {
    match overlay {
        Overlay::Help => render_help_overlay(frame, app, area),
        Overlay::Briefing => render_briefing_overlay(frame, app, area),
        Overlay::ConfirmReset => render_confirm(
            frame,
            app,
            " Start Over ",
            "Erase all progress and restart the clock?".to_string(),
            area,
        ),
        Overlay::ConfirmAccuse { character_id } => {
            let name = app
                .scenario()
                .character(character_id)
                .map(|c| c.name.as_str())
                .unwrap_or(character_id);
            render_confirm(frame, app, " Accuse ", format!("Accuse {name} of the crime?"), area)
        }
        Overlay::Verdict(verdict) => render_verdict_overlay(frame, app, verdict, area),
    }
}

fn section(title: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        title,
        Style::default().add_modifier(Modifier::UNDERLINED),
    ))
}

fn close_hint(text: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        text,
        Style::default().add_modifier(Modifier::DIM),
    ))
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let popup_area = centered_rect_fixed(54, 28, area);
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled(
            " Mystery - Help ",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        section("Input Modes:"),
        Line::from("  i       Ask the current suspect (INSERT mode)"),
        Line::from("  :       Enter COMMAND mode"),
        Line::from("  Esc     Return to NORMAL mode"),
        Line::from(""),
        section("Suspects (NORMAL mode):"),
        Line::from("  j/k     Select suspect / scroll panel"),
        Line::from("  Enter   Question the selected suspect"),
        Line::from("  1-9     Question suspect by number"),
        Line::from("  b       Leave the conversation"),
        Line::from("  A       Accuse the selected suspect"),
        Line::from("  Tab     Cycle panel focus"),
        Line::from("  g/G     Jump to top/bottom of the chat"),
        Line::from("  c       Show the case outline"),
        Line::from("  q       Quit"),
        Line::from(""),
        section("Commands:"),
        Line::from("  :talk <name>     Question a suspect"),
        Line::from("  :accuse <name>   Name the culprit"),
        Line::from("  :back            Leave the conversation"),
        Line::from("  :reset           Erase progress and start over"),
        Line::from("  :q               Quit"),
        Line::from(""),
        close_hint("Press Esc or q to close"),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));

    let paragraph = Paragraph::new(help_text)
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, popup_area);
}

/// Render the case outline
fn render_briefing_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let popup_area = centered_rect_fixed(64, 18, area);
    frame.render_widget(Clear, popup_area);

    let case = &app.scenario().case;
    let mut lines = vec![
        Line::from(Span::styled(
            case.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(case.outline.lines().map(|l| Line::from(l.to_string())));
    lines.push(Line::from(""));
    lines.push(Line::from(format!(
        "{} suspects are waiting to be questioned. Find the culprit.",
        app.scenario().characters.len()
    )));
    lines.push(Line::from(""));
    lines.push(close_hint("Press Enter to begin"));

    let block = Block::default()
        .title(" Case File ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

/// Render a yes/no question
fn render_confirm(frame: &mut Frame, app: &App, title: &str, question: String, area: Rect) {
    let popup_area = centered_rect_fixed(48, 7, area);
    frame.render_widget(Clear, popup_area);

    let lines = vec![
        Line::from(""),
        Line::from(question),
        Line::from(""),
        close_hint("y: yes   n/Esc: no"),
    ];

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

/// Render the verdict
fn render_verdict_overlay(frame: &mut Frame, app: &App, verdict: &Verdict, area: Rect) {
    let popup_area = centered_rect_fixed(64, 16, area);
    frame.render_widget(Clear, popup_area);

    let style = app.theme.verdict_style(verdict.is_correct());
    let mut lines = Vec::new();
    match verdict {
        Verdict::Correct {
            culprit_name,
            truth,
            ..
        } => {
            lines.push(Line::from(Span::styled(
                format!("Case closed! {culprit_name} is the culprit."),
                style,
            )));
            lines.push(Line::from(""));
            lines.extend(truth.lines().map(|l| Line::from(l.to_string())));
            lines.push(Line::from(""));
            lines.push(close_hint("Press Esc to keep exploring, :reset to play again"));
        }
        Verdict::Incorrect { message, .. } => {
            lines.push(Line::from(Span::styled(message.clone(), style)));
            lines.push(Line::from(""));
            lines.push(Line::from("Keep digging. You may accuse again."));
            lines.push(Line::from(""));
            lines.push(close_hint("Press Esc to close"));
        }
    }

    let block = Block::default()
        .title(" Verdict ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(style.fg.unwrap_or(Color::White)));

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}
