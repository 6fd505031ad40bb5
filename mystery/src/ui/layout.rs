//! Layout calculations for the mystery TUI

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// The main layout areas
pub struct AppLayout {
    pub title_area: Rect,
    pub suspects_area: Rect,
    pub chat_area: Rect,
    pub evidence_area: Rect,
    pub status_bar: Rect,
    pub hotkey_bar: Rect,
    pub input_area: Rect,
}

impl AppLayout {
    /// Calculate layout based on terminal size
    pub fn calculate(area: Rect) -> Self {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Title bar
                Constraint::Min(8),    // Main content
                Constraint::Length(1), // Status bar
                Constraint::Length(1), // Hotkey bar
                Constraint::Length(3), // Input area
            ])
            .split(area);

        // Suspects | chat | evidence
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(22),
                Constraint::Percentage(50),
                Constraint::Percentage(28),
            ])
            .split(main_chunks[1]);

        Self {
            title_area: main_chunks[0],
            suspects_area: content_chunks[0],
            chat_area: content_chunks[1],
            evidence_area: content_chunks[2],
            status_bar: main_chunks[2],
            hotkey_bar: main_chunks[3],
            input_area: main_chunks[4],
        }
    }
}

/// Calculate fixed-size centered popup
pub fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;

    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_fills_terminal() {
        let layout = AppLayout::calculate(Rect::new(0, 0, 100, 30));
        assert_eq!(layout.title_area.height, 1);
        assert_eq!(layout.input_area.height, 3);
        assert_eq!(
            layout.suspects_area.width + layout.chat_area.width + layout.evidence_area.width,
            100
        );
    }

    #[test]
    fn test_popup_never_exceeds_area() {
        let area = Rect::new(0, 0, 40, 10);
        let popup = centered_rect_fixed(60, 20, area);
        assert_eq!(popup, area);

        let popup = centered_rect_fixed(20, 4, area);
        assert_eq!(popup, Rect::new(10, 3, 20, 4));
    }
}
