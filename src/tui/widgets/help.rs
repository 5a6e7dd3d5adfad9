//! Help overlay listing the key table

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

use crate::tui::keymap::{self, Binding};
use crate::tui::theme::Theme;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const POPUP_WIDTH: u16 = 42;
const KEY_COLUMN: usize = 18;

pub struct HelpPopup {
    theme: Theme,
}

impl HelpPopup {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    /// Borders, blank top row, close hint and a blank row above it
    fn height() -> u16 {
        let rows: usize = keymap::sections()
            .iter()
            .map(|(_, bindings)| bindings.len() + 2)
            .sum();
        rows as u16 + 5
    }

    /// Centered rectangle sized to the key table, clamped to `area`
    pub fn centered_area(area: Rect) -> Rect {
        let width = POPUP_WIDTH.min(area.width);
        let height = Self::height().min(area.height);
        Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        }
    }

    fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let header = Style::default()
            .fg(self.theme.date())
            .add_modifier(Modifier::BOLD);
        let muted = Style::default().fg(self.theme.muted());

        let mut lines = vec![Line::default()];
        for (section, bindings) in keymap::sections() {
            lines.push(Line::styled(section.title(), header));
            lines.push(Line::styled("─".repeat(width as usize), muted));
            lines.extend(bindings.into_iter().map(|b| self.binding_line(b)));
        }
        lines.push(Line::default());
        lines.push(Line::styled("Press ? to close", muted).alignment(Alignment::Center));
        lines
    }

    fn binding_line(&self, binding: &Binding) -> Line<'static> {
        Line::from(vec![
            Span::styled(
                format!("  {:<width$}", binding.label, width = KEY_COLUMN),
                Style::default().fg(self.theme.accent()),
            ),
            Span::styled(binding.description, Style::default().fg(self.theme.text())),
        ])
    }
}

impl Widget for HelpPopup {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let block = Block::default()
            .title(format!(" contribgrid v{} ", VERSION))
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent()));
        let inner = block.inner(area);

        Paragraph::new(self.lines(inner.width))
            .block(block)
            .render(area, buf);
    }
}
