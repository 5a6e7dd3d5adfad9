//! Linked account status list

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::Widget,
};

use crate::services::integration::{Phase, ProviderStatus};
use crate::tui::theme::Theme;

const NAME_WIDTH: usize = 14;
const PHASE_WIDTH: usize = 14;
const HINT: &str = "Link with: contribgrid connect <github|drive|freelancer>";

pub struct AccountsView<'a> {
    statuses: &'a [ProviderStatus],
    /// Set when the status load itself failed
    error: Option<&'a str>,
    theme: Theme,
}

impl<'a> AccountsView<'a> {
    pub fn new(statuses: &'a [ProviderStatus], theme: Theme) -> Self {
        Self {
            statuses,
            error: None,
            theme,
        }
    }

    pub fn with_error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }

    fn phase_style(&self, phase: Phase) -> Style {
        match phase {
            Phase::Connected => Style::default().fg(self.theme.ok()),
            Phase::Connecting | Phase::Disconnecting => Style::default().fg(self.theme.date()),
            Phase::Disconnected => Style::default().fg(self.theme.muted()),
        }
    }
}

impl Widget for AccountsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let max_y = area.y + area.height;
        let mut y = area.y;

        for status in self.statuses {
            if y >= max_y {
                return;
            }
            let name = format!("{:<width$}", status.kind.to_string(), width = NAME_WIDTH);
            buf.set_stringn(
                area.x,
                y,
                &name,
                area.width as usize,
                Style::default()
                    .fg(self.theme.text())
                    .add_modifier(Modifier::BOLD),
            );

            let phase_x = area.x + NAME_WIDTH as u16;
            if phase_x < area.x + area.width {
                let phase = format!("{:<width$}", status.phase.to_string(), width = PHASE_WIDTH);
                let room = (area.x + area.width - phase_x) as usize;
                buf.set_stringn(phase_x, y, &phase, room, self.phase_style(status.phase));
            }

            let detail_x = phase_x + PHASE_WIDTH as u16;
            if let Some(detail) = &status.detail {
                if detail_x < area.x + area.width {
                    let room = (area.x + area.width - detail_x) as usize;
                    buf.set_stringn(
                        detail_x,
                        y,
                        detail,
                        room,
                        Style::default().fg(self.theme.text()),
                    );
                }
            }
            y += 1;
        }

        y += 1;
        if let Some(error) = self.error {
            if y < max_y {
                buf.set_stringn(
                    area.x,
                    y,
                    error,
                    area.width as usize,
                    Style::default().fg(self.theme.error()),
                );
                y += 1;
            }
        }
        if y < max_y {
            buf.set_stringn(
                area.x,
                y,
                HINT,
                area.width as usize,
                Style::default().fg(self.theme.muted()),
            );
        }
    }
}
