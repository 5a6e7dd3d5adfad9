//! Loading view for the contributions tab

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::tui::theme::Theme;

const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Why the contributions are being loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingStage {
    /// First load; a fresh cache may answer it
    Fetching,
    /// Explicit refresh, always hits the network
    Refreshing,
}

impl LoadingStage {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Fetching => "Fetching",
            Self::Refreshing => "Refreshing",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Self::Fetching => "cached data is used when it is fresh",
            Self::Refreshing => "bypassing the local cache",
        }
    }
}

/// Spinner plus what is being fetched for whom
pub struct Spinner<'a> {
    frame: usize,
    stage: LoadingStage,
    username: &'a str,
    year: i32,
    theme: Theme,
}

impl<'a> Spinner<'a> {
    pub fn new(frame: usize, stage: LoadingStage, username: &'a str, year: i32) -> Self {
        Self {
            frame,
            stage,
            username,
            year,
            theme: Theme::default(),
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn current_char(&self) -> char {
        SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()]
    }

    pub fn next_frame(frame: usize) -> usize {
        (frame + 1) % SPINNER_FRAMES.len()
    }

    fn lines(&self) -> Vec<Line<'a>> {
        vec![
            Line::from(vec![
                Span::styled(
                    format!("{} ", self.current_char()),
                    Style::default().fg(self.theme.accent()),
                ),
                Span::styled(
                    format!("{} contributions for ", self.stage.verb()),
                    Style::default().fg(self.theme.text()),
                ),
                Span::styled(
                    format!("@{}", self.username),
                    Style::default()
                        .fg(self.theme.text())
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::styled(
                format!("{} · {}", self.year, self.stage.hint()),
                Style::default().fg(self.theme.muted()),
            ),
        ]
    }
}

impl Widget for Spinner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 2 || area.width < 10 {
            return;
        }
        let [_, body, _] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(2),
            Constraint::Fill(1),
        ])
        .areas(area);
        Paragraph::new(self.lines())
            .alignment(Alignment::Center)
            .render(body, buf);
    }
}
