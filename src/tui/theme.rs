//! Terminal theme detection and color definitions

use ratatui::style::Color;

use crate::types::ContributionLevel;

/// Terminal color scheme (dark or light background)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    /// Auto-detect terminal theme from background luminance.
    /// Must be called **before** entering raw mode (ratatui::init).
    /// Falls back to Dark if detection fails.
    pub fn detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.6 => Self::Light,
            _ => Self::Dark,
        }
    }

    /// Primary text color (headers, body text)
    pub fn text(self) -> Color {
        match self {
            Self::Dark => Color::White,
            Self::Light => Color::Black,
        }
    }

    /// Active/accent color (selected tabs, keybinding keys, cursor)
    pub fn accent(self) -> Color {
        match self {
            Self::Dark => Color::Cyan,
            Self::Light => Color::Indexed(25), // dark blue (ANSI 256)
        }
    }

    /// Secondary/muted text (labels, inactive tabs, hints)
    pub fn muted(self) -> Color {
        match self {
            Self::Dark => Color::DarkGray,
            Self::Light => Color::Gray,
        }
    }

    /// Date and year text color
    pub fn date(self) -> Color {
        match self {
            Self::Dark => Color::Yellow,
            Self::Light => Color::Indexed(130), // dark orange/yellow (ANSI 256)
        }
    }

    /// Connected / positive indicator color
    pub fn ok(self) -> Color {
        match self {
            Self::Dark => Color::Green,
            Self::Light => Color::Indexed(22), // dark green (ANSI 256)
        }
    }

    /// Error/negative indicator color
    pub fn error(self) -> Color {
        match self {
            Self::Dark => Color::Red,
            Self::Light => Color::Indexed(124), // dark red (ANSI 256)
        }
    }

    /// Heatmap swatch for a contribution level
    pub fn heatmap_color(self, level: ContributionLevel) -> Color {
        match self {
            Self::Dark => match level {
                ContributionLevel::None => Color::Indexed(236),
                ContributionLevel::Low => Color::Indexed(22),
                ContributionLevel::Medium => Color::Indexed(28),
                ContributionLevel::High => Color::Indexed(34),
                ContributionLevel::Max => Color::Indexed(40),
            },
            // Light backgrounds get the web palette as-is
            Self::Light => {
                let (r, g, b) = level.color().rgb();
                Color::Rgb(r, g, b)
            }
        }
    }
}
