//! "Less ■ ■ ■ ■ ■ More" intensity legend

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::Widget,
};

use crate::tui::theme::Theme;
use crate::types::ContributionLevel;

const LESS: &str = "Less";
const MORE: &str = "More";

pub struct Legend {
    theme: Theme,
}

impl Legend {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    /// "Less" + 5 swatches ("■ ") + "More", with single spaces around
    pub fn width() -> u16 {
        (LESS.len() + 1 + ContributionLevel::all().len() * 2 + MORE.len()) as u16
    }
}

impl Widget for Legend {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width < Self::width() {
            return;
        }
        // Right-aligned under the grid, as on GitHub
        let mut x = area.x + area.width - Self::width();
        let muted = Style::default().fg(self.theme.muted());

        buf.set_string(x, area.y, LESS, muted);
        x += LESS.len() as u16 + 1;
        for level in ContributionLevel::all() {
            buf.set_string(
                x,
                area.y,
                "■",
                Style::default().fg(self.theme.heatmap_color(level)),
            );
            x += 2;
        }
        buf.set_string(x, area.y, MORE, muted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legend_width() {
        assert_eq!(Legend::width(), 4 + 1 + 10 + 4);
    }

    #[test]
    fn test_legend_renders_right_aligned() {
        let area = Rect::new(0, 0, 30, 1);
        let mut buf = Buffer::empty(area);
        Legend::new(Theme::Dark).render(area, &mut buf);

        // Starts at 30 - 19 = 11
        assert_eq!(buf[(11, 0)].symbol(), "L");
        assert_eq!(buf[(16, 0)].symbol(), "■");
        assert_eq!(
            buf[(16, 0)].fg,
            Theme::Dark.heatmap_color(ContributionLevel::None)
        );
        assert_eq!(
            buf[(24, 0)].fg,
            Theme::Dark.heatmap_color(ContributionLevel::Max)
        );
        assert_eq!(buf[(26, 0)].symbol(), "M");
    }

    #[test]
    fn test_legend_skips_narrow_area() {
        let area = Rect::new(0, 0, 10, 1);
        let mut buf = Buffer::empty(area);
        Legend::new(Theme::Dark).render(area, &mut buf);
        assert_eq!(buf[(0, 0)].symbol(), " ");
    }
}
