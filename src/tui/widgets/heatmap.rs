//! 53-week contribution heatmap widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::Widget,
};

use crate::services::grid::{DaySlot, HeatmapLayout, DAYS_PER_WEEK, WEEKS};
use crate::tui::theme::Theme;

const LABEL_WIDTH: u16 = 4; // "Sun " prefix
const GRID_COLUMNS: u16 = WEEKS as u16;

/// Box drawing characters for the bordered layout
const BOX_TOP_LEFT: &str = "┌";
const BOX_TOP_RIGHT: &str = "┐";
const BOX_BOTTOM_LEFT: &str = "└";
const BOX_BOTTOM_RIGHT: &str = "┘";
const BOX_HORIZONTAL: &str = "─";
const BOX_VERTICAL: &str = "│";
const BOX_T_DOWN: &str = "┬";
const BOX_T_UP: &str = "┴";
const BOX_T_RIGHT: &str = "├";
const BOX_T_LEFT: &str = "┤";
const BOX_CROSS: &str = "┼";

/// Rows top to bottom, Sunday first to match the grid
const DAY_LABELS: [&str; DAYS_PER_WEEK] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// How cells are drawn, picked from the available area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMode {
    /// 2-char cells inside box-drawing borders
    Boxed,
    /// 2-char cells, no borders
    Wide,
    /// 1-char cells, no borders
    Narrow,
}

impl CellMode {
    /// Largest mode whose full 53 columns fit
    pub fn for_area(width: u16, height: u16) -> Self {
        if width >= Self::Boxed.grid_width() && height >= Self::Boxed.height() {
            Self::Boxed
        } else if width >= Self::Wide.grid_width() {
            Self::Wide
        } else {
            Self::Narrow
        }
    }

    /// Horizontal step between columns
    fn cell_width(self) -> u16 {
        match self {
            Self::Boxed => 3,
            Self::Wide => 2,
            Self::Narrow => 1,
        }
    }

    fn cell_symbol(self) -> &'static str {
        match self {
            Self::Boxed => "██",
            Self::Wide | Self::Narrow => "■",
        }
    }

    /// Month label row plus the grid
    pub fn height(self) -> u16 {
        match self {
            Self::Boxed => 1 + 1 + DAYS_PER_WEEK as u16 * 2,
            Self::Wide | Self::Narrow => 1 + DAYS_PER_WEEK as u16,
        }
    }

    pub fn grid_width(self) -> u16 {
        match self {
            Self::Boxed => LABEL_WIDTH + 1 + GRID_COLUMNS * 3,
            Self::Wide | Self::Narrow => LABEL_WIDTH + GRID_COLUMNS * self.cell_width(),
        }
    }

    /// Row offset of `day` below the top of the grid
    fn row_offset(self, day: usize) -> u16 {
        match self {
            Self::Boxed => 1 + day as u16 * 2,
            Self::Wide | Self::Narrow => day as u16,
        }
    }

    /// Column offset of `week` right of the day labels
    fn column_offset(self, week: usize) -> u16 {
        match self {
            Self::Boxed => 1 + week as u16 * 3,
            Self::Wide | Self::Narrow => week as u16 * self.cell_width(),
        }
    }
}

/// Heatmap widget for ratatui
pub struct Heatmap<'a> {
    layout: &'a HeatmapLayout,
    theme: Theme,
    /// Highlighted (week, day)
    cursor: Option<(usize, usize)>,
}

impl<'a> Heatmap<'a> {
    pub fn new(layout: &'a HeatmapLayout, theme: Theme) -> Self {
        Self {
            layout,
            theme,
            cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Option<(usize, usize)>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Calculate x_offset for centering the heatmap
    fn calculate_x_offset(mode: CellMode, area: Rect) -> u16 {
        area.width.saturating_sub(mode.grid_width()) / 2
    }

    fn render_month_labels(&self, mode: CellMode, area: Rect, buf: &mut Buffer, start_x: u16) {
        let max_x = area.x + area.width;
        let style = Style::default().fg(self.theme.muted());
        let mut next_free_x = start_x;

        for label in &self.layout.months {
            let x = start_x + mode.column_offset(label.week_index);
            let name = label.name();
            // Narrow cells can put two months within one label width
            if x < next_free_x || x + name.len() as u16 > max_x {
                continue;
            }
            buf.set_string(x, area.y, name, style);
            next_free_x = x + name.len() as u16 + 1;
        }
    }

    fn render_cells(&self, mode: CellMode, area: Rect, buf: &mut Buffer, start_x: u16, top: u16) {
        let max_x = area.x + area.width;
        let max_y = area.y + area.height;
        let label_style = Style::default().fg(self.theme.muted());

        for (day, label) in DAY_LABELS.iter().enumerate() {
            let y = top + mode.row_offset(day);
            if y >= max_y {
                break;
            }
            buf.set_string(start_x - LABEL_WIDTH, y, label, label_style);

            for (week, column) in self.layout.grid.weeks.iter().enumerate() {
                let x = start_x + mode.column_offset(week);
                if x + mode.cell_width() > max_x {
                    break;
                }
                let slot = &column[day];
                if slot.is_masked() {
                    continue;
                }
                let mut style = Style::default().fg(self.theme.heatmap_color(slot.level()));
                if self.cursor == Some((week, day)) {
                    style = style.bg(self.theme.accent()).add_modifier(Modifier::BOLD);
                }
                buf.set_string(x, y, mode.cell_symbol(), style);
            }
        }
    }

    /// Borders for the boxed layout: ┌──┬──┐ / ├──┼──┤ / └──┴──┘ plus verticals
    fn render_borders(&self, area: Rect, buf: &mut Buffer, start_x: u16, top: u16) {
        let max_x = area.x + area.width;
        let max_y = area.y + area.height;
        let border_style = Style::default().fg(self.theme.muted());

        for row in 0..=DAYS_PER_WEEK {
            let y = top + row as u16 * 2;
            if y >= max_y {
                break;
            }
            let (left, mid, right) = match row {
                0 => (BOX_TOP_LEFT, BOX_T_DOWN, BOX_TOP_RIGHT),
                DAYS_PER_WEEK => (BOX_BOTTOM_LEFT, BOX_T_UP, BOX_BOTTOM_RIGHT),
                _ => (BOX_T_RIGHT, BOX_CROSS, BOX_T_LEFT),
            };
            if start_x < max_x {
                buf.set_string(start_x, y, left, border_style);
            }
            for col in 0..WEEKS {
                let x = start_x + 1 + col as u16 * 3;
                if x + 2 >= max_x {
                    break;
                }
                buf.set_string(x, y, BOX_HORIZONTAL, border_style);
                buf.set_string(x + 1, y, BOX_HORIZONTAL, border_style);
                let joint = if col < WEEKS - 1 { mid } else { right };
                buf.set_string(x + 2, y, joint, border_style);
            }

            // Verticals on the content row below this border
            let content_y = y + 1;
            if row < DAYS_PER_WEEK && content_y < max_y {
                if start_x < max_x {
                    buf.set_string(start_x, content_y, BOX_VERTICAL, border_style);
                }
                for col in 0..WEEKS {
                    let x = start_x + 1 + col as u16 * 3 + 2;
                    if x >= max_x {
                        break;
                    }
                    buf.set_string(x, content_y, BOX_VERTICAL, border_style);
                }
            }
        }
    }
}

impl Widget for Heatmap<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width <= LABEL_WIDTH || area.height < 2 {
            return;
        }
        let mode = CellMode::for_area(area.width, area.height);
        let start_x = area.x + Self::calculate_x_offset(mode, area) + LABEL_WIDTH;
        let top = area.y + 1;

        self.render_month_labels(mode, area, buf, start_x);
        if mode == CellMode::Boxed {
            self.render_borders(area, buf, start_x, top);
        }
        self.render_cells(mode, area, buf, start_x, top);
    }
}

/// Slot under the cursor, if any
pub fn slot_at(layout: &HeatmapLayout, cursor: (usize, usize)) -> Option<&DaySlot> {
    layout.grid.slot(cursor.0, cursor.1)
}
