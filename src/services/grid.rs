//! Contribution grid builder
//!
//! Lays a sparse list of per-day records out on a fixed 53 x 7 grid whose
//! first column starts on the Sunday on or before January 1st. The grid and
//! the month labels share a single anchor computed by [`YearSpan`].

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::types::{ColorToken, ContributionLevel, ContributionRecord};

/// Columns in every grid, regardless of year
pub const WEEKS: usize = 53;
/// Rows per column, Sunday first
pub const DAYS_PER_WEEK: usize = 7;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Calendar bounds of one year plus its Sunday grid anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearSpan {
    pub year: i32,
    pub first: NaiveDate,
    pub last: NaiveDate,
    /// Sunday on or before `first`
    pub start: NaiveDate,
}

impl YearSpan {
    /// `None` only for years chrono cannot represent
    pub fn new(year: i32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31)?;
        let back = first.weekday().num_days_from_sunday() as i64;
        let start = first.checked_sub_signed(Duration::days(back))?;
        Some(Self {
            year,
            first,
            last,
            start,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    /// Date shown at `week`/`day` (day 0 = Sunday)
    pub fn cell_date(&self, week: usize, day: usize) -> Option<NaiveDate> {
        let offset = (week * DAYS_PER_WEEK + day) as i64;
        self.start.checked_add_signed(Duration::days(offset))
    }

    /// Column index a date falls in; may be negative or past the grid
    pub fn week_of(&self, date: NaiveDate) -> i64 {
        (date - self.start).num_days().div_euclid(DAYS_PER_WEEK as i64)
    }

    /// Label anchor for every month whose first day lands inside the grid
    pub fn month_labels(&self) -> Vec<MonthLabelPosition> {
        (0..12u32)
            .filter_map(|month| {
                let first_of_month = NaiveDate::from_ymd_opt(self.year, month + 1, 1)?;
                let week = self.week_of(first_of_month);
                (0..WEEKS as i64)
                    .contains(&week)
                    .then_some(MonthLabelPosition {
                        month,
                        week_index: week as usize,
                    })
            })
            .collect()
    }
}

/// Sunday on or before January 1st of `year`
pub fn grid_start(year: i32) -> Option<NaiveDate> {
    YearSpan::new(year).map(|span| span.start)
}

/// One cell of the heatmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaySlot {
    /// Outside the target year, rendered invisible
    Masked,
    /// Inside the year with no record: zero contributions, level 0
    Zero { date: NaiveDate },
    /// Inside the year with a record from the API
    Record(ContributionRecord),
}

impl DaySlot {
    pub fn is_masked(&self) -> bool {
        matches!(self, Self::Masked)
    }

    pub fn record(&self) -> Option<&ContributionRecord> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn count(&self) -> u64 {
        self.record().map(|r| r.count).unwrap_or(0)
    }

    pub fn level(&self) -> ContributionLevel {
        self.record()
            .map(ContributionRecord::intensity)
            .unwrap_or_default()
    }

    /// Swatch for the cell; masked cells are not drawn
    pub fn color(&self) -> Option<ColorToken> {
        match self {
            Self::Masked => None,
            Self::Zero { .. } => Some(color_for_level(0)),
            Self::Record(r) => Some(color_for_level(r.level)),
        }
    }

    /// Hover text, e.g. "2024-01-01: 3 contributions"; masked cells have none
    pub fn tooltip(&self) -> Option<String> {
        match self {
            Self::Masked => None,
            Self::Zero { date } => Some(format!("{}: {}", date, contribution_label(0))),
            Self::Record(r) => Some(format!("{}: {}", r.date, contribution_label(r.count))),
        }
    }
}

/// `{"kind": "masked"}` or `{"kind", "date", "count", "level", "color"}`
impl Serialize for DaySlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (kind, date, level) = match self {
            Self::Masked => {
                let mut state = serializer.serialize_struct("DaySlot", 1)?;
                state.serialize_field("kind", "masked")?;
                return state.end();
            }
            Self::Zero { date } => ("zero", date.to_string(), 0),
            Self::Record(r) => ("record", r.date.clone(), r.level),
        };
        let mut state = serializer.serialize_struct("DaySlot", 5)?;
        state.serialize_field("kind", kind)?;
        state.serialize_field("date", &date)?;
        state.serialize_field("count", &self.count())?;
        state.serialize_field("level", &level)?;
        state.serialize_field("color", &color_for_level(level))?;
        state.end()
    }
}

/// Fixed-size week-by-day grid for one calendar year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekGrid {
    pub year: i32,
    /// Grid anchor; `None` when the year is not representable
    pub start: Option<NaiveDate>,
    /// Exactly [`WEEKS`] columns of [`DAYS_PER_WEEK`] slots
    pub weeks: Vec<[DaySlot; DAYS_PER_WEEK]>,
}

impl WeekGrid {
    fn masked(year: i32) -> Self {
        Self {
            year,
            start: None,
            weeks: (0..WEEKS)
                .map(|_| std::array::from_fn(|_| DaySlot::Masked))
                .collect(),
        }
    }

    pub fn slot(&self, week: usize, day: usize) -> Option<&DaySlot> {
        self.weeks.get(week).and_then(|w| w.get(day))
    }

    pub fn slots(&self) -> impl Iterator<Item = &DaySlot> {
        self.weeks.iter().flat_map(|w| w.iter())
    }

    /// Sum of record counts on the grid (display totals come from the API instead)
    pub fn recorded_count(&self) -> u64 {
        self.slots().map(DaySlot::count).sum()
    }
}

/// Column anchor for a month label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthLabelPosition {
    /// 0 = January
    pub month: u32,
    pub week_index: usize,
}

impl MonthLabelPosition {
    pub fn name(self) -> &'static str {
        MONTH_NAMES[self.month as usize % 12]
    }
}

/// Grid plus month labels computed from one shared anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapLayout {
    pub grid: WeekGrid,
    pub months: Vec<MonthLabelPosition>,
}

impl HeatmapLayout {
    pub fn build(records: &[ContributionRecord], year: i32) -> Self {
        match YearSpan::new(year) {
            Some(span) => Self {
                grid: fill_grid(records, &span),
                months: span.month_labels(),
            },
            None => Self {
                grid: WeekGrid::masked(year),
                months: Vec::new(),
            },
        }
    }
}

/// Build the 53 x 7 grid for `year`. Records outside the year or with
/// unparseable dates are ignored; duplicate dates keep the last record.
pub fn build_grid(records: &[ContributionRecord], year: i32) -> WeekGrid {
    match YearSpan::new(year) {
        Some(span) => fill_grid(records, &span),
        None => WeekGrid::masked(year),
    }
}

/// Month label anchors for `year`, ordered by month
pub fn month_labels(year: i32) -> Vec<MonthLabelPosition> {
    YearSpan::new(year)
        .map(|span| span.month_labels())
        .unwrap_or_default()
}

/// Swatch for a raw level; anything outside 0..=4 gets the level-0 swatch
pub fn color_for_level(level: i64) -> ColorToken {
    ContributionLevel::from_raw(level).color()
}

/// "1 contribution" / "N contributions"
pub fn contribution_label(count: u64) -> String {
    if count == 1 {
        "1 contribution".to_string()
    } else {
        format!("{} contributions", count)
    }
}

/// Message shown instead of a grid for a year without records
pub fn no_data_label(year: i32) -> String {
    format!("No contribution data available for {}", year)
}

fn fill_grid(records: &[ContributionRecord], span: &YearSpan) -> WeekGrid {
    let mut by_date: HashMap<NaiveDate, &ContributionRecord> =
        HashMap::with_capacity(records.len());
    for record in records {
        match record.calendar_date() {
            Some(date) if span.contains(date) => {
                by_date.insert(date, record);
            }
            Some(_) => {}
            None => tracing::debug!(date = %record.date, "skipping record with invalid date"),
        }
    }

    let weeks = (0..WEEKS)
        .map(|week| {
            std::array::from_fn(|day| match span.cell_date(week, day) {
                Some(date) if span.contains(date) => match by_date.get(&date) {
                    Some(record) => DaySlot::Record((*record).clone()),
                    None => DaySlot::Zero { date },
                },
                _ => DaySlot::Masked,
            })
        })
        .collect();

    WeekGrid {
        year: span.year,
        start: Some(span.start),
        weeks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// (week, day) of the slot holding `record`, asserting it appears exactly once
    fn position_of(grid: &WeekGrid, record: &ContributionRecord) -> (usize, usize) {
        let hits: Vec<(usize, usize)> = grid
            .weeks
            .iter()
            .enumerate()
            .flat_map(|(w, days)| {
                days.iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.record() == Some(record))
                    .map(move |(d, _)| (w, d))
            })
            .collect();
        assert_eq!(hits.len(), 1, "record {:?} found at {:?}", record, hits);
        hits[0]
    }

    // ========== YearSpan tests ==========

    #[test]
    fn test_grid_start_is_sunday_on_or_before_jan_1() {
        for year in 1900..=2100 {
            let start = grid_start(year).unwrap();
            assert_eq!(start.weekday(), Weekday::Sun, "year {}", year);
            let back = (date(year, 1, 1) - start).num_days();
            assert!((0..7).contains(&back), "year {}", year);
        }
    }

    #[test]
    fn test_grid_and_month_labels_share_anchor() {
        for year in 1900..=2100 {
            let layout = HeatmapLayout::build(&[], year);
            let start = layout.grid.start.unwrap();
            assert_eq!(Some(start), grid_start(year));
            // January's label always sits in the column holding Jan 1
            let jan = layout.months[0];
            assert_eq!(jan.month, 0);
            assert_eq!(jan.week_index, 0);
            assert_eq!(layout.months, month_labels(year));
        }
    }

    #[test]
    fn test_unrepresentable_year_is_fully_masked() {
        let grid = build_grid(&[], i32::MAX);
        assert_eq!(grid.weeks.len(), WEEKS);
        assert!(grid.slots().all(DaySlot::is_masked));
        assert!(month_labels(i32::MAX).is_empty());
    }

    // ========== build_grid tests ==========

    #[test]
    fn test_empty_records_dimensions_and_no_records() {
        for year in [1999, 2020, 2023, 2024, 2025, 2100] {
            let grid = build_grid(&[], year);
            assert_eq!(grid.weeks.len(), WEEKS);
            assert_eq!(grid.slots().count(), 371);
            assert!(grid.slots().all(|s| s.record().is_none()));

            let span = YearSpan::new(year).unwrap();
            for (w, days) in grid.weeks.iter().enumerate() {
                for (d, slot) in days.iter().enumerate() {
                    let cell = span.cell_date(w, d).unwrap();
                    if span.contains(cell) {
                        assert_eq!(slot, &DaySlot::Zero { date: cell });
                    } else {
                        assert!(slot.is_masked());
                    }
                }
            }
        }
    }

    #[test]
    fn test_in_range_slot_count_matches_days_in_year() {
        let in_range = |year| {
            build_grid(&[], year)
                .slots()
                .filter(|s| !s.is_masked())
                .count()
        };
        assert_eq!(in_range(2023), 365);
        assert_eq!(in_range(2024), 366);
    }

    #[test]
    fn test_leap_year_starting_saturday_overflows_fixed_width() {
        // 2028 starts on a Saturday: Dec 31 would need a 54th column
        let dec31 = ContributionRecord::new("2028-12-31", 4, 2);
        let dec30 = ContributionRecord::new("2028-12-30", 1, 1);
        let grid = build_grid(&[dec30.clone(), dec31], 2028);

        assert_eq!(grid.weeks.len(), WEEKS);
        assert_eq!(position_of(&grid, &dec30), (52, 6));
        assert_eq!(grid.slots().filter(|s| s.record().is_some()).count(), 1);
    }

    #[test]
    fn test_leap_year_2024_scenario() {
        let jan1 = ContributionRecord::new("2024-01-01", 3, 1);
        let dec31 = ContributionRecord::new("2024-12-31", 0, 0);
        let grid = build_grid(&[jan1.clone(), dec31.clone()], 2024);

        assert_eq!(grid.start, Some(date(2023, 12, 31)));
        assert!(grid.slot(0, 0).unwrap().is_masked());
        assert_eq!(grid.slot(0, 1).unwrap().record(), Some(&jan1));
        assert_eq!(position_of(&grid, &jan1), (0, 1));

        let (week, day) = position_of(&grid, &dec31);
        assert_eq!(day, 2); // Tuesday
        assert_eq!(week, 52);
        // Everything after Dec 31 in that week is masked
        for d in 3..DAYS_PER_WEEK {
            assert!(grid.slot(week, d).unwrap().is_masked());
        }
    }

    #[test]
    fn test_year_starting_on_sunday_2023() {
        let jan1 = ContributionRecord::new("2023-01-01", 7, 3);
        let grid = build_grid(std::slice::from_ref(&jan1), 2023);

        assert_eq!(grid.start, Some(date(2023, 1, 1)));
        assert_eq!(grid.slot(0, 0).unwrap().record(), Some(&jan1));
        // 2023 fits in 53 columns with the tail of the last week masked
        assert!(grid.slot(52, 1).unwrap().is_masked());
        assert_eq!(
            grid.slot(52, 0).unwrap(),
            &DaySlot::Zero {
                date: date(2023, 12, 31)
            }
        );
    }

    #[test]
    fn test_records_placed_by_sunday_anchor_rule() {
        let year = 2025;
        let span = YearSpan::new(year).unwrap();
        let records: Vec<ContributionRecord> = [(1, 1), (2, 14), (7, 4), (10, 31), (12, 31)]
            .iter()
            .map(|&(m, d)| ContributionRecord::new(date(year, m, d).to_string(), 2, 1))
            .collect();

        let grid = build_grid(&records, year);

        for record in &records {
            let day_date = record.calendar_date().unwrap();
            let expected_week = span.week_of(day_date) as usize;
            let expected_day = day_date.weekday().num_days_from_sunday() as usize;
            assert_eq!(position_of(&grid, record), (expected_week, expected_day));
        }
    }

    #[test]
    fn test_out_of_year_records_never_appear() {
        let records = vec![
            ContributionRecord::new("2023-12-31", 9, 4),
            ContributionRecord::new("2025-01-01", 9, 4),
            ContributionRecord::new("2019-06-01", 9, 4),
        ];
        let grid = build_grid(&records, 2024);
        assert!(grid.slots().all(|s| s.record().is_none()));
    }

    #[test]
    fn test_invalid_dates_are_skipped() {
        let records = vec![
            ContributionRecord::new("2024-02-30", 5, 2),
            ContributionRecord::new("", 5, 2),
            ContributionRecord::new("2024-03-01", 1, 1),
        ];
        let grid = build_grid(&records, 2024);
        assert_eq!(grid.slots().filter(|s| s.record().is_some()).count(), 1);
    }

    #[test]
    fn test_duplicate_dates_last_write_wins() {
        let first = ContributionRecord::new("2024-05-05", 1, 1);
        let second = ContributionRecord::new("2024-05-05", 8, 3);
        let grid = build_grid(&[first.clone(), second.clone()], 2024);

        assert_eq!(grid.slots().filter(|s| s.record().is_some()).count(), 1);
        position_of(&grid, &second);
    }

    #[test]
    fn test_unsorted_input() {
        let records = vec![
            ContributionRecord::new("2024-12-01", 1, 1),
            ContributionRecord::new("2024-01-15", 2, 1),
            ContributionRecord::new("2024-06-30", 3, 1),
        ];
        let grid = build_grid(&records, 2024);
        assert_eq!(grid.recorded_count(), 6);
    }

    #[test]
    fn test_build_grid_is_idempotent() {
        let records = vec![
            ContributionRecord::new("2024-03-03", 4, 2),
            ContributionRecord::new("2024-08-19", 11, 4),
        ];
        assert_eq!(build_grid(&records, 2024), build_grid(&records, 2024));
        assert_eq!(
            HeatmapLayout::build(&records, 2024),
            HeatmapLayout::build(&records, 2024)
        );
    }

    #[test]
    fn test_missing_level_colors_as_zero() {
        let record: ContributionRecord =
            serde_json::from_str(r#"{"date": "2024-04-04", "count": 6}"#).unwrap();
        let grid = build_grid(std::slice::from_ref(&record), 2024);
        let slot = grid.slots().find(|s| s.record().is_some()).unwrap();
        assert_eq!(slot.level(), ContributionLevel::None);
        assert_eq!(slot.count(), 6);
    }

    // ========== month_labels tests ==========

    #[test]
    fn test_month_labels_strictly_increasing_and_in_range() {
        for year in 1990..=2030 {
            let labels = month_labels(year);
            assert!(labels.windows(2).all(|w| w[0].month < w[1].month));
            assert!(labels.iter().all(|l| l.week_index < WEEKS));
        }
    }

    #[test]
    fn test_month_labels_match_month_first_days() {
        for year in [2023, 2024, 2025] {
            let span = YearSpan::new(year).unwrap();
            let labels = month_labels(year);
            assert_eq!(labels.len(), 12);
            for label in labels {
                let first = date(year, label.month + 1, 1);
                assert_eq!(label.week_index as i64, span.week_of(first));
                let day = first.weekday().num_days_from_sunday() as usize;
                assert_eq!(
                    span.cell_date(label.week_index, day),
                    Some(first),
                    "month {} of {}",
                    label.month,
                    year
                );
            }
        }
    }

    #[test]
    fn test_month_labels_2024_positions() {
        let labels = month_labels(2024);
        // Feb 1 2024 is a Thursday, 32 days after the 2023-12-31 anchor
        assert_eq!(labels[1], MonthLabelPosition { month: 1, week_index: 4 });
        // Dec 1 2024 is a Sunday, 336 days after the anchor
        assert_eq!(labels[11], MonthLabelPosition { month: 11, week_index: 48 });
        assert_eq!(labels[11].name(), "Dec");
    }

    // ========== color / label tests ==========

    #[test]
    fn test_color_for_level_is_total() {
        assert_eq!(color_for_level(0).hex(), "#ebedf0");
        assert_eq!(color_for_level(1).hex(), "#9be9a8");
        assert_eq!(color_for_level(2).hex(), "#40c463");
        assert_eq!(color_for_level(3).hex(), "#30a14e");
        assert_eq!(color_for_level(4).hex(), "#216e39");
        for level in [-1, -100, 5, 42, i64::MIN, i64::MAX] {
            assert_eq!(color_for_level(level), color_for_level(0));
        }
    }

    #[test]
    fn test_contribution_label() {
        assert_eq!(contribution_label(0), "0 contributions");
        assert_eq!(contribution_label(1), "1 contribution");
        assert_eq!(contribution_label(12), "12 contributions");
        assert_eq!(no_data_label(2022), "No contribution data available for 2022");
    }

    #[test]
    fn test_tooltips() {
        assert_eq!(DaySlot::Masked.tooltip(), None);
        assert_eq!(
            DaySlot::Zero {
                date: date(2024, 1, 2)
            }
            .tooltip()
            .as_deref(),
            Some("2024-01-02: 0 contributions")
        );
        let slot = DaySlot::Record(ContributionRecord::new("2024-01-03", 1, 1));
        assert_eq!(slot.tooltip().as_deref(), Some("2024-01-03: 1 contribution"));
    }

    #[test]
    fn test_total_is_pass_through_not_grid_sum() {
        use crate::types::ContributionsResponse;

        let mut resp = ContributionsResponse::default();
        resp.total.insert("2024".into(), 42);
        resp.contributions = vec![
            ContributionRecord::new("2024-02-01", 25, 4),
            ContributionRecord::new("2024-02-02", 15, 3),
        ];

        let grid = build_grid(&resp.contributions, 2024);
        assert_eq!(grid.recorded_count(), 40);
        assert_eq!(resp.year_total(2024), 42);
    }

    #[test]
    fn test_grid_serializes_slot_kinds() {
        let grid = build_grid(&[ContributionRecord::new("2024-01-01", 3, 1)], 2024);
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json["weeks"][0][0]["kind"], "masked");
        assert_eq!(json["weeks"][0][1]["kind"], "record");
        assert_eq!(json["weeks"][0][1]["count"], 3);
        assert_eq!(json["weeks"][0][2]["kind"], "zero");
        assert_eq!(json["weeks"][0][2]["date"], "2024-01-02");
        assert_eq!(json["weeks"][0][2]["count"], 0);
    }

    #[test]
    fn test_grid_json_carries_swatches() {
        let records: Vec<ContributionRecord> = [(1, 0), (2, 1), (3, 2), (4, 3), (5, 4), (6, 9)]
            .iter()
            .map(|&(d, level)| ContributionRecord::new(format!("2024-01-{:02}", d), 1, level))
            .collect();
        let json = serde_json::to_value(build_grid(&records, 2024)).unwrap();
        let week0 = &json["weeks"][0];

        assert!(week0[0].get("color").is_none());
        let colors: Vec<&str> = (1..=6usize).map(|d| week0[d]["color"].as_str().unwrap()).collect();
        assert_eq!(
            colors,
            vec!["#ebedf0", "#9be9a8", "#40c463", "#30a14e", "#216e39", "#ebedf0"]
        );
        // Raw level is kept even when it colors as zero
        assert_eq!(week0[6]["level"], 9);
        // Days with no record use the level-0 swatch
        assert_eq!(json["weeks"][1][0]["color"], "#ebedf0");
    }
}
