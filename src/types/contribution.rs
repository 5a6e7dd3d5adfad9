use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// One day of activity as returned by the contributions API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    /// ISO calendar date (yyyy-mm-dd); empty when the API sent none
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub count: u64,
    /// Raw intensity bucket; anything outside 0..=4 colors as level 0
    #[serde(default, deserialize_with = "lenient_level")]
    pub level: i64,
}

impl ContributionRecord {
    pub fn new(date: impl Into<String>, count: u64, level: i64) -> Self {
        Self {
            date: date.into(),
            count,
            level,
        }
    }

    /// Parsed calendar date, `None` when the wire value is not `yyyy-mm-dd`
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }

    pub fn intensity(&self) -> ContributionLevel {
        ContributionLevel::from_raw(self.level)
    }
}

/// Full response body of the contributions API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionsResponse {
    /// Year (as string key) -> total contributions reported by the API
    #[serde(default, deserialize_with = "lenient_totals")]
    pub total: BTreeMap<String, u64>,
    /// Elements that do not decode as a record are dropped
    #[serde(default, deserialize_with = "lenient_records")]
    pub contributions: Vec<ContributionRecord>,
}

impl ContributionsResponse {
    /// Year total exactly as reported upstream (never recomputed from records)
    pub fn year_total(&self, year: i32) -> u64 {
        self.total.get(&year.to_string()).copied().unwrap_or(0)
    }

    /// Years present in the total map, newest first
    pub fn available_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .total
            .keys()
            .filter_map(|k| k.parse::<i32>().ok())
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }

    /// Whether any record parses to a date inside `year`
    pub fn has_activity(&self, year: i32) -> bool {
        use chrono::Datelike;
        self.contributions
            .iter()
            .filter_map(ContributionRecord::calendar_date)
            .any(|d| d.year() == year)
    }
}

/// Display bucket for a contribution day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContributionLevel {
    /// No contributions
    #[default]
    None,
    /// 1-3 contributions
    Low,
    /// 4-6 contributions
    Medium,
    /// 7-9 contributions
    High,
    /// 10+ contributions
    Max,
}

impl ContributionLevel {
    /// Total mapping from a raw API level; out-of-range values fall back to `None`
    pub fn from_raw(level: i64) -> Self {
        match level {
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::High,
            4 => Self::Max,
            _ => Self::None,
        }
    }

    /// All buckets from least to most intense (legend order)
    pub fn all() -> [Self; 5] {
        [Self::None, Self::Low, Self::Medium, Self::High, Self::Max]
    }

    /// Fixed swatch for this bucket
    pub fn color(self) -> ColorToken {
        match self {
            Self::None => ColorToken("#ebedf0"),
            Self::Low => ColorToken("#9be9a8"),
            Self::Medium => ColorToken("#40c463"),
            Self::High => ColorToken("#30a14e"),
            Self::Max => ColorToken("#216e39"),
        }
    }
}

/// Hex color swatch used by renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ColorToken(&'static str);

impl ColorToken {
    pub fn hex(self) -> &'static str {
        self.0
    }

    /// RGB components of the swatch
    pub fn rgb(self) -> (u8, u8, u8) {
        let channel = |i: usize| {
            self.0
                .get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .unwrap_or(0)
        };
        (channel(1), channel(3), channel(5))
    }
}

impl std::fmt::Display for ColorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string).unwrap_or_default())
}

fn lenient_totals<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let Some(map) = value.as_object() else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .iter()
        .filter_map(|(year, total)| total.as_u64().map(|t| (year.clone(), t)))
        .collect())
}

fn lenient_records<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<ContributionRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable contribution record");
                None
            }
        })
        .collect())
}

fn lenient_level<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64().unwrap_or(0))
}

fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_u64().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_response() {
        let json = r#"{
            "total": {"2023": 120, "2024": 42},
            "contributions": [
                {"date": "2024-01-01", "count": 3, "level": 1},
                {"date": "2024-01-02", "count": 12, "level": 4}
            ]
        }"#;

        let resp: ContributionsResponse = serde_json::from_str(json).unwrap();

        assert_eq!(resp.contributions.len(), 2);
        assert_eq!(resp.contributions[1].count, 12);
        assert_eq!(resp.contributions[1].intensity(), ContributionLevel::Max);
        assert_eq!(resp.year_total(2024), 42);
    }

    #[test]
    fn test_missing_level_defaults_to_zero() {
        let rec: ContributionRecord =
            serde_json::from_str(r#"{"date": "2024-03-01", "count": 5}"#).unwrap();
        assert_eq!(rec.level, 0);
        assert_eq!(rec.intensity(), ContributionLevel::None);
    }

    #[test]
    fn test_malformed_level_and_count_do_not_fail() {
        let rec: ContributionRecord = serde_json::from_str(
            r#"{"date": "2024-03-01", "count": -4, "level": "high"}"#,
        )
        .unwrap();
        assert_eq!(rec.count, 0);
        assert_eq!(rec.level, 0);

        let rec: ContributionRecord =
            serde_json::from_str(r#"{"date": "2024-03-01", "count": 2, "level": null}"#).unwrap();
        assert_eq!(rec.level, 0);
    }

    #[test]
    fn test_bad_records_do_not_fail_response() {
        let json = r#"{
            "total": {"2024": 7, "2023": null, "2022": "many"},
            "contributions": [
                {"date": "2024-01-01", "count": 3, "level": 1},
                {"count": 1, "level": 1},
                {"date": null, "count": 2, "level": 2},
                {"date": 20240105, "count": 2, "level": 2},
                "garbage",
                null,
                {"date": "2024-01-02", "count": 4, "level": 2}
            ]
        }"#;

        let resp: ContributionsResponse = serde_json::from_str(json).unwrap();

        assert_eq!(resp.total.len(), 1);
        assert_eq!(resp.year_total(2024), 7);
        assert_eq!(resp.year_total(2023), 0);
        assert_eq!(resp.available_years(), vec![2024]);
        // Non-object elements are dropped, dateless objects kept with an empty date
        assert_eq!(resp.contributions.len(), 5);
        assert_eq!(resp.contributions[1].date, "");

        let grid = crate::services::build_grid(&resp.contributions, 2024);
        let placed: Vec<&str> = grid
            .slots()
            .filter_map(|s| s.record())
            .map(|r| r.date.as_str())
            .collect();
        assert_eq!(placed, vec!["2024-01-01", "2024-01-02"]);
    }

    #[test]
    fn test_null_sections_default_to_empty() {
        let resp: ContributionsResponse =
            serde_json::from_str(r#"{"total": null, "contributions": null}"#).unwrap();
        assert!(resp.total.is_empty());
        assert!(resp.contributions.is_empty());
    }

    #[test]
    fn test_out_of_range_level_keeps_raw_value() {
        let rec: ContributionRecord =
            serde_json::from_str(r#"{"date": "2024-03-01", "count": 2, "level": 9}"#).unwrap();
        assert_eq!(rec.level, 9);
        assert_eq!(rec.intensity(), ContributionLevel::None);
    }

    #[test]
    fn test_calendar_date() {
        let rec = ContributionRecord::new("2024-02-29", 1, 1);
        assert_eq!(rec.calendar_date(), NaiveDate::from_ymd_opt(2024, 2, 29));

        let bad = ContributionRecord::new("2023-02-29", 1, 1);
        assert!(bad.calendar_date().is_none());

        let garbage = ContributionRecord::new("yesterday", 1, 1);
        assert!(garbage.calendar_date().is_none());
    }

    #[test]
    fn test_year_total_missing_is_zero() {
        let resp = ContributionsResponse::default();
        assert_eq!(resp.year_total(2024), 0);
    }

    #[test]
    fn test_available_years_newest_first() {
        let mut resp = ContributionsResponse::default();
        resp.total.insert("2022".into(), 1);
        resp.total.insert("2024".into(), 3);
        resp.total.insert("2023".into(), 2);
        resp.total.insert("lastYear".into(), 9);

        assert_eq!(resp.available_years(), vec![2024, 2023, 2022]);
    }

    #[test]
    fn test_has_activity() {
        let resp = ContributionsResponse {
            total: BTreeMap::new(),
            contributions: vec![
                ContributionRecord::new("2023-12-31", 1, 1),
                ContributionRecord::new("not-a-date", 1, 1),
            ],
        };
        assert!(resp.has_activity(2023));
        assert!(!resp.has_activity(2024));
    }

    #[test]
    fn test_level_colors() {
        assert_eq!(ContributionLevel::None.color().hex(), "#ebedf0");
        assert_eq!(ContributionLevel::Low.color().hex(), "#9be9a8");
        assert_eq!(ContributionLevel::Medium.color().hex(), "#40c463");
        assert_eq!(ContributionLevel::High.color().hex(), "#30a14e");
        assert_eq!(ContributionLevel::Max.color().hex(), "#216e39");
        assert_eq!(ContributionLevel::None.color().rgb(), (0xeb, 0xed, 0xf0));
        assert_eq!(ContributionLevel::Max.color().rgb(), (0x21, 0x6e, 0x39));
    }
}
