//! Trend intervals and bucket labels.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tally_core::{TallyError, ValidationError};

/// Width of one trend bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendInterval {
    Day,
    Week,
    #[default]
    Month,
    Quarter,
}

/// How week buckets are labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekLabel {
    /// Date of the Sunday starting the week.
    #[default]
    StartDate,
    /// ISO week number and year, `W-YYYY`.
    Number,
}

impl TrendInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendInterval::Day => "day",
            TrendInterval::Week => "week",
            TrendInterval::Month => "month",
            TrendInterval::Quarter => "quarter",
        }
    }

    /// Display label for a bucket keyed by epoch seconds (UTC).
    ///
    /// Week numbers count Sunday-start weeks and pair with the calendar
    /// year of the date. A key outside chrono's range is labelled with the
    /// raw key.
    pub fn label(&self, epoch_secs: i64, week_label: WeekLabel) -> String {
        let Some(date) = DateTime::<Utc>::from_timestamp(epoch_secs, 0).map(|t| t.date_naive())
        else {
            return epoch_secs.to_string();
        };
        match self {
            TrendInterval::Day => date.format("%d %b %Y").to_string(),
            TrendInterval::Week => match week_label {
                WeekLabel::StartDate => week_start(date).format("%d %b %Y").to_string(),
                WeekLabel::Number => match sunday_week_number(date) {
                    Some(week) => format!("{}-{}", week, date.year()),
                    None => epoch_secs.to_string(),
                },
            },
            TrendInterval::Month => date.format("%b %Y").to_string(),
            TrendInterval::Quarter => format!("Q{}-{}", date.month0() / 3 + 1, date.year()),
        }
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Sunday-start week number. Week 1 is the week holding 1 January, so the
/// last days of December can fall in week 1 of the next year.
fn sunday_week_number(date: NaiveDate) -> Option<i64> {
    let start = week_start(date);
    let week_year = (start + Duration::days(6)).year();
    let first = week_start(NaiveDate::from_ymd_opt(week_year, 1, 1)?);
    Some((start - first).num_days() / 7 + 1)
}

impl fmt::Display for TrendInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendInterval {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(TrendInterval::Day),
            "week" => Ok(TrendInterval::Week),
            "month" => Ok(TrendInterval::Month),
            "quarter" => Ok(TrendInterval::Quarter),
            other => Err(ValidationError::InvalidValue {
                field: "interval".to_string(),
                reason: format!("unknown interval '{}'", other),
            }
            .into()),
        }
    }
}
