//! Calendar periods used to bucket ledger activity.

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month};

/// Width of a reporting bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    /// ISO weeks, starting on Monday.
    Week,
    #[default]
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" | "daily" => Some(Granularity::Day),
            "week" | "weekly" => Some(Granularity::Week),
            "month" | "monthly" => Some(Granularity::Month),
            _ => None,
        }
    }

    /// First day of the period containing `date`.
    pub fn truncate(&self, date: Date) -> Date {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                let back = date.weekday().number_days_from_monday() as i64;
                date - Duration::days(back)
            }
            Granularity::Month => {
                Date::from_calendar_date(date.year(), date.month(), 1).unwrap_or(date)
            }
        }
    }

    /// First day of the period after the one starting at `start`.
    ///
    /// `start` must already be truncated. Returns `None` past the end of the calendar.
    pub fn advance(&self, start: Date) -> Option<Date> {
        match self {
            Granularity::Day => start.next_day(),
            Granularity::Week => start.checked_add(Duration::days(7)),
            Granularity::Month => {
                let (year, month) = match start.month() {
                    Month::December => (start.year().checked_add(1)?, Month::January),
                    m => (start.year(), m.next()),
                };
                Date::from_calendar_date(year, month, 1).ok()
            }
        }
    }

    /// Display label for the period starting at `start`.
    pub fn label(&self, start: Date) -> String {
        match self {
            Granularity::Day | Granularity::Week => format!(
                "{:04}-{:02}-{:02}",
                start.year(),
                u8::from(start.month()),
                start.day()
            ),
            Granularity::Month => format!("{:04}-{:02}", start.year(), u8::from(start.month())),
        }
    }

    /// Contiguous period starts from `first` through `last`, both truncated first.
    pub fn periods(&self, first: Date, last: Date) -> Vec<Date> {
        let last = self.truncate(last);
        let mut cursor = Some(self.truncate(first));
        let mut out = Vec::new();
        while let Some(start) = cursor {
            if start > last {
                break;
            }
            out.push(start);
            cursor = self.advance(start);
        }
        out
    }
}
