use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, used to slice statements for browsing and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Month { year, month })
    }

    /// Month of a statement timestamp such as `2025-11-15 15:06:08`.
    pub fn of(transaction_time: &str) -> Option<Self> {
        let s = transaction_time.trim();
        let date = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .map(|dt| dt.date())
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y/%m/%d %H:%M").map(|dt| dt.date()))
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .ok()?;
        Some(Month {
            year: date.year(),
            month: date.month(),
        })
    }

    /// `YYYY-MM-` prefix matching canonical transaction times.
    pub fn time_prefix(self) -> String {
        format!("{self}-")
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid month '{s}', expected YYYY-MM"))?;
        let year = y
            .parse::<i32>()
            .map_err(|_| format!("Invalid year in '{s}'"))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| format!("Invalid month in '{s}'"))?;
        Month::new(year, month).ok_or_else(|| format!("Month out of range: '{s}'"))
    }
}
